pub mod domain;
pub mod entity;
pub mod ident;
pub mod jdbc;
pub mod mapping;
pub mod table;

pub use domain::{
    Attribute, AttributeNature, DomainModel, DomainModelBuilder, DomainType, DomainTypeId,
    ElementSpec, ElementType, TypeSpec,
};
pub use entity::{CollectionKind, Entity, EntityModel, TypeKind};
pub use jdbc::{JdbcMapping, JdbcType};
pub use mapping::{ColumnLocation, EntityMapping, MappingModel, MappingModelBuilder, MappingOptions};
pub use table::{KeyColumn, KeyDetails, TableColumn, TableDetails};
