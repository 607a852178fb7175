//! Persistence-mapping core for relmap
//!
//! Table/key metadata, the domain and mapping models, navigable path
//! expressions with type narrowing, and the table mutation model produced
//! when entity state is flushed.

pub mod error;
pub mod model;
pub mod mutation;
pub mod obs;
pub mod path;

pub use error::*;
pub use model::{
    DomainModel, DomainTypeId, Entity, EntityModel, JdbcMapping, JdbcType, KeyColumn, KeyDetails,
    MappingModel, MappingOptions, TableDetails,
};
pub use mutation::{
    ColumnValueBinding, EntityChange, FlushCoordinator, FlushOptions, MutationOperation,
    MutationSink, RestrictedTableMutation, TableMutation, TableUpdate, ValueSource,
};
pub use path::{NavigablePath, PathId, QueryTree};
