use std::fmt;

use crate::model::jdbc::JdbcType;

/// Whether a domain type has its own identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Entity,
    Embeddable,
}

/// Collection semantics of a plural attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Bag,
    List,
    Set,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Bag => "bag",
            CollectionKind::List => "list",
            CollectionKind::Set => "set",
        }
    }
}

/// Element (or map key/value) of a plural field, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementModel {
    Basic(JdbcType),
    Domain(&'static str),
}

/// Field metadata produced by the derive macro.
#[derive(Debug)]
pub enum FieldModel {
    Column(ColumnField),
    ToOne(ReferenceField),
    Embedded(EmbeddedField),
    Plural(CollectionField),
    Map(MapField),
}

impl FieldModel {
    pub fn name(&self) -> &'static str {
        match self {
            FieldModel::Column(c) => c.name,
            FieldModel::ToOne(r) => r.name,
            FieldModel::Embedded(e) => e.name,
            FieldModel::Plural(p) => p.name,
            FieldModel::Map(m) => m.name,
        }
    }
}

impl fmt::Display for FieldModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldModel::Column(c) => write!(f, "{}", c),
            FieldModel::ToOne(r) => write!(f, "{}: -> {}", r.name, r.target),
            FieldModel::Embedded(e) => write!(f, "{}: {} (embedded)", e.name, e.target),
            FieldModel::Plural(p) => write!(f, "{}: {}<{:?}>", p.name, p.kind.as_str(), p.element),
            FieldModel::Map(m) => write!(f, "{}: map<{:?}, {:?}>", m.name, m.key, m.value),
        }
    }
}

#[derive(Debug)]
pub struct ColumnField {
    /// Rust field ident
    pub name: &'static str,
    /// Part of the identifier
    pub id: bool,
    pub column: &'static str,
    pub jdbc_type: JdbcType,
    pub ty_name: &'static str,
    pub nullable: bool,
}

impl fmt::Display for ColumnField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty_name)?;
        if self.id {
            write!(f, " [ID]")?;
        }
        write!(f, " @{} {}", self.column, self.jdbc_type)?;
        if self.nullable {
            write!(f, " NULL")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ReferenceField {
    pub name: &'static str,
    /// Target entity name
    pub target: &'static str,
    /// Foreign-key column; derived from the field name when absent
    pub column: Option<&'static str>,
}

#[derive(Debug)]
pub struct EmbeddedField {
    pub name: &'static str,
    pub target: &'static str,
}

#[derive(Debug)]
pub struct CollectionField {
    pub name: &'static str,
    pub kind: CollectionKind,
    pub element: ElementModel,
}

#[derive(Debug)]
pub struct MapField {
    pub name: &'static str,
    pub key: ElementModel,
    pub value: ElementModel,
}

/// Entity metadata produced by the derive macro.
#[derive(Debug)]
pub struct EntityModel {
    pub entity_name: &'static str, // logical "domain" name (e.g., "Order")
    pub rust_name: &'static str,
    pub table_name: Option<&'static str>,
    pub extends: Option<&'static str>,
    pub kind: TypeKind,
    pub fields: &'static [FieldModel],
}

impl EntityModel {
    /// Lookup a declared field model by Rust field name.
    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn id_fields(&self) -> impl Iterator<Item = &ColumnField> + '_ {
        self.fields.iter().filter_map(|f| match f {
            FieldModel::Column(c) if c.id => Some(c),
            _ => None,
        })
    }
}

impl fmt::Display for EntityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entity_name)?;
        if let Some(parent) = self.extends {
            write!(f, " extends {}", parent)?;
        }
        if let Some(table) = self.table_name {
            write!(f, " @{}", table)?;
        }
        Ok(())
    }
}

/// Trait implemented by the derive macro.
///
/// Access the generated model as `Self::MODEL`.
pub trait Entity {
    /// Statically generated model for the entity.
    const MODEL: &'static EntityModel;

    /// Return the entity model.
    fn entity_model(&self) -> &'static EntityModel {
        Self::MODEL
    }
}
