//! Runtime domain metamodel: a closed hierarchy of entity and embeddable
//! types with their attributes.
//!
//! Types live in an arena addressed by [`DomainTypeId`]; supertype and
//! association targets are stored as ids so the graph never owns itself.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{RelmapError, Result};
use crate::model::entity::{CollectionKind, ElementModel, EntityModel, FieldModel, TypeKind};
use crate::model::ident::is_ident_segment;
use crate::model::jdbc::{JdbcMapping, JdbcType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainTypeId(u32);

impl DomainTypeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementType {
    Basic(JdbcMapping),
    Domain(DomainTypeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeNature {
    Basic(JdbcMapping),
    Embedded(DomainTypeId),
    ToOne(DomainTypeId),
    Plural {
        collection: CollectionKind,
        element: ElementType,
    },
    Map {
        key: ElementType,
        value: ElementType,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: Arc<str>,
    declaring_type: DomainTypeId,
    nature: AttributeNature,
    column: Option<Arc<str>>,
    identifier: bool,
}

impl Attribute {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_type(&self) -> DomainTypeId {
        self.declaring_type
    }

    pub fn nature(&self) -> &AttributeNature {
        &self.nature
    }

    /// Explicit column name, if one was declared.
    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn is_identifier(&self) -> bool {
        self.identifier
    }

    pub fn is_plural(&self) -> bool {
        matches!(
            self.nature,
            AttributeNature::Plural { .. } | AttributeNature::Map { .. }
        )
    }

    pub fn is_map(&self) -> bool {
        matches!(self.nature, AttributeNature::Map { .. })
    }
}

#[derive(Debug, Clone)]
pub struct DomainType {
    id: DomainTypeId,
    name: Arc<str>,
    host_name: Arc<str>,
    kind: TypeKind,
    supertype: Option<DomainTypeId>,
    table: Option<Arc<str>>,
    attributes: Vec<Attribute>,
}

impl DomainType {
    pub fn id(&self) -> DomainTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the host (Rust) type backing this domain type.
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn supertype(&self) -> Option<DomainTypeId> {
        self.supertype
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Attributes declared directly on this type.
    pub fn declared_attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn declared_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The closed set of domain types known to one mapping model.
#[derive(Debug, Clone, Default)]
pub struct DomainModel {
    types: Vec<DomainType>,
    by_name: HashMap<Arc<str>, DomainTypeId>,
    by_host_name: HashMap<Arc<str>, DomainTypeId>,
}

impl DomainModel {
    pub fn builder() -> DomainModelBuilder {
        DomainModelBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> impl Iterator<Item = &DomainType> + '_ {
        self.types.iter()
    }

    pub fn domain_type(&self, id: DomainTypeId) -> Result<&DomainType> {
        self.types
            .get(id.index())
            .ok_or_else(|| RelmapError::UnknownType(format!("#{}", id.0)))
    }

    /// Resolve a type by domain name, falling back to the host type name.
    pub fn type_by_name(&self, name: &str) -> Result<DomainTypeId> {
        self.by_name
            .get(name)
            .or_else(|| self.by_host_name.get(name))
            .copied()
            .ok_or_else(|| RelmapError::UnknownType(name.to_string()))
    }

    pub fn type_name(&self, id: DomainTypeId) -> &str {
        self.types
            .get(id.index())
            .map(|t| t.name())
            .unwrap_or("<unknown>")
    }

    /// Strict supertypes, nearest first.
    pub fn supertypes(&self, id: DomainTypeId) -> impl Iterator<Item = DomainTypeId> + '_ {
        let mut next = self.types.get(id.index()).and_then(|t| t.supertype);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.types[current.index()].supertype;
            Some(current)
        })
    }

    /// Reflexive: every type is a subtype of itself.
    pub fn is_subtype_of(&self, sub: DomainTypeId, sup: DomainTypeId) -> bool {
        sub == sup || self.supertypes(sub).any(|t| t == sup)
    }

    /// Whether one type is reachable from the other through inheritance.
    pub fn are_related(&self, a: DomainTypeId, b: DomainTypeId) -> bool {
        self.is_subtype_of(a, b) || self.is_subtype_of(b, a)
    }

    pub fn hierarchy_root(&self, id: DomainTypeId) -> DomainTypeId {
        self.supertypes(id).last().unwrap_or(id)
    }

    /// Direct and indirect subtypes, in declaration order.
    pub fn subtypes(&self, id: DomainTypeId) -> Vec<DomainTypeId> {
        self.types
            .iter()
            .map(DomainType::id)
            .filter(|t| *t != id && self.is_subtype_of(*t, id))
            .collect()
    }

    /// Look an attribute up on a type or any of its supertypes.
    pub fn find_attribute(&self, id: DomainTypeId, name: &str) -> Option<&Attribute> {
        std::iter::once(id)
            .chain(self.supertypes(id))
            .find_map(|t| self.types[t.index()].declared_attribute(name))
    }

    /// Inherited and declared attributes, hierarchy root first.
    pub fn attributes(&self, id: DomainTypeId) -> Vec<&Attribute> {
        let mut chain: Vec<DomainTypeId> = std::iter::once(id).chain(self.supertypes(id)).collect();
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|t| self.types[t.index()].attributes.iter())
            .collect()
    }

    pub fn identifier_attributes(&self, id: DomainTypeId) -> Vec<&Attribute> {
        self.attributes(id)
            .into_iter()
            .filter(|a| a.is_identifier())
            .collect()
    }
}

/// Element of a plural attribute, referring to domain types by name.
#[derive(Debug, Clone)]
pub enum ElementSpec {
    Basic(JdbcMapping),
    Domain(String),
}

impl ElementSpec {
    pub fn basic(jdbc_type: JdbcType) -> Self {
        ElementSpec::Basic(JdbcMapping::new(jdbc_type))
    }

    pub fn domain(name: &str) -> Self {
        ElementSpec::Domain(name.to_string())
    }
}

impl From<ElementModel> for ElementSpec {
    fn from(model: ElementModel) -> Self {
        match model {
            ElementModel::Basic(ty) => ElementSpec::basic(ty),
            ElementModel::Domain(name) => ElementSpec::domain(name),
        }
    }
}

#[derive(Debug, Clone)]
enum NatureSpec {
    Basic(JdbcMapping),
    Embedded(String),
    ToOne(String),
    Plural {
        collection: CollectionKind,
        element: ElementSpec,
    },
    Map {
        key: ElementSpec,
        value: ElementSpec,
    },
}

#[derive(Debug, Clone)]
struct AttributeSpec {
    name: String,
    nature: NatureSpec,
    column: Option<String>,
    identifier: bool,
}

/// Unresolved description of one domain type.
#[derive(Debug, Clone)]
pub struct TypeSpec {
    name: String,
    host_name: Option<String>,
    kind: TypeKind,
    extends: Option<String>,
    table: Option<String>,
    attributes: Vec<AttributeSpec>,
}

impl TypeSpec {
    pub fn entity(name: &str) -> Self {
        Self::new(name, TypeKind::Entity)
    }

    pub fn embeddable(name: &str) -> Self {
        Self::new(name, TypeKind::Embeddable)
    }

    fn new(name: &str, kind: TypeKind) -> Self {
        Self {
            name: name.to_string(),
            host_name: None,
            kind,
            extends: None,
            table: None,
            attributes: Vec::new(),
        }
    }

    pub fn host_name(mut self, host_name: &str) -> Self {
        self.host_name = Some(host_name.to_string());
        self
    }

    pub fn extends(mut self, supertype: &str) -> Self {
        self.extends = Some(supertype.to_string());
        self
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    fn push(
        mut self,
        name: &str,
        nature: NatureSpec,
        column: Option<&str>,
        identifier: bool,
    ) -> Self {
        self.attributes.push(AttributeSpec {
            name: name.to_string(),
            nature,
            column: column.map(str::to_string),
            identifier,
        });
        self
    }

    pub fn id(self, name: &str, jdbc_mapping: impl Into<JdbcMapping>) -> Self {
        self.push(name, NatureSpec::Basic(jdbc_mapping.into()), None, true)
    }

    pub fn id_column(self, name: &str, column: &str, jdbc_mapping: impl Into<JdbcMapping>) -> Self {
        self.push(name, NatureSpec::Basic(jdbc_mapping.into()), Some(column), true)
    }

    pub fn basic(self, name: &str, jdbc_mapping: impl Into<JdbcMapping>) -> Self {
        self.push(name, NatureSpec::Basic(jdbc_mapping.into()), None, false)
    }

    pub fn basic_column(
        self,
        name: &str,
        column: &str,
        jdbc_mapping: impl Into<JdbcMapping>,
    ) -> Self {
        self.push(name, NatureSpec::Basic(jdbc_mapping.into()), Some(column), false)
    }

    pub fn to_one(self, name: &str, target: &str) -> Self {
        self.push(name, NatureSpec::ToOne(target.to_string()), None, false)
    }

    pub fn to_one_column(self, name: &str, target: &str, column: &str) -> Self {
        self.push(name, NatureSpec::ToOne(target.to_string()), Some(column), false)
    }

    pub fn embedded(self, name: &str, target: &str) -> Self {
        self.push(name, NatureSpec::Embedded(target.to_string()), None, false)
    }

    pub fn collection(self, name: &str, collection: CollectionKind, element: ElementSpec) -> Self {
        self.push(name, NatureSpec::Plural { collection, element }, None, false)
    }

    pub fn list(self, name: &str, element: ElementSpec) -> Self {
        self.collection(name, CollectionKind::List, element)
    }

    pub fn set(self, name: &str, element: ElementSpec) -> Self {
        self.collection(name, CollectionKind::Set, element)
    }

    pub fn bag(self, name: &str, element: ElementSpec) -> Self {
        self.collection(name, CollectionKind::Bag, element)
    }

    pub fn map(self, name: &str, key: ElementSpec, value: ElementSpec) -> Self {
        self.push(name, NatureSpec::Map { key, value }, None, false)
    }
}

impl From<&EntityModel> for TypeSpec {
    fn from(model: &EntityModel) -> Self {
        let mut spec = TypeSpec::new(model.entity_name, model.kind).host_name(model.rust_name);
        spec.extends = model.extends.map(str::to_string);
        spec.table = model.table_name.map(str::to_string);

        for field in model.fields {
            spec = match field {
                FieldModel::Column(c) => {
                    let mapping = JdbcMapping::with_value_type(c.jdbc_type, c.ty_name);
                    spec.push(c.name, NatureSpec::Basic(mapping), Some(c.column), c.id)
                }
                FieldModel::ToOne(r) => {
                    spec.push(r.name, NatureSpec::ToOne(r.target.to_string()), r.column, false)
                }
                FieldModel::Embedded(e) => {
                    spec.push(e.name, NatureSpec::Embedded(e.target.to_string()), None, false)
                }
                FieldModel::Plural(p) => spec.collection(p.name, p.kind, p.element.into()),
                FieldModel::Map(m) => spec.map(m.name, m.key.into(), m.value.into()),
            };
        }
        spec
    }
}

#[derive(Debug, Default)]
pub struct DomainModelBuilder {
    specs: Vec<TypeSpec>,
}

impl DomainModelBuilder {
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    pub fn add_type(mut self, spec: TypeSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Register a derive-generated entity model.
    pub fn register(self, model: &EntityModel) -> Self {
        self.add_type(TypeSpec::from(model))
    }

    pub fn build(self) -> Result<DomainModel> {
        let mut by_name: HashMap<Arc<str>, DomainTypeId> = HashMap::new();
        let mut by_host_name: HashMap<Arc<str>, DomainTypeId> = HashMap::new();

        for (i, spec) in self.specs.iter().enumerate() {
            // names become navigable path segments
            check_segment(&spec.name, "domain type")?;
            for attr in &spec.attributes {
                check_segment(&attr.name, &format!("attribute of `{}`", spec.name))?;
            }

            let id = DomainTypeId(i as u32);
            if by_name.insert(Arc::from(spec.name.as_str()), id).is_some() {
                return Err(RelmapError::integrity(format!(
                    "domain type `{}` declared twice",
                    spec.name
                )));
            }
            let host = spec.host_name.as_deref().unwrap_or(&spec.name);
            if by_host_name.insert(Arc::from(host), id).is_some() {
                return Err(RelmapError::integrity(format!(
                    "host type `{host}` mapped twice"
                )));
            }
        }

        let lookup = |name: &str, context: &str| -> Result<DomainTypeId> {
            by_name.get(name).copied().ok_or_else(|| {
                RelmapError::integrity(format!("{context} refers to unknown type `{name}`"))
            })
        };

        let mut types = Vec::with_capacity(self.specs.len());
        for (i, spec) in self.specs.iter().enumerate() {
            let id = DomainTypeId(i as u32);
            let supertype = match &spec.extends {
                Some(parent) => Some(lookup(parent, &format!("`{}` extends", spec.name))?),
                None => None,
            };

            let mut attributes = Vec::with_capacity(spec.attributes.len());
            for attr in &spec.attributes {
                let context = format!("`{}.{}`", spec.name, attr.name);
                let element = |e: &ElementSpec| -> Result<ElementType> {
                    Ok(match e {
                        ElementSpec::Basic(m) => ElementType::Basic(m.clone()),
                        ElementSpec::Domain(n) => ElementType::Domain(lookup(n, &context)?),
                    })
                };
                let nature = match &attr.nature {
                    NatureSpec::Basic(m) => AttributeNature::Basic(m.clone()),
                    NatureSpec::Embedded(t) => AttributeNature::Embedded(lookup(t, &context)?),
                    NatureSpec::ToOne(t) => AttributeNature::ToOne(lookup(t, &context)?),
                    NatureSpec::Plural { collection, element: e } => AttributeNature::Plural {
                        collection: *collection,
                        element: element(e)?,
                    },
                    NatureSpec::Map { key, value } => AttributeNature::Map {
                        key: element(key)?,
                        value: element(value)?,
                    },
                };
                if attr.identifier && !matches!(nature, AttributeNature::Basic(_)) {
                    return Err(RelmapError::integrity(format!(
                        "identifier {context} must be a basic attribute"
                    )));
                }
                attributes.push(Attribute {
                    name: Arc::from(attr.name.as_str()),
                    declaring_type: id,
                    nature,
                    column: attr.column.as_deref().map(Arc::from),
                    identifier: attr.identifier,
                });
            }

            types.push(DomainType {
                id,
                name: Arc::from(spec.name.as_str()),
                host_name: Arc::from(spec.host_name.as_deref().unwrap_or(&spec.name)),
                kind: spec.kind,
                supertype,
                table: spec.table.as_deref().map(Arc::from),
                attributes,
            });
        }

        let model = DomainModel {
            types,
            by_name,
            by_host_name,
        };
        model.validate()?;

        debug!(types = model.len(), "domain model built");
        Ok(model)
    }
}

fn check_segment(name: &str, what: &str) -> Result<()> {
    if is_ident_segment(name) {
        Ok(())
    } else {
        Err(RelmapError::integrity(format!(
            "{what} name `{name}` is not a plain identifier"
        )))
    }
}

impl DomainModel {
    fn validate(&self) -> Result<()> {
        // Cycles first: every other check walks the supertype chain.
        for ty in &self.types {
            let mut seen = HashSet::new();
            seen.insert(ty.id);
            let mut next = ty.supertype;
            while let Some(current) = next {
                if !seen.insert(current) {
                    return Err(RelmapError::integrity(format!(
                        "inheritance cycle through `{}`",
                        ty.name
                    )));
                }
                next = self.types[current.index()].supertype;
            }
        }

        for ty in &self.types {
            if let Some(parent) = ty.supertype {
                let parent = &self.types[parent.index()];
                if parent.kind != ty.kind {
                    return Err(RelmapError::integrity(format!(
                        "`{}` cannot extend `{}`: {:?} and {:?} do not mix",
                        ty.name, parent.name, ty.kind, parent.kind
                    )));
                }
            }

            let mut names = HashSet::new();
            for attr in self.attributes(ty.id) {
                if !names.insert(attr.name()) {
                    return Err(RelmapError::integrity(format!(
                        "attribute `{}` declared more than once in the hierarchy of `{}`",
                        attr.name(),
                        ty.name
                    )));
                }
            }

            for attr in &ty.attributes {
                let target_kind = match attr.nature {
                    AttributeNature::ToOne(t) => Some((t, TypeKind::Entity)),
                    AttributeNature::Embedded(t) => Some((t, TypeKind::Embeddable)),
                    _ => None,
                };
                if let Some((target, expected)) = target_kind {
                    if self.types[target.index()].kind != expected {
                        return Err(RelmapError::integrity(format!(
                            "`{}.{}` must target an {:?} type",
                            ty.name,
                            attr.name(),
                            expected
                        )));
                    }
                }
                if attr.identifier && ty.supertype.is_some() {
                    return Err(RelmapError::integrity(format!(
                        "identifier `{}.{}` must be declared on the hierarchy root",
                        ty.name,
                        attr.name()
                    )));
                }
            }

            if ty.kind == TypeKind::Entity
                && ty.supertype.is_none()
                && !ty.attributes.iter().any(Attribute::is_identifier)
            {
                return Err(RelmapError::integrity(format!(
                    "entity hierarchy `{}` declares no identifier",
                    ty.name
                )));
            }
        }
        Ok(())
    }
}
