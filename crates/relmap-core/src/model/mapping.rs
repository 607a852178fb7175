//! Entity-to-table mapping model.
//!
//! Built once at boot (either derived from a [`DomainModel`] or assembled by
//! hand) and read-only afterwards. Tables are handed out as
//! `Arc<TableDetails>` so mutations and path resolution share one copy.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RelmapError, Result};
use crate::model::domain::{AttributeNature, DomainModel, DomainTypeId};
use crate::model::entity::TypeKind;
use crate::model::ident::same_column;
use crate::model::jdbc::JdbcMapping;
use crate::model::table::TableDetails;
use crate::path::{PathId, PathSource, QueryTree};

/// Boot-time options for deriving a mapping model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingOptions {
    /// Reject table and column names that are not plain identifiers.
    pub validate_identifiers: bool,
    /// Appended to a to-one attribute name to form its FK column.
    pub foreign_key_suffix: String,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            validate_identifiers: true,
            foreign_key_suffix: "_id".to_string(),
        }
    }
}

/// Where an attribute lives relationally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnLocation {
    table: Arc<str>,
    column: Arc<str>,
}

impl ColumnLocation {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: Arc::from(table),
            column: Arc::from(column),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

impl fmt::Display for ColumnLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Tables and attribute columns of one entity type.
#[derive(Debug, Clone)]
pub struct EntityMapping {
    entity: DomainTypeId,
    entity_name: Arc<str>,
    /// Identifier table first, then joined tables down the hierarchy.
    tables: Vec<Arc<TableDetails>>,
    columns: HashMap<Arc<str>, ColumnLocation>,
}

impl EntityMapping {
    pub fn entity(&self) -> DomainTypeId {
        self.entity
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn tables(&self) -> &[Arc<TableDetails>] {
        &self.tables
    }

    pub fn identifier_table(&self) -> &Arc<TableDetails> {
        // Construction guarantees a non-empty, identifier-first table list.
        &self.tables[0]
    }

    pub fn table(&self, name: &str) -> Option<&Arc<TableDetails>> {
        self.tables.iter().find(|t| same_column(t.table_name(), name))
    }

    pub fn column_of(&self, attribute: &str) -> Option<&ColumnLocation> {
        self.columns.get(attribute)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MappingModel {
    tables: BTreeMap<Arc<str>, Arc<TableDetails>>,
    entities: HashMap<DomainTypeId, EntityMapping>,
}

impl MappingModel {
    pub fn builder() -> MappingModelBuilder {
        MappingModelBuilder::default()
    }

    /// Lookup by table name, ASCII case-insensitive.
    pub fn table(&self, name: &str) -> Result<&Arc<TableDetails>> {
        self.tables
            .get(table_key(name).as_str())
            .ok_or_else(|| RelmapError::TableNotFound(name.to_string()))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableDetails>> + '_ {
        self.tables.values()
    }

    pub fn entity_mapping(&self, entity: DomainTypeId) -> Result<&EntityMapping> {
        self.entities
            .get(&entity)
            .ok_or_else(|| RelmapError::EntityNotMapped(format!("#{}", entity.index())))
    }

    pub fn entity_mapping_named(&self, name: &str) -> Result<&EntityMapping> {
        self.entities
            .values()
            .find(|m| &*m.entity_name == name)
            .ok_or_else(|| RelmapError::EntityNotMapped(name.to_string()))
    }

    pub fn identifier_table(&self, entity: DomainTypeId) -> Result<&Arc<TableDetails>> {
        Ok(self.entity_mapping(entity)?.identifier_table())
    }

    pub fn resolve_column(
        &self,
        entity: DomainTypeId,
        attribute: &str,
    ) -> Result<&ColumnLocation> {
        let mapping = self.entity_mapping(entity)?;
        mapping
            .column_of(attribute)
            .ok_or_else(|| RelmapError::UnknownAttribute {
                type_name: mapping.entity_name.to_string(),
                attribute: attribute.to_string(),
            })
    }

    /// Resolve an attribute path node to the column it reads.
    pub fn resolve_path_column(&self, tree: &QueryTree, path: PathId) -> Result<ColumnLocation> {
        tree.check_path(path)?;
        let not_column = |reason: &str| RelmapError::NotNavigable {
            path: tree.navigable_path(path).to_string(),
            reason: reason.to_string(),
        };
        match tree.source(path) {
            PathSource::Attribute(attr) => {
                let mapping = self
                    .entities
                    .get(&attr.declaring_type())
                    .ok_or_else(|| not_column("declaring type has no table mapping"))?;
                mapping
                    .column_of(attr.name())
                    .cloned()
                    .ok_or_else(|| not_column("attribute is not mapped to a column"))
            }
            PathSource::Treat { treated, .. } => self.resolve_path_column(tree, *treated),
            _ => Err(not_column("not an attribute reference")),
        }
    }

    /// Derive joined-subclass / single-table layouts from the domain model.
    pub fn derive(domain: &DomainModel, options: &MappingOptions) -> Result<Self> {
        let mut entities: Vec<DomainTypeId> = domain
            .types()
            .filter(|t| t.kind() == TypeKind::Entity)
            .map(|t| t.id())
            .collect();
        // shallowest first, so a shared table keeps its topmost spelling
        entities.sort_by_key(|id| domain.supertypes(*id).count());

        let mut effective: HashMap<DomainTypeId, Arc<str>> = HashMap::new();
        for id in &entities {
            let table = effective_table(domain, *id)?;
            effective.insert(*id, table);
        }

        // table key -> layout of the types storing columns in it
        let mut layout: BTreeMap<Arc<str>, TableLayout> = BTreeMap::new();
        for id in &entities {
            let root = domain.hierarchy_root(*id);
            let table = effective[id].clone();
            let entry = layout
                .entry(Arc::from(table_key(&table)))
                .or_insert_with(|| TableLayout {
                    name: table.clone(),
                    root,
                    members: Vec::new(),
                });
            if entry.root != root {
                return Err(RelmapError::integrity(format!(
                    "table `{table}` is shared by unrelated hierarchies `{}` and `{}`",
                    domain.type_name(entry.root),
                    domain.type_name(root)
                )));
            }
            entry.members.push(*id);
        }

        let mut tables: BTreeMap<Arc<str>, Arc<TableDetails>> = BTreeMap::new();
        for (key, TableLayout { name, root, members }) in &layout {
            let mut builder = TableDetails::builder(name)
                .identifier_table(same_column(&effective[root], name))
                .validate_identifiers(options.validate_identifiers);
            for attr in domain.identifier_attributes(*root) {
                if let AttributeNature::Basic(mapping) = attr.nature() {
                    let column = attr.column().unwrap_or(attr.name());
                    builder = builder.key_column(column, mapping.clone());
                }
            }
            for member in members {
                for attr in domain.domain_type(*member)?.declared_attributes() {
                    if attr.is_identifier() {
                        continue;
                    }
                    if let Some((column, mapping)) = attribute_column(domain, attr, options) {
                        builder = builder.column(&column, mapping);
                    }
                }
            }
            tables.insert(key.clone(), Arc::new(builder.build()?));
        }

        let mut mappings = HashMap::new();
        for id in &entities {
            let mut chain: Vec<DomainTypeId> =
                std::iter::once(*id).chain(domain.supertypes(*id)).collect();
            chain.reverse();

            let mut entity_tables: Vec<Arc<TableDetails>> = Vec::new();
            for ty in &chain {
                let table = &tables[table_key(&effective[ty]).as_str()];
                if !entity_tables.iter().any(|t| Arc::ptr_eq(t, table)) {
                    entity_tables.push(table.clone());
                }
            }

            let mut columns = HashMap::new();
            for attr in domain.attributes(*id) {
                let declared_in = table_key(&effective[&attr.declaring_type()]);
                let table = tables[declared_in.as_str()].table_name();
                let column = if attr.is_identifier() {
                    Some(attr.column().unwrap_or(attr.name()).to_string())
                } else {
                    attribute_column(domain, attr, options).map(|(c, _)| c)
                };
                if let Some(column) = column {
                    columns.insert(Arc::from(attr.name()), ColumnLocation::new(table, &column));
                }
            }

            let entity_name = domain.type_name(*id);
            debug!(
                entity = entity_name,
                tables = entity_tables.len(),
                "derived entity mapping"
            );
            mappings.insert(
                *id,
                EntityMapping {
                    entity: *id,
                    entity_name: Arc::from(entity_name),
                    tables: entity_tables,
                    columns,
                },
            );
        }

        Ok(Self {
            tables,
            entities: mappings,
        })
    }
}

struct TableLayout {
    /// Spelling of the topmost type declaring the table.
    name: Arc<str>,
    root: DomainTypeId,
    members: Vec<DomainTypeId>,
}

/// Tables are identified ASCII case-insensitively.
fn table_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn effective_table(domain: &DomainModel, id: DomainTypeId) -> Result<Arc<str>> {
    let own = domain.domain_type(id)?;
    match (own.table(), own.supertype()) {
        (Some(table), _) => Ok(Arc::from(table)),
        (None, Some(parent)) => effective_table(domain, parent),
        (None, None) => Err(RelmapError::integrity(format!(
            "entity hierarchy `{}` declares no table",
            own.name()
        ))),
    }
}

/// Owning-table column of a non-identifier attribute, if it has one.
fn attribute_column(
    domain: &DomainModel,
    attr: &crate::model::domain::Attribute,
    options: &MappingOptions,
) -> Option<(String, JdbcMapping)> {
    match attr.nature() {
        AttributeNature::Basic(mapping) => Some((
            attr.column().unwrap_or(attr.name()).to_string(),
            mapping.clone(),
        )),
        AttributeNature::ToOne(target) => {
            let ids = domain.identifier_attributes(*target);
            // Composite targets have no single FK column.
            match ids.as_slice() {
                [id] => match id.nature() {
                    AttributeNature::Basic(mapping) => Some((
                        attr.column().map(str::to_string).unwrap_or_else(|| {
                            format!("{}{}", attr.name(), options.foreign_key_suffix)
                        }),
                        mapping.clone(),
                    )),
                    _ => None,
                },
                _ => None,
            }
        }
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct MappingModelBuilder {
    tables: BTreeMap<Arc<str>, Arc<TableDetails>>,
    entities: HashMap<DomainTypeId, EntityMapping>,
}

impl MappingModelBuilder {
    pub fn add_table(mut self, table: TableDetails) -> Result<Self> {
        let key: Arc<str> = Arc::from(table_key(table.table_name()));
        if let Some(existing) = self.tables.get(&key) {
            return Err(RelmapError::integrity(format!(
                "table `{}` declared twice (already registered as `{}`)",
                table.table_name(),
                existing.table_name()
            )));
        }
        self.tables.insert(key, Arc::new(table));
        Ok(self)
    }

    /// Map an entity onto already registered tables.
    pub fn map_entity(
        mut self,
        entity: DomainTypeId,
        entity_name: &str,
        tables: &[&str],
    ) -> Result<Self> {
        let mut resolved = tables
            .iter()
            .map(|name| {
                self.tables
                    .get(table_key(name).as_str())
                    .cloned()
                    .ok_or_else(|| RelmapError::TableNotFound(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let identifier_count = resolved.iter().filter(|t| t.is_identifier_table()).count();
        if resolved.is_empty() || identifier_count != 1 {
            return Err(RelmapError::integrity(format!(
                "entity `{entity_name}` must map to exactly one identifier table, \
                 found {identifier_count}"
            )));
        }
        // stable: identifier table first, the rest keep their order
        resolved.sort_by_key(|t| !t.is_identifier_table());

        self.entities.insert(
            entity,
            EntityMapping {
                entity,
                entity_name: Arc::from(entity_name),
                tables: resolved,
                columns: HashMap::new(),
            },
        );
        Ok(self)
    }

    pub fn map_attribute(
        mut self,
        entity: DomainTypeId,
        attribute: &str,
        table: &str,
        column: &str,
    ) -> Result<Self> {
        let mapping = self
            .entities
            .get_mut(&entity)
            .ok_or_else(|| RelmapError::EntityNotMapped(format!("#{}", entity.index())))?;
        let details = mapping.table(table).ok_or_else(|| {
            RelmapError::integrity(format!(
                "table `{table}` is not mapped by entity `{}`",
                mapping.entity_name
            ))
        })?;
        if details.jdbc_mapping_of(column).is_none() {
            return Err(RelmapError::ForeignColumn {
                table: table.to_string(),
                column: column.to_string(),
                expected: details.table_name().to_string(),
            });
        }
        let location = ColumnLocation::new(details.table_name(), column);
        mapping.columns.insert(Arc::from(attribute), location);
        Ok(self)
    }

    pub fn build(self) -> MappingModel {
        MappingModel {
            tables: self.tables,
            entities: self.entities,
        }
    }
}
