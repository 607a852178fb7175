//! Table and primary-key metadata.
//!
//! Built once while the mapping model boots and shared read-only (`Arc`)
//! by every mutation and path resolution that targets the table.

use std::fmt;
use std::sync::Arc;

use crate::error::{RelmapError, Result};
use crate::model::ident::{same_column, validate_ident};
use crate::model::jdbc::JdbcMapping;

/// A column within the key group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyColumn {
    name: Arc<str>,
    jdbc_mapping: JdbcMapping,
}

impl KeyColumn {
    pub fn new(name: &str, jdbc_mapping: impl Into<JdbcMapping>) -> Self {
        Self {
            name: Arc::from(name),
            jdbc_mapping: jdbc_mapping.into(),
        }
    }

    pub fn column_name(&self) -> &str {
        &self.name
    }

    pub fn jdbc_mapping(&self) -> &JdbcMapping {
        &self.jdbc_mapping
    }
}

/// Ordered primary-key columns of a table. Position is the only address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDetails {
    table: Arc<str>,
    columns: Vec<KeyColumn>,
}

impl KeyDetails {
    pub fn new(table: &str, columns: Vec<KeyColumn>) -> Result<Self> {
        if columns.is_empty() {
            return Err(RelmapError::integrity(format!(
                "table `{table}` declares no key columns"
            )));
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i]
                .iter()
                .any(|prev| same_column(prev.column_name(), col.column_name()))
            {
                return Err(RelmapError::DuplicateColumn {
                    table: table.to_string(),
                    column: col.column_name().to_string(),
                });
            }
        }
        Ok(Self {
            table: Arc::from(table),
            columns,
        })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn key_columns(&self) -> &[KeyColumn] {
        &self.columns
    }

    /// Get a key column by relative position.
    pub fn key_column(&self, position: usize) -> Result<&KeyColumn> {
        self.columns
            .get(position)
            .ok_or_else(|| RelmapError::KeyColumnOutOfRange {
                table: self.table.to_string(),
                position,
                count: self.columns.len(),
            })
    }

    /// Visit each key column in ascending position order.
    pub fn for_each_key_column<F>(&self, mut consumer: F)
    where
        F: FnMut(usize, &KeyColumn),
    {
        for (position, column) in self.columns.iter().enumerate() {
            consumer(position, column);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &KeyColumn)> + '_ {
        self.columns.iter().enumerate()
    }

    pub fn position_of(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| same_column(c.column_name(), column))
    }

    pub fn contains(&self, column: &str) -> bool {
        self.position_of(column).is_some()
    }
}

/// A non-key column known to the mapping model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableColumn {
    name: Arc<str>,
    jdbc_mapping: JdbcMapping,
}

impl TableColumn {
    pub fn new(name: &str, jdbc_mapping: impl Into<JdbcMapping>) -> Self {
        Self {
            name: Arc::from(name),
            jdbc_mapping: jdbc_mapping.into(),
        }
    }

    pub fn column_name(&self) -> &str {
        &self.name
    }

    pub fn jdbc_mapping(&self) -> &JdbcMapping {
        &self.jdbc_mapping
    }
}

/// Details about one physical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDetails {
    table_name: Arc<str>,
    key_details: KeyDetails,
    identifier_table: bool,
    columns: Vec<TableColumn>,
}

impl TableDetails {
    pub fn builder(table_name: &str) -> TableDetailsBuilder {
        TableDetailsBuilder {
            table_name: table_name.to_string(),
            key_columns: Vec::new(),
            columns: Vec::new(),
            identifier_table: true,
            validate: true,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn key_details(&self) -> &KeyDetails {
        &self.key_details
    }

    /// Whether this table holds the entity identifier.
    pub fn is_identifier_table(&self) -> bool {
        self.identifier_table
    }

    /// Non-key columns known to the model, in declaration order.
    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| same_column(c.column_name(), name))
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.key_details.contains(name)
    }

    /// Type mapping of any key or non-key column.
    pub fn jdbc_mapping_of(&self, name: &str) -> Option<&JdbcMapping> {
        if let Some(pos) = self.key_details.position_of(name) {
            return Some(self.key_details.key_columns()[pos].jdbc_mapping());
        }
        self.column(name).map(TableColumn::jdbc_mapping)
    }
}

impl fmt::Display for TableDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self
            .key_details
            .key_columns()
            .iter()
            .map(|c| c.column_name())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}({})", self.table_name, key)?;
        if self.identifier_table {
            write!(f, " [ID]")?;
        }
        Ok(())
    }
}

pub struct TableDetailsBuilder {
    table_name: String,
    key_columns: Vec<KeyColumn>,
    columns: Vec<TableColumn>,
    identifier_table: bool,
    validate: bool,
}

impl TableDetailsBuilder {
    pub fn key_column(mut self, name: &str, jdbc_mapping: impl Into<JdbcMapping>) -> Self {
        self.key_columns.push(KeyColumn::new(name, jdbc_mapping));
        self
    }

    pub fn column(mut self, name: &str, jdbc_mapping: impl Into<JdbcMapping>) -> Self {
        self.columns.push(TableColumn::new(name, jdbc_mapping));
        self
    }

    pub fn identifier_table(mut self, identifier_table: bool) -> Self {
        self.identifier_table = identifier_table;
        self
    }

    /// Skip identifier syntax checks (quoted or vendor-specific names).
    pub fn validate_identifiers(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn build(self) -> Result<TableDetails> {
        if self.validate {
            validate_ident(&self.table_name)?;
            for name in self
                .key_columns
                .iter()
                .map(KeyColumn::column_name)
                .chain(self.columns.iter().map(TableColumn::column_name))
            {
                validate_ident(name)?;
            }
        }
        let key_details = KeyDetails::new(&self.table_name, self.key_columns)?;

        let mut columns: Vec<TableColumn> = Vec::with_capacity(self.columns.len());
        for col in self.columns {
            if key_details.contains(col.column_name())
                || columns
                    .iter()
                    .any(|c| same_column(c.column_name(), col.column_name()))
            {
                return Err(RelmapError::DuplicateColumn {
                    table: self.table_name.clone(),
                    column: col.column_name().to_string(),
                });
            }
            columns.push(col);
        }

        Ok(TableDetails {
            table_name: Arc::from(self.table_name.as_str()),
            key_details,
            identifier_table: self.identifier_table,
            columns,
        })
    }
}
