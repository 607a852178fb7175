//! Column value bindings carried by table mutations.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::ident::same_column;
use crate::model::jdbc::JdbcMapping;
use crate::model::table::TableDetails;

/// Which clause a parameter placeholder feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterUsage {
    Set,
    Restrict,
}

impl ParameterUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterUsage::Set => "set",
            ParameterUsage::Restrict => "restrict",
        }
    }
}

/// Where a written value comes from. Opaque to this crate beyond its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum ValueSource {
    Literal(serde_json::Value),
    /// JDBC-style `?` placeholder.
    Parameter(ParameterUsage),
    /// Write fragment such as `current_timestamp` or `version + 1`.
    Expression(String),
}

impl ValueSource {
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        ValueSource::Literal(value.into())
    }

    pub fn expression(fragment: &str) -> Self {
        ValueSource::Expression(fragment.to_string())
    }

    pub fn parameter_usage(&self) -> Option<ParameterUsage> {
        match self {
            ValueSource::Parameter(usage) => Some(*usage),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for ValueSource {
    fn from(value: serde_json::Value) -> Self {
        ValueSource::Literal(value)
    }
}

/// A column qualified by its table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnReference {
    table: Arc<str>,
    column: Arc<str>,
    jdbc_mapping: Option<JdbcMapping>,
}

impl ColumnReference {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: Arc::from(table),
            column: Arc::from(column),
            jdbc_mapping: None,
        }
    }

    /// Reference a column of `table`, picking up its mapping when known.
    pub fn of_table(table: &TableDetails, column: &str) -> Self {
        Self {
            table: Arc::from(table.table_name()),
            column: Arc::from(column),
            jdbc_mapping: table.jdbc_mapping_of(column).cloned(),
        }
    }

    pub fn with_jdbc_mapping(mut self, jdbc_mapping: JdbcMapping) -> Self {
        self.jdbc_mapping = Some(jdbc_mapping);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn column_name(&self) -> &str {
        &self.column
    }

    pub fn jdbc_mapping(&self) -> Option<&JdbcMapping> {
        self.jdbc_mapping.as_ref()
    }

    pub fn belongs_to(&self, table: &TableDetails) -> bool {
        same_column(&self.table, table.table_name())
    }
}

impl fmt::Display for ColumnReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValueBinding {
    column: ColumnReference,
    value: ValueSource,
}

impl ColumnValueBinding {
    pub fn new(column: ColumnReference, value: ValueSource) -> Self {
        Self { column, value }
    }

    pub fn column(&self) -> &ColumnReference {
        &self.column
    }

    pub fn column_name(&self) -> &str {
        self.column.column_name()
    }

    pub fn value(&self) -> &ValueSource {
        &self.value
    }
}

impl fmt::Display for ColumnValueBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            ValueSource::Literal(v) => write!(f, "{} = {}", self.column, v),
            ValueSource::Parameter(_) => write!(f, "{} = ?", self.column),
            ValueSource::Expression(e) => write!(f, "{} = {}", self.column, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::jdbc::JdbcType;
    use serde_json::json;

    #[test]
    fn test_column_reference_of_table() {
        let orders = TableDetails::builder("orders")
            .key_column("id", JdbcType::BigInt)
            .column("status", JdbcType::Varchar)
            .build()
            .unwrap();

        let status = ColumnReference::of_table(&orders, "status");
        assert_eq!(status.jdbc_mapping().map(|m| m.jdbc_type()), Some(JdbcType::Varchar));
        assert!(status.belongs_to(&orders));
        assert!(ColumnReference::of_table(&orders, "note").jdbc_mapping().is_none());
        assert!(!ColumnReference::new("customers", "status").belongs_to(&orders));
    }

    #[test]
    fn test_value_source_serde() {
        let value = ValueSource::Parameter(ParameterUsage::Set);
        let encoded = serde_json::to_value(&value).unwrap();
        assert_eq!(encoded, json!({"source": "parameter", "value": "set"}));

        let binding = ColumnValueBinding::new(
            ColumnReference::new("orders", "status"),
            ValueSource::literal("SHIPPED"),
        );
        assert_eq!(binding.to_string(), "orders.status = \"SHIPPED\"");
    }
}
