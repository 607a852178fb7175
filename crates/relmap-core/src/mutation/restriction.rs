//! Row restrictions shared by updates and deletes.

use crate::error::{RelmapError, Result};
use crate::model::table::TableDetails;
use crate::mutation::binding::{ColumnReference, ColumnValueBinding, ParameterUsage, ValueSource};

/// One binding per key column, in key order.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRestriction {
    bindings: Vec<ColumnValueBinding>,
}

impl KeyRestriction {
    /// Restrict by explicit key values; arity must match the key.
    pub fn from_key(table: &TableDetails, values: Vec<ValueSource>) -> Result<Self> {
        let key = table.key_details();
        if values.len() != key.column_count() {
            return Err(RelmapError::integrity(format!(
                "table `{}` has {} key columns, got {} key values",
                table.table_name(),
                key.column_count(),
                values.len()
            )));
        }
        let bindings = key
            .key_columns()
            .iter()
            .zip(values)
            .map(|(col, value)| {
                let column = ColumnReference::new(table.table_name(), col.column_name())
                    .with_jdbc_mapping(col.jdbc_mapping().clone());
                ColumnValueBinding::new(column, value)
            })
            .collect();
        Ok(Self { bindings })
    }

    /// Placeholder per key column.
    pub fn parameterized(table: &TableDetails) -> Self {
        let mut bindings = Vec::with_capacity(table.key_details().column_count());
        table.key_details().for_each_key_column(|_, col| {
            let column = ColumnReference::new(table.table_name(), col.column_name())
                .with_jdbc_mapping(col.jdbc_mapping().clone());
            bindings.push(ColumnValueBinding::new(
                column,
                ValueSource::Parameter(ParameterUsage::Restrict),
            ));
        });
        Self { bindings }
    }

    pub fn bindings(&self) -> &[ColumnValueBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Version check appended to the key restriction.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticLock {
    binding: ColumnValueBinding,
}

impl OptimisticLock {
    pub fn new(table: &TableDetails, column: &str, expected: ValueSource) -> Result<Self> {
        if table.is_key_column(column) {
            return Err(RelmapError::KeyColumnBinding {
                table: table.table_name().to_string(),
                column: column.to_string(),
            });
        }
        Ok(Self {
            binding: ColumnValueBinding::new(ColumnReference::of_table(table, column), expected),
        })
    }

    pub fn binding(&self) -> &ColumnValueBinding {
        &self.binding
    }

    pub fn column_name(&self) -> &str {
        self.binding.column_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::jdbc::JdbcType;

    fn order_lines() -> TableDetails {
        TableDetails::builder("order_lines")
            .key_column("order_id", JdbcType::BigInt)
            .key_column("line_no", JdbcType::Integer)
            .column("version", JdbcType::Integer)
            .build()
            .unwrap()
    }

    #[test]
    fn test_key_restriction_follows_key_order() {
        let table = order_lines();
        let restriction =
            KeyRestriction::from_key(&table, vec![ValueSource::literal(7), ValueSource::literal(2)])
                .unwrap();
        let columns: Vec<_> = restriction.bindings().iter().map(|b| b.column_name()).collect();
        assert_eq!(columns, vec!["order_id", "line_no"]);

        let err = KeyRestriction::from_key(&table, vec![ValueSource::literal(7)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelIntegrity);
    }

    #[test]
    fn test_parameterized_restriction() {
        let table = order_lines();
        let restriction = KeyRestriction::parameterized(&table);
        assert_eq!(restriction.len(), 2);
        assert!(restriction
            .bindings()
            .iter()
            .all(|b| b.value().parameter_usage() == Some(ParameterUsage::Restrict)));
    }

    #[test]
    fn test_optimistic_lock_rejects_key_column() {
        let table = order_lines();
        assert!(OptimisticLock::new(&table, "version", ValueSource::literal(3)).is_ok());
        assert!(matches!(
            OptimisticLock::new(&table, "line_no", ValueSource::literal(3)).unwrap_err(),
            RelmapError::KeyColumnBinding { .. }
        ));
    }
}
