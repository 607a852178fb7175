//! Incremental mutation assembly used while a flush walks its change set.
//!
//! Every `add_*` call validates immediately so a bad change is reported at
//! the point it is introduced, not when the statement is rendered.

use std::sync::Arc;

use crate::error::Result;
use crate::model::table::TableDetails;
use crate::mutation::binding::{ColumnReference, ColumnValueBinding, ValueSource};
use crate::mutation::restriction::{KeyRestriction, OptimisticLock};
use crate::mutation::table_mutation::{check_value_binding, TableDelete, TableInsert, TableUpdate};

pub struct TableInsertBuilder {
    table: Arc<TableDetails>,
    bindings: Vec<ColumnValueBinding>,
    generated_key: bool,
}

impl TableInsertBuilder {
    pub fn new(table: Arc<TableDetails>) -> Self {
        Self {
            table,
            bindings: Vec::new(),
            generated_key: false,
        }
    }

    /// The database assigns the key; key columns may not be bound.
    pub fn generated_key(mut self, generated: bool) -> Self {
        self.generated_key = generated;
        self
    }

    pub fn add_value_binding(&mut self, binding: ColumnValueBinding) -> Result<()> {
        check_value_binding(&self.table, &self.bindings, &binding, !self.generated_key)?;
        self.bindings.push(binding);
        Ok(())
    }

    pub fn set(&mut self, column: &str, value: ValueSource) -> Result<()> {
        let column = ColumnReference::of_table(&self.table, column);
        self.add_value_binding(ColumnValueBinding::new(column, value))
    }

    pub fn number_of_value_bindings(&self) -> usize {
        self.bindings.len()
    }

    pub fn build(self) -> Result<TableInsert> {
        TableInsert::from_checked(self.table, self.bindings, self.generated_key)
    }
}

pub struct TableUpdateBuilder {
    table: Arc<TableDetails>,
    bindings: Vec<ColumnValueBinding>,
    restriction: Option<KeyRestriction>,
    lock: Option<OptimisticLock>,
}

impl TableUpdateBuilder {
    pub fn new(table: Arc<TableDetails>) -> Self {
        Self {
            table,
            bindings: Vec::new(),
            restriction: None,
            lock: None,
        }
    }

    pub fn table(&self) -> &Arc<TableDetails> {
        &self.table
    }

    /// Fails fast on key columns, columns of other tables and duplicates.
    pub fn add_value_binding(&mut self, binding: ColumnValueBinding) -> Result<()> {
        check_value_binding(&self.table, &self.bindings, &binding, false)?;
        self.bindings.push(binding);
        Ok(())
    }

    pub fn set(&mut self, column: &str, value: ValueSource) -> Result<()> {
        let column = ColumnReference::of_table(&self.table, column);
        self.add_value_binding(ColumnValueBinding::new(column, value))
    }

    pub fn restrict_by_key(&mut self, values: Vec<ValueSource>) -> Result<()> {
        self.restriction = Some(KeyRestriction::from_key(&self.table, values)?);
        Ok(())
    }

    pub fn optimistic_lock(&mut self, column: &str, expected: ValueSource) -> Result<()> {
        self.lock = Some(OptimisticLock::new(&self.table, column, expected)?);
        Ok(())
    }

    pub fn number_of_value_bindings(&self) -> usize {
        self.bindings.len()
    }

    pub fn has_optimistic_lock(&self) -> bool {
        self.lock.is_some()
    }

    /// Without an explicit key restriction, one placeholder per key column.
    pub fn build(self) -> Result<TableUpdate> {
        let restriction = match self.restriction {
            Some(restriction) => restriction,
            None => KeyRestriction::parameterized(&self.table),
        };
        TableUpdate::new(self.table, self.bindings, restriction, self.lock)
    }
}

pub struct TableDeleteBuilder {
    table: Arc<TableDetails>,
    restriction: Option<KeyRestriction>,
    lock: Option<OptimisticLock>,
}

impl TableDeleteBuilder {
    pub fn new(table: Arc<TableDetails>) -> Self {
        Self {
            table,
            restriction: None,
            lock: None,
        }
    }

    pub fn restrict_by_key(&mut self, values: Vec<ValueSource>) -> Result<()> {
        self.restriction = Some(KeyRestriction::from_key(&self.table, values)?);
        Ok(())
    }

    pub fn optimistic_lock(&mut self, column: &str, expected: ValueSource) -> Result<()> {
        self.lock = Some(OptimisticLock::new(&self.table, column, expected)?);
        Ok(())
    }

    pub fn build(self) -> Result<TableDelete> {
        let restriction = match self.restriction {
            Some(restriction) => restriction,
            None => KeyRestriction::parameterized(&self.table),
        };
        TableDelete::new(self.table, restriction, self.lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RelmapError};
    use crate::model::jdbc::JdbcType;
    use crate::mutation::table_mutation::TableMutation;

    fn orders() -> Arc<TableDetails> {
        Arc::new(
            TableDetails::builder("orders")
                .key_column("id", JdbcType::Integer)
                .column("status", JdbcType::Varchar)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_orders_status_scenario() {
        let mut builder = TableUpdateBuilder::new(orders());
        builder.set("status", ValueSource::literal("SHIPPED")).unwrap();

        let err = builder.set("id", ValueSource::literal(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelIntegrity);
        // the rejected binding left the builder untouched
        assert_eq!(builder.number_of_value_bindings(), 1);

        let update = builder.build().unwrap();
        assert_eq!(update.number_of_value_bindings(), 1);
        assert_eq!(
            update.value_bindings()[0]
                .column()
                .jdbc_mapping()
                .map(|m| m.jdbc_type()),
            Some(JdbcType::Varchar)
        );
    }

    #[test]
    fn test_update_restrict_by_key_arity() {
        let mut builder = TableUpdateBuilder::new(orders());
        assert!(builder
            .restrict_by_key(vec![ValueSource::literal(1), ValueSource::literal(2)])
            .is_err());
        builder.restrict_by_key(vec![ValueSource::literal(1)]).unwrap();
        let update = builder.build().unwrap();
        assert!(update.parameter_slots().is_empty());
    }

    #[test]
    fn test_insert_builder() {
        let mut builder = TableInsertBuilder::new(orders());
        builder.set("status", ValueSource::literal("NEW")).unwrap();
        assert!(builder.set("status", ValueSource::literal("NEW")).is_err());
        assert_eq!(builder.build().unwrap_err().kind(), ErrorKind::ModelIntegrity);

        let mut generated = TableInsertBuilder::new(orders()).generated_key(true);
        assert!(matches!(
            generated.set("id", ValueSource::literal(1)).unwrap_err(),
            RelmapError::KeyColumnBinding { .. }
        ));
        generated.set("status", ValueSource::literal("NEW")).unwrap();
        assert!(generated.build().unwrap().has_generated_key());
    }

    #[test]
    fn test_delete_builder_defaults_to_parameters() {
        let delete = TableDeleteBuilder::new(orders()).build().unwrap();
        assert_eq!(delete.parameter_slots().len(), 1);
        assert_eq!(delete.number_of_value_bindings(), 0);
    }
}
