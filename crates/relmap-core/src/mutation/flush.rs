//! Turning detected entity state changes into ordered table mutations.
//!
//! Planning is all-or-nothing: a change set that fails validation hands
//! nothing to the [`MutationSink`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{RelmapError, Result};
use crate::model::ident::same_column;
use crate::model::mapping::{EntityMapping, MappingModel};
use crate::model::table::TableDetails;
use crate::mutation::binding::{ParameterUsage, ValueSource};
use crate::mutation::builder::{TableDeleteBuilder, TableInsertBuilder, TableUpdateBuilder};
use crate::mutation::table_mutation::MutationOperation;
use crate::obs::CoreMetrics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushOptions {
    /// Omit updates with no bindings and no version check.
    pub skip_empty_updates: bool,
}

impl Default for FlushOptions {
    fn default() -> Self {
        Self {
            skip_empty_updates: true,
        }
    }
}

/// One changed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub table: String,
    pub column: String,
    pub value: ValueSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    Insert,
    Update,
    Delete,
}

/// Optimistic version check on the identifier table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionCheck {
    pub column: String,
    pub expected: ValueSource,
    /// Value written on update; inserts write `expected`.
    pub next: Option<ValueSource>,
}

/// Detected change set of one entity instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityChange {
    pub entity: String,
    pub action: EntityAction,
    /// Key values in key column order; empty means bound later.
    pub identifier: Vec<ValueSource>,
    pub version: Option<VersionCheck>,
    pub changes: Vec<StateChange>,
}

impl EntityChange {
    fn new(entity: &str, action: EntityAction, identifier: Vec<ValueSource>) -> Self {
        Self {
            entity: entity.to_string(),
            action,
            identifier,
            version: None,
            changes: Vec::new(),
        }
    }

    pub fn insert(entity: &str, identifier: Vec<ValueSource>) -> Self {
        Self::new(entity, EntityAction::Insert, identifier)
    }

    pub fn update(entity: &str, identifier: Vec<ValueSource>) -> Self {
        Self::new(entity, EntityAction::Update, identifier)
    }

    pub fn delete(entity: &str, identifier: Vec<ValueSource>) -> Self {
        Self::new(entity, EntityAction::Delete, identifier)
    }

    pub fn with_change(mut self, table: &str, column: &str, value: ValueSource) -> Self {
        self.changes.push(StateChange {
            table: table.to_string(),
            column: column.to_string(),
            value,
        });
        self
    }

    pub fn with_version(
        mut self,
        column: &str,
        expected: ValueSource,
        next: Option<ValueSource>,
    ) -> Self {
        self.version = Some(VersionCheck {
            column: column.to_string(),
            expected,
            next,
        });
        self
    }
}

/// Outbound collaborator receiving planned mutations in order.
#[cfg_attr(test, mockall::automock)]
pub trait MutationSink {
    fn accept(&mut self, operation: MutationOperation) -> Result<()>;
}

impl MutationSink for Vec<MutationOperation> {
    fn accept(&mut self, operation: MutationOperation) -> Result<()> {
        self.push(operation);
        Ok(())
    }
}

pub struct FlushCoordinator {
    mapping: Arc<MappingModel>,
    options: FlushOptions,
}

impl FlushCoordinator {
    pub fn new(mapping: Arc<MappingModel>, options: FlushOptions) -> Self {
        Self { mapping, options }
    }

    pub fn options(&self) -> &FlushOptions {
        &self.options
    }

    /// Plan the mutations for one entity change.
    #[instrument(skip(self, change), fields(entity = %change.entity, action = ?change.action))]
    pub fn plan(&self, change: &EntityChange) -> Result<Vec<MutationOperation>> {
        let planned = self.plan_change(change);
        match &planned {
            Ok(ops) => {
                for op in ops {
                    CoreMetrics::mutation_planned(op.kind().as_str(), op.table_name());
                }
                debug!(mutations = ops.len(), "change planned");
            }
            Err(err) => {
                warn!(error = %err, "change set rejected");
                CoreMetrics::flush_rejected(err);
            }
        }
        planned
    }

    /// Plan every change or none.
    pub fn plan_all(&self, changes: &[EntityChange]) -> Result<Vec<MutationOperation>> {
        let mut operations = Vec::new();
        for change in changes {
            operations.extend(self.plan(change)?);
        }
        Ok(operations)
    }

    /// Plan everything, then hand operations to `sink` in order.
    #[instrument(skip_all, fields(changes = changes.len()))]
    pub fn flush(&self, changes: &[EntityChange], sink: &mut dyn MutationSink) -> Result<usize> {
        let operations = self.plan_all(changes)?;
        let count = operations.len();
        for operation in operations {
            sink.accept(operation)?;
        }
        Ok(count)
    }

    fn plan_change(&self, change: &EntityChange) -> Result<Vec<MutationOperation>> {
        let mapping = self.mapping.entity_mapping_named(&change.entity)?;
        self.check_changes(mapping, change)?;
        match change.action {
            EntityAction::Insert => self.plan_insert(mapping, change),
            EntityAction::Update => self.plan_update(mapping, change),
            EntityAction::Delete => self.plan_delete(mapping, change),
        }
    }

    fn check_changes(&self, mapping: &EntityMapping, change: &EntityChange) -> Result<()> {
        let identifier_table = mapping.identifier_table();
        for state in &change.changes {
            let table = mapping.table(&state.table).ok_or_else(|| RelmapError::ForeignColumn {
                table: state.table.clone(),
                column: state.column.clone(),
                expected: identifier_table.table_name().to_string(),
            })?;
            if table.is_key_column(&state.column) {
                return Err(RelmapError::KeyColumnBinding {
                    table: table.table_name().to_string(),
                    column: state.column.clone(),
                });
            }
        }
        if change.action == EntityAction::Delete && !change.changes.is_empty() {
            return Err(RelmapError::integrity(format!(
                "delete of `{}` carries {} state changes",
                change.entity,
                change.changes.len()
            )));
        }
        let arity = identifier_table.key_details().column_count();
        if !change.identifier.is_empty() && change.identifier.len() != arity {
            return Err(RelmapError::integrity(format!(
                "`{}` identifier has {} values, key of `{}` has {} columns",
                change.entity,
                change.identifier.len(),
                identifier_table.table_name(),
                arity
            )));
        }
        Ok(())
    }

    fn changes_for<'a>(
        change: &'a EntityChange,
        table: &'a TableDetails,
    ) -> impl Iterator<Item = &'a StateChange> + 'a {
        change
            .changes
            .iter()
            .filter(move |c| same_column(&c.table, table.table_name()))
    }

    fn plan_insert(
        &self,
        mapping: &EntityMapping,
        change: &EntityChange,
    ) -> Result<Vec<MutationOperation>> {
        let mut operations = Vec::with_capacity(mapping.tables().len());
        for table in mapping.tables() {
            let is_identifier = table.is_identifier_table();
            let generated = change.identifier.is_empty() && is_identifier;
            let mut builder = TableInsertBuilder::new(table.clone()).generated_key(generated);

            if !generated {
                for (position, key_column) in table.key_details().iter() {
                    let value = change
                        .identifier
                        .get(position)
                        .cloned()
                        .unwrap_or(ValueSource::Parameter(ParameterUsage::Set));
                    builder.set(key_column.column_name(), value)?;
                }
            }
            if let (true, Some(version)) = (is_identifier, &change.version) {
                builder.set(&version.column, version.expected.clone())?;
            }
            for state in Self::changes_for(change, table) {
                builder.set(&state.column, state.value.clone())?;
            }
            operations.push(builder.build()?.into());
        }
        Ok(operations)
    }

    fn plan_update(
        &self,
        mapping: &EntityMapping,
        change: &EntityChange,
    ) -> Result<Vec<MutationOperation>> {
        let mut operations = Vec::new();
        for table in mapping.tables() {
            let version = change.version.as_ref().filter(|_| table.is_identifier_table());
            let mut builder = TableUpdateBuilder::new(table.clone());
            for state in Self::changes_for(change, table) {
                builder.set(&state.column, state.value.clone())?;
            }
            if let Some(version) = version {
                if let Some(next) = &version.next {
                    builder.set(&version.column, next.clone())?;
                }
                builder.optimistic_lock(&version.column, version.expected.clone())?;
            }
            if builder.number_of_value_bindings() == 0
                && !builder.has_optimistic_lock()
                && self.options.skip_empty_updates
            {
                continue;
            }
            if !change.identifier.is_empty() {
                builder.restrict_by_key(change.identifier.clone())?;
            }
            operations.push(builder.build()?.into());
        }
        Ok(operations)
    }

    fn plan_delete(
        &self,
        mapping: &EntityMapping,
        change: &EntityChange,
    ) -> Result<Vec<MutationOperation>> {
        let mut operations = Vec::with_capacity(mapping.tables().len());
        // joined tables reference the identifier table, so it goes last
        for table in mapping.tables().iter().rev() {
            let mut builder = TableDeleteBuilder::new(table.clone());
            if !change.identifier.is_empty() {
                builder.restrict_by_key(change.identifier.clone())?;
            }
            if let (true, Some(version)) = (table.is_identifier_table(), &change.version) {
                builder.optimistic_lock(&version.column, version.expected.clone())?;
            }
            operations.push(builder.build()?.into());
        }
        Ok(operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::domain::tests::shop_model;
    use crate::model::domain::{DomainModel, TypeSpec};
    use crate::model::jdbc::JdbcType;
    use crate::model::mapping::MappingOptions;
    use crate::mutation::table_mutation::{MutationKind, TableMutation};

    fn coordinator(options: FlushOptions) -> FlushCoordinator {
        let mapping = MappingModel::derive(&shop_model(), &MappingOptions::default()).unwrap();
        FlushCoordinator::new(Arc::new(mapping), options)
    }

    fn tables(ops: &[MutationOperation]) -> Vec<&str> {
        ops.iter().map(|op| op.table_name()).collect()
    }

    #[test]
    fn test_insert_visits_identifier_table_first() {
        let flush = coordinator(FlushOptions::default());
        let change = EntityChange::insert("PremiumCustomer", vec![ValueSource::literal(5)])
            .with_change("customers", "name", ValueSource::literal("Ada"))
            .with_change("premium_customers", "loyalty_tier", ValueSource::literal("gold"));

        let ops = flush.plan(&change).unwrap();
        assert_eq!(tables(&ops), vec!["customers", "premium_customers"]);
        assert!(ops.iter().all(|op| op.kind() == MutationKind::Insert));
        // key column bound on both tables
        assert_eq!(ops[1].as_table_mutation().value_bindings()[0].column_name(), "id");
    }

    #[test]
    fn test_delete_visits_identifier_table_last() {
        let flush = coordinator(FlushOptions::default());
        let ops = flush
            .plan(&EntityChange::delete("PremiumCustomer", vec![ValueSource::literal(5)]))
            .unwrap();
        assert_eq!(tables(&ops), vec!["premium_customers", "customers"]);
    }

    #[test]
    fn test_update_only_changed_tables() {
        let flush = coordinator(FlushOptions::default());
        let change = EntityChange::update("PremiumCustomer", vec![ValueSource::literal(5)])
            .with_change("premium_customers", "loyalty_tier", ValueSource::literal("platinum"));
        let ops = flush.plan(&change).unwrap();
        assert_eq!(tables(&ops), vec!["premium_customers"]);

        let all = coordinator(FlushOptions {
            skip_empty_updates: false,
        });
        assert_eq!(all.plan(&change).unwrap().len(), 2);
    }

    #[test]
    fn test_version_check_touches_identifier_table() {
        let domain = DomainModel::builder()
            .add_type(
                TypeSpec::entity("Order")
                    .table("orders")
                    .id("id", JdbcType::BigInt)
                    .basic("status", JdbcType::Varchar)
                    .basic("version", JdbcType::Integer),
            )
            .build()
            .unwrap();
        let mapping = MappingModel::derive(&domain, &MappingOptions::default()).unwrap();
        let flush = FlushCoordinator::new(Arc::new(mapping), FlushOptions::default());

        let change = EntityChange::update("Order", Vec::new()).with_version(
            "version",
            ValueSource::Parameter(ParameterUsage::Restrict),
            Some(ValueSource::Parameter(ParameterUsage::Set)),
        );
        let ops = flush.plan(&change).unwrap();
        assert_eq!(ops.len(), 1);
        let slots = ops[0].as_table_mutation().parameter_slots();
        let usages: Vec<_> = slots.iter().map(|s| (s.usage, s.column.column_name())).collect();
        assert_eq!(
            usages,
            vec![
                (ParameterUsage::Set, "version"),
                (ParameterUsage::Restrict, "id"),
                (ParameterUsage::Restrict, "version"),
            ]
        );
    }

    #[test]
    fn test_key_column_change_rejected() {
        let flush = coordinator(FlushOptions::default());
        let change = EntityChange::update("Order", vec![ValueSource::literal(1)])
            .with_change("orders", "ID", ValueSource::literal(2));
        let err = flush.plan(&change).unwrap_err();
        assert!(matches!(err, RelmapError::KeyColumnBinding { .. }));
        assert_eq!(err.kind(), ErrorKind::ModelIntegrity);
    }

    #[test]
    fn test_foreign_table_change_rejected() {
        let flush = coordinator(FlushOptions::default());
        let change = EntityChange::update("Customer", vec![ValueSource::literal(1)])
            .with_change("premium_customers", "loyalty_tier", ValueSource::literal("gold"));
        assert!(matches!(
            flush.plan(&change).unwrap_err(),
            RelmapError::ForeignColumn { .. }
        ));
    }

    #[test]
    fn test_unknown_entity() {
        let flush = coordinator(FlushOptions::default());
        let err = flush.plan(&EntityChange::delete("Invoice", Vec::new())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_generated_identifier_insert() {
        let flush = coordinator(FlushOptions::default());
        let ops = flush
            .plan(&EntityChange::insert("PremiumCustomer", Vec::new()))
            .unwrap();
        match &ops[0] {
            MutationOperation::Insert(insert) => assert!(insert.has_generated_key()),
            other => panic!("expected insert, got {other}"),
        }
        assert_eq!(ops[1].as_table_mutation().parameter_slots().len(), 1);
    }

    #[test]
    fn test_flush_hands_off_in_order() {
        let flush = coordinator(FlushOptions::default());
        let changes = vec![
            EntityChange::insert("Customer", vec![ValueSource::literal(1)])
                .with_change("customers", "name", ValueSource::literal("Ada")),
            EntityChange::update("Order", vec![ValueSource::literal(9)])
                .with_change("orders", "status", ValueSource::literal("SHIPPED")),
        ];

        let mut sink = MockMutationSink::new();
        let mut seq = mockall::Sequence::new();
        sink.expect_accept()
            .withf(|op| op.table_name() == "customers")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        sink.expect_accept()
            .withf(|op| op.table_name() == "orders" && op.kind() == MutationKind::Update)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        assert_eq!(flush.flush(&changes, &mut sink).unwrap(), 2);
    }

    #[test]
    fn test_flush_failure_hands_off_nothing() {
        let flush = coordinator(FlushOptions::default());
        let changes = vec![
            EntityChange::update("Order", vec![ValueSource::literal(9)])
                .with_change("orders", "status", ValueSource::literal("SHIPPED")),
            EntityChange::update("Order", vec![ValueSource::literal(9)])
                .with_change("orders", "id", ValueSource::literal(10)),
        ];

        let mut sink = MockMutationSink::new();
        sink.expect_accept().never();
        assert!(flush.flush(&changes, &mut sink).is_err());

        let mut collected: Vec<MutationOperation> = Vec::new();
        assert!(flush.flush(&changes[..1], &mut collected).is_ok());
        assert_eq!(collected.len(), 1);
    }

    #[test]
    fn test_entity_change_serde() {
        let change = EntityChange::update("Order", vec![ValueSource::literal(1)])
            .with_change("orders", "status", ValueSource::literal("SHIPPED"));
        let json = serde_json::to_string(&change).unwrap();
        let back: EntityChange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, change);
    }
}
