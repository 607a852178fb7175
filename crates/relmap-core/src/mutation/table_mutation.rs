//! Table-level mutation statements handed to dialect rendering.
//!
//! A mutation is built for exactly one flush and never reused. Value
//! bindings keep their insertion order; rendered parameter positions are
//! derived from that order, see [`TableMutation::parameter_slots`].

use std::fmt;
use std::sync::Arc;

use crate::error::{RelmapError, Result};
use crate::model::ident::same_column;
use crate::model::table::TableDetails;
use crate::mutation::binding::{ColumnReference, ColumnValueBinding, ParameterUsage};
use crate::mutation::restriction::{KeyRestriction, OptimisticLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Insert => "insert",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `?` placeholder in rendered order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSlot {
    pub position: usize,
    pub usage: ParameterUsage,
    pub column: ColumnReference,
}

fn collect_slots<'a>(bindings: impl Iterator<Item = &'a ColumnValueBinding>) -> Vec<ParameterSlot> {
    bindings
        .filter_map(|b| b.value().parameter_usage().map(|usage| (usage, b.column().clone())))
        .enumerate()
        .map(|(position, (usage, column))| ParameterSlot {
            position,
            usage,
            column,
        })
        .collect()
}

pub trait TableMutation {
    fn table(&self) -> &Arc<TableDetails>;

    fn kind(&self) -> MutationKind;

    /// Ordered value bindings; may be empty.
    fn value_bindings(&self) -> &[ColumnValueBinding];

    fn number_of_value_bindings(&self) -> usize {
        self.value_bindings().len()
    }

    /// Visit bindings in order, positions from 0.
    fn for_each_value_binding(&self, consumer: &mut dyn FnMut(usize, &ColumnValueBinding)) {
        for (position, binding) in self.value_bindings().iter().enumerate() {
            consumer(position, binding);
        }
    }

    fn table_name(&self) -> &str {
        self.table().table_name()
    }

    /// Placeholders in rendered order: value bindings, then any restriction.
    fn parameter_slots(&self) -> Vec<ParameterSlot> {
        collect_slots(self.value_bindings().iter())
    }
}

/// Mutations that target one existing row through its key.
pub trait RestrictedTableMutation: TableMutation {
    fn key_restriction(&self) -> &KeyRestriction;

    fn optimistic_lock(&self) -> Option<&OptimisticLock>;
}

fn restricted_slots<M: RestrictedTableMutation + ?Sized>(mutation: &M) -> Vec<ParameterSlot> {
    collect_slots(
        mutation
            .value_bindings()
            .iter()
            .chain(mutation.key_restriction().bindings())
            .chain(mutation.optimistic_lock().map(OptimisticLock::binding)),
    )
}

/// Validate a binding against the target table and the bindings so far.
pub(crate) fn check_value_binding(
    table: &TableDetails,
    existing: &[ColumnValueBinding],
    binding: &ColumnValueBinding,
    allow_key: bool,
) -> Result<()> {
    let column = binding.column_name();
    if !binding.column().belongs_to(table) {
        return Err(RelmapError::ForeignColumn {
            table: binding.column().table_name().to_string(),
            column: column.to_string(),
            expected: table.table_name().to_string(),
        });
    }
    if !allow_key && table.is_key_column(column) {
        return Err(RelmapError::KeyColumnBinding {
            table: table.table_name().to_string(),
            column: column.to_string(),
        });
    }
    if existing.iter().any(|b| same_column(b.column_name(), column)) {
        return Err(RelmapError::DuplicateColumn {
            table: table.table_name().to_string(),
            column: column.to_string(),
        });
    }
    Ok(())
}

fn check_restriction(table: &TableDetails, restriction: &KeyRestriction) -> Result<()> {
    let key = table.key_details();
    if restriction.len() != key.column_count() {
        return Err(RelmapError::integrity(format!(
            "restriction on `{}` binds {} of {} key columns",
            table.table_name(),
            restriction.len(),
            key.column_count()
        )));
    }
    for (binding, (_, key_column)) in restriction.bindings().iter().zip(key.iter()) {
        if !binding.column().belongs_to(table)
            || !same_column(binding.column_name(), key_column.column_name())
        {
            return Err(RelmapError::integrity(format!(
                "restriction column `{}` does not match key column `{}` of `{}`",
                binding.column(),
                key_column.column_name(),
                table.table_name()
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableInsert {
    table: Arc<TableDetails>,
    bindings: Vec<ColumnValueBinding>,
    generated_key: bool,
}

impl TableInsert {
    /// Key columns must all be bound unless the key is generated, in
    /// which case none may be.
    pub fn new(
        table: Arc<TableDetails>,
        bindings: Vec<ColumnValueBinding>,
        generated_key: bool,
    ) -> Result<Self> {
        let mut checked: Vec<ColumnValueBinding> = Vec::with_capacity(bindings.len());
        for binding in bindings {
            check_value_binding(&table, &checked, &binding, !generated_key)?;
            checked.push(binding);
        }
        Self::from_checked(table, checked, generated_key)
    }

    pub(crate) fn from_checked(
        table: Arc<TableDetails>,
        bindings: Vec<ColumnValueBinding>,
        generated_key: bool,
    ) -> Result<Self> {
        if !generated_key {
            for (_, key_column) in table.key_details().iter() {
                let key_name = key_column.column_name();
                if !bindings.iter().any(|b| same_column(b.column_name(), key_name)) {
                    return Err(RelmapError::integrity(format!(
                        "insert into `{}` is missing key column `{}`",
                        table.table_name(),
                        key_column.column_name()
                    )));
                }
            }
        }
        Ok(Self {
            table,
            bindings,
            generated_key,
        })
    }

    pub fn has_generated_key(&self) -> bool {
        self.generated_key
    }
}

impl TableMutation for TableInsert {
    fn table(&self) -> &Arc<TableDetails> {
        &self.table
    }

    fn kind(&self) -> MutationKind {
        MutationKind::Insert
    }

    fn value_bindings(&self) -> &[ColumnValueBinding] {
        &self.bindings
    }
}

/// Update of non-key columns of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct TableUpdate {
    table: Arc<TableDetails>,
    bindings: Vec<ColumnValueBinding>,
    restriction: KeyRestriction,
    lock: Option<OptimisticLock>,
}

impl TableUpdate {
    /// Fails on any key column, foreign column or duplicate binding.
    pub fn new(
        table: Arc<TableDetails>,
        bindings: Vec<ColumnValueBinding>,
        restriction: KeyRestriction,
        lock: Option<OptimisticLock>,
    ) -> Result<Self> {
        let mut checked: Vec<ColumnValueBinding> = Vec::with_capacity(bindings.len());
        for binding in bindings {
            check_value_binding(&table, &checked, &binding, false)?;
            checked.push(binding);
        }
        check_restriction(&table, &restriction)?;
        Ok(Self {
            table,
            bindings: checked,
            restriction,
            lock,
        })
    }
}

impl TableMutation for TableUpdate {
    fn table(&self) -> &Arc<TableDetails> {
        &self.table
    }

    fn kind(&self) -> MutationKind {
        MutationKind::Update
    }

    fn value_bindings(&self) -> &[ColumnValueBinding] {
        &self.bindings
    }

    fn parameter_slots(&self) -> Vec<ParameterSlot> {
        restricted_slots(self)
    }
}

impl RestrictedTableMutation for TableUpdate {
    fn key_restriction(&self) -> &KeyRestriction {
        &self.restriction
    }

    fn optimistic_lock(&self) -> Option<&OptimisticLock> {
        self.lock.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDelete {
    table: Arc<TableDetails>,
    restriction: KeyRestriction,
    lock: Option<OptimisticLock>,
}

impl TableDelete {
    pub fn new(
        table: Arc<TableDetails>,
        restriction: KeyRestriction,
        lock: Option<OptimisticLock>,
    ) -> Result<Self> {
        check_restriction(&table, &restriction)?;
        Ok(Self {
            table,
            restriction,
            lock,
        })
    }
}

impl TableMutation for TableDelete {
    fn table(&self) -> &Arc<TableDetails> {
        &self.table
    }

    fn kind(&self) -> MutationKind {
        MutationKind::Delete
    }

    fn value_bindings(&self) -> &[ColumnValueBinding] {
        &[]
    }

    fn parameter_slots(&self) -> Vec<ParameterSlot> {
        restricted_slots(self)
    }
}

impl RestrictedTableMutation for TableDelete {
    fn key_restriction(&self) -> &KeyRestriction {
        &self.restriction
    }

    fn optimistic_lock(&self) -> Option<&OptimisticLock> {
        self.lock.as_ref()
    }
}

/// Any planned mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOperation {
    Insert(TableInsert),
    Update(TableUpdate),
    Delete(TableDelete),
}

impl MutationOperation {
    pub fn as_table_mutation(&self) -> &dyn TableMutation {
        match self {
            MutationOperation::Insert(m) => m,
            MutationOperation::Update(m) => m,
            MutationOperation::Delete(m) => m,
        }
    }

    pub fn kind(&self) -> MutationKind {
        self.as_table_mutation().kind()
    }

    pub fn table_name(&self) -> &str {
        self.as_table_mutation().table_name()
    }

    pub fn key_restriction(&self) -> Option<&KeyRestriction> {
        match self {
            MutationOperation::Insert(_) => None,
            MutationOperation::Update(m) => Some(m.key_restriction()),
            MutationOperation::Delete(m) => Some(m.key_restriction()),
        }
    }
}

impl fmt::Display for MutationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.as_table_mutation();
        write!(f, "{} {} [", m.kind(), m.table_name())?;
        for (i, binding) in m.value_bindings().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", binding.column_name())?;
        }
        f.write_str("]")
    }
}

impl From<TableInsert> for MutationOperation {
    fn from(m: TableInsert) -> Self {
        MutationOperation::Insert(m)
    }
}

impl From<TableUpdate> for MutationOperation {
    fn from(m: TableUpdate) -> Self {
        MutationOperation::Update(m)
    }
}

impl From<TableDelete> for MutationOperation {
    fn from(m: TableDelete) -> Self {
        MutationOperation::Delete(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::jdbc::JdbcType;
    use crate::mutation::binding::ValueSource;

    fn orders() -> Arc<TableDetails> {
        Arc::new(
            TableDetails::builder("orders")
                .key_column("id", JdbcType::Integer)
                .column("status", JdbcType::Varchar)
                .column("note", JdbcType::Text)
                .column("version", JdbcType::Integer)
                .build()
                .unwrap(),
        )
    }

    fn set(table: &TableDetails, column: &str, value: ValueSource) -> ColumnValueBinding {
        ColumnValueBinding::new(ColumnReference::of_table(table, column), value)
    }

    #[test]
    fn test_update_rejects_key_column() {
        let table = orders();
        let restriction = KeyRestriction::parameterized(&table);
        let err = TableUpdate::new(
            table.clone(),
            vec![set(&table, "id", ValueSource::literal(9))],
            restriction,
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelIntegrity);
        assert!(matches!(err, RelmapError::KeyColumnBinding { .. }));
    }

    #[test]
    fn test_update_counts_and_visits_in_order() {
        let table = orders();
        let update = TableUpdate::new(
            table.clone(),
            vec![
                set(&table, "status", ValueSource::literal("SHIPPED")),
                set(&table, "note", ValueSource::Parameter(ParameterUsage::Set)),
            ],
            KeyRestriction::parameterized(&table),
            None,
        )
        .unwrap();

        assert_eq!(update.number_of_value_bindings(), update.value_bindings().len());
        let mut seen = Vec::new();
        update.for_each_value_binding(&mut |pos, b| seen.push((pos, b.column_name().to_string())));
        assert_eq!(
            seen,
            vec![(0, "status".to_string()), (1, "note".to_string())]
        );
    }

    #[test]
    fn test_parameter_slot_order() {
        let table = orders();
        let update = TableUpdate::new(
            table.clone(),
            vec![
                set(&table, "status", ValueSource::Parameter(ParameterUsage::Set)),
                set(&table, "note", ValueSource::Parameter(ParameterUsage::Set)),
            ],
            KeyRestriction::parameterized(&table),
            Some(
                OptimisticLock::new(
                    &table,
                    "version",
                    ValueSource::Parameter(ParameterUsage::Restrict),
                )
                .unwrap(),
            ),
        )
        .unwrap();

        let slots: Vec<_> = update
            .parameter_slots()
            .into_iter()
            .map(|s| (s.position, s.usage, s.column.column_name().to_string()))
            .collect();
        assert_eq!(
            slots,
            vec![
                (0, ParameterUsage::Set, "status".to_string()),
                (1, ParameterUsage::Set, "note".to_string()),
                (2, ParameterUsage::Restrict, "id".to_string()),
                (3, ParameterUsage::Restrict, "version".to_string()),
            ]
        );
    }

    #[test]
    fn test_literals_take_no_slot() {
        let table = orders();
        let update = TableUpdate::new(
            table.clone(),
            vec![set(&table, "status", ValueSource::literal("SHIPPED"))],
            KeyRestriction::from_key(&table, vec![ValueSource::literal(1)]).unwrap(),
            None,
        )
        .unwrap();
        assert!(update.parameter_slots().is_empty());
    }

    #[test]
    fn test_empty_update_and_delete() {
        let table = orders();
        let restriction = KeyRestriction::parameterized(&table);
        let touch = TableUpdate::new(table.clone(), Vec::new(), restriction, None).unwrap();
        assert_eq!(touch.number_of_value_bindings(), 0);

        let restriction = KeyRestriction::parameterized(&table);
        let delete = TableDelete::new(table.clone(), restriction, None).unwrap();
        assert_eq!(delete.number_of_value_bindings(), 0);
        assert_eq!(delete.parameter_slots().len(), 1);

        let op = MutationOperation::from(delete);
        assert_eq!(op.kind(), MutationKind::Delete);
        assert_eq!(op.to_string(), "delete orders []");
    }

    #[test]
    fn test_insert_requires_key_unless_generated() {
        let table = orders();
        let status = set(&table, "status", ValueSource::literal("NEW"));

        let err = TableInsert::new(table.clone(), vec![status.clone()], false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelIntegrity);

        let insert = TableInsert::new(
            table.clone(),
            vec![set(&table, "id", ValueSource::literal(1)), status.clone()],
            false,
        )
        .unwrap();
        assert_eq!(insert.number_of_value_bindings(), 2);

        assert!(TableInsert::new(table.clone(), vec![status.clone()], true).is_ok());
        assert!(TableInsert::new(
            table.clone(),
            vec![set(&table, "id", ValueSource::literal(1)), status],
            true
        )
        .is_err());
    }

    #[test]
    fn test_foreign_and_duplicate_columns() {
        let table = orders();
        let foreign = ColumnValueBinding::new(
            ColumnReference::new("customers", "name"),
            ValueSource::literal("x"),
        );
        assert!(matches!(
            TableUpdate::new(
                table.clone(),
                vec![foreign],
                KeyRestriction::parameterized(&table),
                None,
            )
            .unwrap_err(),
            RelmapError::ForeignColumn { .. }
        ));

        let dup = vec![
            set(&table, "status", ValueSource::literal("A")),
            set(&table, "STATUS", ValueSource::literal("B")),
        ];
        assert!(matches!(
            TableUpdate::new(table.clone(), dup, KeyRestriction::parameterized(&table), None)
                .unwrap_err(),
            RelmapError::DuplicateColumn { .. }
        ));
    }

    #[test]
    fn test_restriction_must_match_table() {
        let table = orders();
        let other = TableDetails::builder("customers")
            .key_column("id", JdbcType::BigInt)
            .build()
            .unwrap();
        let err = TableDelete::new(table, KeyRestriction::parameterized(&other), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelIntegrity);
    }
}
