//! Flush-side mutation statement model.

pub mod binding;
pub mod builder;
pub mod flush;
pub mod restriction;
pub mod table_mutation;

pub use binding::{ColumnReference, ColumnValueBinding, ParameterUsage, ValueSource};
pub use builder::{TableDeleteBuilder, TableInsertBuilder, TableUpdateBuilder};
pub use flush::{
    EntityAction, EntityChange, FlushCoordinator, FlushOptions, MutationSink, StateChange,
    VersionCheck,
};
pub use restriction::{KeyRestriction, OptimisticLock};
pub use table_mutation::{
    MutationKind, MutationOperation, ParameterSlot, RestrictedTableMutation, TableDelete,
    TableInsert, TableMutation, TableUpdate,
};
