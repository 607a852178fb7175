//! Query-side path expressions.

pub mod expr;
pub mod navigable;
pub mod tree;

pub use expr::{ExprId, Expression, PartKind, PathId, PathSource, PathType};
pub use navigable::{NavigablePath, Segment};
pub use tree::QueryTree;
