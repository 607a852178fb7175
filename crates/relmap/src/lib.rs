//! `relmap`: convenience façade over `relmap-core`, `relmap-derive` and `relmap-shared`.

#![deny(missing_docs)]

/// Re-export **everything** from relmap-core at the crate root, so users can `use relmap::*;`.
#[doc(inline)]
pub use relmap_core::*;

/// Also expose relmap-core as a nested module for `relmap::core::...` paths.
pub use relmap_core as core;

/// Configuration and observability bootstrap.
pub use relmap_shared as shared;
pub use relmap_shared::{ObservabilitySystem, RelmapConfig};

/// Re-export the derive macro so downstream crates can `#[derive(Entity)]`
/// after depending only on `relmap` (with feature `derive` enabled).
#[cfg(feature = "derive")]
#[doc(inline)]
pub use relmap_derive::Entity;

mod metamodel;

pub use metamodel::Metamodel;
