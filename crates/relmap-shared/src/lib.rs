//! Shared configuration and observability for relmap

pub mod config;
pub mod observability;

pub use config::*;
pub use observability::*;
