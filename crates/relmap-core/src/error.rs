//! Error types for relmap core

use thiserror::Error;

/// Coarse classification of a [`RelmapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A query path could not be resolved (unknown attribute, invalid downcast).
    PathResolution,
    /// The mapping model or a change set violates a structural invariant.
    ModelIntegrity,
    /// A positional or named lookup missed.
    NotFound,
    Configuration,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PathResolution => "path_resolution",
            ErrorKind::ModelIntegrity => "model_integrity",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelmapError {
    #[error("Path resolution error: attribute `{attribute}` does not exist on `{type_name}`")]
    UnknownAttribute { type_name: String, attribute: String },

    #[error("Path resolution error: cannot treat `{from}` as unrelated type `{to}`")]
    InvalidTreat { from: String, to: String },

    #[error("Path resolution error: `{path}` cannot be dereferenced ({reason})")]
    NotNavigable { path: String, reason: String },

    #[error("Path resolution error: unknown domain type `{0}`")]
    UnknownType(String),

    #[error("Path resolution error: invalid navigable path `{input}`: {reason}")]
    InvalidPath { input: String, reason: String },

    #[error("Model integrity error: {0}")]
    ModelIntegrity(String),

    #[error(
        "Model integrity error: key column `{column}` of table `{table}` cannot be bound as a value"
    )]
    KeyColumnBinding { table: String, column: String },

    #[error(
        "Model integrity error: column `{table}`.`{column}` does not belong to table `{expected}`"
    )]
    ForeignColumn {
        table: String,
        column: String,
        expected: String,
    },

    #[error("Model integrity error: column `{column}` bound more than once on table `{table}`")]
    DuplicateColumn { table: String, column: String },

    #[error(
        "Not found: key column #{position} out of range for table `{table}` ({count} columns)"
    )]
    KeyColumnOutOfRange {
        table: String,
        position: usize,
        count: usize,
    },

    #[error("Not found: table `{0}`")]
    TableNotFound(String),

    #[error("Not found: entity `{0}` has no table mapping")]
    EntityNotMapped(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0} does not belong to this query tree")]
    ForeignNode(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, RelmapError>;

impl RelmapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelmapError::UnknownAttribute { .. }
            | RelmapError::InvalidTreat { .. }
            | RelmapError::NotNavigable { .. }
            | RelmapError::UnknownType(_)
            | RelmapError::InvalidPath { .. } => ErrorKind::PathResolution,
            RelmapError::ModelIntegrity(_)
            | RelmapError::KeyColumnBinding { .. }
            | RelmapError::ForeignColumn { .. }
            | RelmapError::DuplicateColumn { .. } => ErrorKind::ModelIntegrity,
            RelmapError::KeyColumnOutOfRange { .. }
            | RelmapError::TableNotFound(_)
            | RelmapError::EntityNotMapped(_) => ErrorKind::NotFound,
            RelmapError::ConfigError(_) => ErrorKind::Configuration,
            RelmapError::ForeignNode(_) | RelmapError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Nothing in this crate fails transiently.
    pub fn is_retryable(&self) -> bool {
        false
    }

    pub(crate) fn integrity(message: impl Into<String>) -> Self {
        RelmapError::ModelIntegrity(message.into())
    }
}

impl From<anyhow::Error> for RelmapError {
    fn from(err: anyhow::Error) -> Self {
        RelmapError::InternalError(err.to_string())
    }
}
