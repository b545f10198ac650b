//! Error types for the repository layer.

use crate::config::ValidationError;
use thiserror::Error;

/// Errors reported by a store client.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource conflict: {0}")]
    Conflict(String),

    #[error("Request throttled, retry after {retry_after_ms}ms")]
    Throttled { retry_after_ms: u64 },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Top-level repository errors
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Item type not registered: {0}")]
    UnregisteredItemType(String),

    #[error("Invalid partition key path for item type '{item_type}': '{path}' (must start with '/')")]
    InvalidPartitionKeyPath { item_type: String, path: String },

    #[error(
        "Container '{container}' is partitioned on '{actual}' but '{expected}' is configured; \
         partition keys cannot change on an existing container"
    )]
    PartitionKeyMismatch {
        container: String,
        expected: String,
        actual: String,
    },

    #[error("Continuation token paging requires a page size")]
    MissingPageSize,

    #[error("Provisioning container '{container}' failed: {source}")]
    Provisioning {
        container: String,
        #[source]
        source: StoreError,
    },

    #[error("Query execution failed: {0}")]
    QueryExecution(#[source] StoreError),

    #[error("Failed to deserialize item: {0}")]
    Deserialization(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Repository options are invalid:\n{}", format_validation(.0))]
    Validation(Vec<ValidationError>),
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl RepositoryError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RepositoryError::Cancelled)
    }

    /// True for errors raised before any store round trip.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RepositoryError::Configuration(_)
                | RepositoryError::UnregisteredItemType(_)
                | RepositoryError::InvalidPartitionKeyPath { .. }
                | RepositoryError::PartitionKeyMismatch { .. }
                | RepositoryError::MissingPageSize
                | RepositoryError::Validation(_)
        )
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Deserialization(err.to_string())
    }
}

impl From<config::ConfigError> for RepositoryError {
    fn from(err: config::ConfigError) -> Self {
        RepositoryError::Configuration(err.to_string())
    }
}
