//! Configuration System
//!
//! Layered configuration for the repository: built-in defaults, an optional TOML
//! file (plus an environment-specific overlay), then `COSMOS_REPOSITORY__*`
//! environment variables. Holds the process-wide repository options, item type
//! declarations, and logging settings.

use crate::item::ItemTypeConfig;
use crate::logging::LoggingConfig;
use crate::store::IndexingPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub repository: RepositoryOptions,

    /// Item type declarations
    #[serde(default)]
    pub items: Vec<ItemTypeEntry>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Process-wide repository options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOptions {
    #[serde(default = "default_database_id")]
    pub database_id: String,

    /// Shared container used when `container_per_item_type` is false.
    #[serde(default = "default_container_id")]
    pub container_id: String,

    #[serde(default)]
    pub container_per_item_type: bool,
}

pub(crate) fn default_database_id() -> String {
    "database".to_string()
}

pub(crate) fn default_container_id() -> String {
    "container".to_string()
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            database_id: default_database_id(),
            container_id: default_container_id(),
            container_per_item_type: false,
        }
    }
}

impl RepositoryOptions {
    pub fn new(database_id: impl Into<String>, container_id: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            container_id: container_id.into(),
            container_per_item_type: false,
        }
    }

    /// One container per item type, named by each type's configuration.
    pub fn per_item_type(database_id: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            container_id: default_container_id(),
            container_per_item_type: true,
        }
    }

    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.database_id.trim().is_empty() {
            errors.push(ValidationError::Options(
                "database_id cannot be empty".to_string(),
            ));
        }
        if !self.container_per_item_type && self.container_id.trim().is_empty() {
            errors.push(ValidationError::Options(
                "container_id cannot be empty when containers are shared".to_string(),
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Item type declaration as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTypeEntry {
    pub type_name: String,

    pub container_name: String,

    #[serde(default = "default_partition_key_path")]
    pub partition_key_path: String,

    #[serde(default)]
    pub indexing_policy: IndexingPolicy,

    #[serde(default)]
    pub time_to_live_seconds: Option<i32>,

    #[serde(default)]
    pub sync_container_properties: bool,
}

fn default_partition_key_path() -> String {
    crate::item::DEFAULT_PARTITION_KEY_PATH.to_string()
}

impl ItemTypeEntry {
    pub fn into_parts(self) -> (String, ItemTypeConfig) {
        (
            self.type_name,
            ItemTypeConfig {
                container_name: self.container_name,
                partition_key_path: self.partition_key_path,
                indexing_policy: self.indexing_policy,
                time_to_live_seconds: self.time_to_live_seconds,
                sync_container_properties: self.sync_container_properties,
            },
        )
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Options(String),
    Item(String, String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Options(msg) => write!(f, "Options: {}", msg),
            ValidationError::Item(name, msg) => write!(f, "Item '{}': {}", name, msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RepositoryConfig {
    /// One error per item type declared more than once.
    pub fn duplicate_item_types(&self) -> Vec<ValidationError> {
        let mut seen = HashSet::new();
        self.items
            .iter()
            .filter(|entry| !seen.insert(entry.type_name.as_str()))
            .map(|entry| {
                ValidationError::Item(entry.type_name.clone(), "declared more than once".to_string())
            })
            .collect()
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = self.repository.validate().err().unwrap_or_default();
        errors.extend(self.duplicate_item_types());

        for entry in &self.items {
            let (_, item_config) = entry.clone().into_parts();
            if let Err(msg) = item_config.validate() {
                errors.push(ValidationError::Item(entry.type_name.clone(), msg));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
