//! Item types and their storage configuration.
//!
//! Every stored document belongs to an item type. The type name is written into
//! the document's `type` field and used to scope queries, and it keys the
//! storage configuration that decides which container backs the type.

use crate::store::{ContainerProperties, IndexingPolicy};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub mod registry;

pub use registry::{ItemConfigurationRegistry, ItemConfigurationResolver};

/// Partition key used when an item type does not declare one.
pub const DEFAULT_PARTITION_KEY_PATH: &str = "/id";

/// A document type stored through the repository.
///
/// Implementations must serialize a `type` field holding [`Item::TYPE_NAME`].
pub trait Item: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable type identifier.
    const TYPE_NAME: &'static str;

    /// Configuration used by `ItemConfigurationRegistry::register_default`.
    fn default_config() -> ItemTypeConfig {
        ItemTypeConfig::new(Self::TYPE_NAME, DEFAULT_PARTITION_KEY_PATH)
    }
}

/// Declared storage configuration of one item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTypeConfig {
    pub container_name: String,

    #[serde(default = "default_partition_key_path")]
    pub partition_key_path: String,

    #[serde(default)]
    pub indexing_policy: IndexingPolicy,

    #[serde(default)]
    pub time_to_live_seconds: Option<i32>,

    /// Replace drifted container properties on every container lookup.
    #[serde(default)]
    pub sync_container_properties: bool,
}

fn default_partition_key_path() -> String {
    DEFAULT_PARTITION_KEY_PATH.to_string()
}

impl ItemTypeConfig {
    pub fn new(container_name: impl Into<String>, partition_key_path: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
            partition_key_path: partition_key_path.into(),
            indexing_policy: IndexingPolicy::default(),
            time_to_live_seconds: None,
            sync_container_properties: false,
        }
    }

    pub fn with_time_to_live(mut self, seconds: i32) -> Self {
        self.time_to_live_seconds = Some(seconds);
        self
    }

    pub fn with_indexing_policy(mut self, policy: IndexingPolicy) -> Self {
        self.indexing_policy = policy;
        self
    }

    pub fn with_sync_container_properties(mut self, sync: bool) -> Self {
        self.sync_container_properties = sync;
        self
    }

    pub fn has_valid_partition_key_path(&self) -> bool {
        self.partition_key_path.len() > 1 && self.partition_key_path.starts_with('/')
    }

    /// Validate item configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.container_name.trim().is_empty() {
            return Err("container_name cannot be empty".to_string());
        }
        if !self.has_valid_partition_key_path() {
            return Err(format!(
                "partition_key_path '{}' must start with '/'",
                self.partition_key_path
            ));
        }
        if let Some(ttl) = self.time_to_live_seconds {
            if ttl == 0 || ttl < -1 {
                return Err(format!(
                    "time_to_live_seconds must be -1 or positive, got {}",
                    ttl
                ));
            }
        }
        Ok(())
    }

    /// Container shape this item type asks for under `container_id`.
    pub fn to_container_properties(&self, container_id: impl Into<String>) -> ContainerProperties {
        ContainerProperties::new(container_id, self.partition_key_path.clone())
            .with_time_to_live(self.time_to_live_seconds)
            .with_indexing_policy(self.indexing_policy.clone())
    }
}
