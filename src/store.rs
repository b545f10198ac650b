//! Document Store Abstraction
//!
//! The store client is the only component that talks to the remote document
//! store. Everything above it (provisioning, evaluation, paging) is expressed in
//! terms of the types defined here so any backend can be plugged in.

use crate::error::StoreError;
use crate::query::QueryDescription;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod memory;

pub use memory::{InMemoryStore, StoreOperation};

/// How the store maintains its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexingMode {
    #[default]
    Consistent,
    Lazy,
    None,
}

/// Indexing policy of a container. Opaque to the repository; only compared and
/// forwarded to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingPolicy {
    #[serde(default = "default_true")]
    pub automatic: bool,

    #[serde(default)]
    pub indexing_mode: IndexingMode,

    #[serde(default = "default_included_paths")]
    pub included_paths: Vec<String>,

    #[serde(default)]
    pub excluded_paths: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_included_paths() -> Vec<String> {
    vec!["/*".to_string()]
}

impl Default for IndexingPolicy {
    fn default() -> Self {
        Self {
            automatic: true,
            indexing_mode: IndexingMode::Consistent,
            included_paths: default_included_paths(),
            excluded_paths: Vec::new(),
        }
    }
}

/// Shape of a container: the descriptor used to create it and the live
/// properties the store reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerProperties {
    pub id: String,
    pub partition_key_path: String,
    #[serde(default)]
    pub indexing_policy: IndexingPolicy,
    /// `None` disables expiry, `-1` enables it without a default, `n > 0` expires after n seconds.
    #[serde(default)]
    pub default_time_to_live: Option<i32>,
}

impl ContainerProperties {
    pub fn new(id: impl Into<String>, partition_key_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            partition_key_path: partition_key_path.into(),
            indexing_policy: IndexingPolicy::default(),
            default_time_to_live: None,
        }
    }

    pub fn with_time_to_live(mut self, seconds: Option<i32>) -> Self {
        self.default_time_to_live = seconds;
        self
    }

    pub fn with_indexing_policy(mut self, policy: IndexingPolicy) -> Self {
        self.indexing_policy = policy;
        self
    }

    /// True when properties that may be replaced in place differ from `desired`.
    /// Identity and partition key are not reconcilable and are ignored here.
    pub fn has_reconcilable_drift(&self, desired: &ContainerProperties) -> bool {
        self.default_time_to_live != desired.default_time_to_live
            || self.indexing_policy != desired.indexing_policy
    }

    /// Desired reconcilable properties applied onto this container's identity.
    pub fn reconciled_with(&self, desired: &ContainerProperties) -> ContainerProperties {
        ContainerProperties {
            id: self.id.clone(),
            partition_key_path: self.partition_key_path.clone(),
            indexing_policy: desired.indexing_policy.clone(),
            default_time_to_live: desired.default_time_to_live,
        }
    }
}

/// Reference to a provisioned container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    database_id: String,
    properties: ContainerProperties,
}

impl ContainerHandle {
    pub fn new(database_id: impl Into<String>, properties: ContainerProperties) -> Self {
        Self {
            database_id: database_id.into(),
            properties,
        }
    }

    pub fn id(&self) -> &str {
        &self.properties.id
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn partition_key_path(&self) -> &str {
        &self.properties.partition_key_path
    }

    pub fn properties(&self) -> &ContainerProperties {
        &self.properties
    }
}

/// Whether a create-if-not-exists call created the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    Created,
    Existing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseResponse {
    pub id: String,
    pub status: ResourceStatus,
    pub request_charge: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerResponse {
    /// Live properties after the operation.
    pub properties: ContainerProperties,
    pub status: ResourceStatus,
    pub request_charge: f64,
}

/// Per-page request parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    /// Resume cursor returned by a previous page.
    pub continuation_token: Option<String>,
    /// Upper bound on documents in this page; `None` uses the store default.
    pub max_item_count: Option<usize>,
    /// Restrict the query to one logical partition.
    pub partition_key: Option<Value>,
    /// Degree of cross-partition parallelism hint.
    pub max_concurrency: Option<usize>,
}

/// One page of raw documents.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    pub documents: Vec<Value>,
    pub request_charge: f64,
    /// `None` when the store has no further pages.
    pub continuation_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountResponse {
    pub count: u64,
    pub request_charge: f64,
}

/// Store client trait
///
/// Throttling retries are the implementation's concern; errors returned here are
/// final from the repository's point of view.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Create the database unless it already exists.
    async fn create_database_if_not_exists(
        &self,
        database_id: &str,
    ) -> Result<DatabaseResponse, StoreError>;

    /// Create the container unless it already exists. Existing containers are
    /// returned with their live properties, untouched.
    async fn create_container_if_not_exists(
        &self,
        database_id: &str,
        properties: &ContainerProperties,
    ) -> Result<ContainerResponse, StoreError>;

    /// Read the live properties of an existing container.
    async fn read_container_properties(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<ContainerResponse, StoreError>;

    /// Replace the reconcilable properties of an existing container.
    async fn replace_container_properties(
        &self,
        database_id: &str,
        properties: &ContainerProperties,
    ) -> Result<ContainerResponse, StoreError>;

    /// Fetch one page of documents matching `query`.
    async fn query_page(
        &self,
        container: &ContainerHandle,
        query: &QueryDescription,
        request: &PageRequest,
    ) -> Result<QueryPage, StoreError>;

    /// Count documents matching `query`'s filter.
    async fn count(
        &self,
        container: &ContainerHandle,
        query: &QueryDescription,
        partition_key: Option<&Value>,
    ) -> Result<CountResponse, StoreError>;
}
