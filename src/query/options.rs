//! Caller-supplied request hints for a query.

use serde_json::Value;

/// Page-size and throughput hints for one query call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequestOptions {
    /// Store page size. Overwritten by the specification's page size in
    /// continuation-token mode.
    pub max_item_count: Option<usize>,
    /// Scope the query to a single logical partition.
    pub partition_key: Option<Value>,
    /// Cross-partition parallelism hint forwarded to the store.
    pub max_concurrency: Option<usize>,
}

impl QueryRequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_item_count(mut self, count: usize) -> Self {
        self.max_item_count = Some(count);
        self
    }

    pub fn with_partition_key(mut self, key: impl Into<Value>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    pub fn with_max_concurrency(mut self, concurrency: usize) -> Self {
        self.max_concurrency = Some(concurrency);
        self
    }
}
