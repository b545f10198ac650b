//! In-memory store client.
//!
//! A complete `StoreClient` over JSON documents. Filters, ordering, and paging
//! are evaluated locally, request charges are deterministic, and every call is
//! counted so callers can assert on the exact round trips a workflow issued.
//! Failures and latency can be injected per operation.

use crate::error::StoreError;
use crate::query::filter::{resolve_path, sort_order};
use crate::query::{QueryDescription, SortDirection};
use crate::store::{
    ContainerHandle, ContainerProperties, ContainerResponse, CountResponse, DatabaseResponse,
    PageRequest, QueryPage, ResourceStatus, StoreClient,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Charge for any control-plane call.
pub const CONTROL_PLANE_CHARGE: f64 = 1.0;
/// Fixed charge of a query page.
pub const PAGE_BASE_CHARGE: f64 = 2.0;
/// Additional charge per document returned in a page.
pub const PAGE_ITEM_CHARGE: f64 = 0.5;
/// Charge of a count query.
pub const COUNT_CHARGE: f64 = 1.5;
/// Page size used when a request does not set `max_item_count`.
pub const DEFAULT_PAGE_SIZE: usize = 100;

const TOKEN_PREFIX: &str = "mem:";

/// Store operation, used for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    CreateDatabase,
    CreateContainer,
    ReadContainer,
    ReplaceContainer,
    QueryPage,
    Count,
}

#[derive(Debug, Default)]
struct DatabaseState {
    containers: HashMap<String, ContainerState>,
}

#[derive(Debug)]
struct ContainerState {
    properties: ContainerProperties,
    documents: Vec<Value>,
}

#[derive(Debug, Default)]
struct Instrumentation {
    calls: HashMap<StoreOperation, usize>,
    failures: HashMap<StoreOperation, VecDeque<StoreError>>,
    scheduled: HashMap<(StoreOperation, usize), StoreError>,
    latency: HashMap<StoreOperation, Duration>,
}

pub struct InMemoryStore {
    databases: Mutex<HashMap<String, DatabaseState>>,
    instrumentation: Mutex<Instrumentation>,
    default_page_size: usize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_default_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_default_page_size(default_page_size: usize) -> Self {
        Self {
            databases: Mutex::new(HashMap::new()),
            instrumentation: Mutex::new(Instrumentation::default()),
            default_page_size: default_page_size.max(1),
        }
    }

    /// Delay every future call of `operation` by `latency`.
    pub fn set_latency(&self, operation: StoreOperation, latency: Duration) {
        self.instrumentation
            .lock()
            .latency
            .insert(operation, latency);
    }

    /// Fail the next call of `operation` with `error`. Calls queue up in order.
    pub fn fail_next(&self, operation: StoreOperation, error: StoreError) {
        self.instrumentation
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Fail the `call`-th call (1-based, counted since the last reset) of `operation`.
    pub fn fail_at(&self, operation: StoreOperation, call: usize, error: StoreError) {
        self.instrumentation
            .lock()
            .scheduled
            .insert((operation, call), error);
    }

    pub fn call_count(&self, operation: StoreOperation) -> usize {
        self.instrumentation
            .lock()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn reset_call_counts(&self) {
        self.instrumentation.lock().calls.clear();
    }

    /// Create a container directly, bypassing call counting. Creates the database
    /// when missing. Replaces any existing container of the same id.
    pub fn seed_container(&self, database_id: &str, properties: ContainerProperties) {
        let mut databases = self.databases.lock();
        let database = databases.entry(database_id.to_string()).or_default();
        database.containers.insert(
            properties.id.clone(),
            ContainerState {
                properties,
                documents: Vec::new(),
            },
        );
    }

    /// Overwrite live properties of an existing container, as an operator might.
    pub fn set_container_properties(
        &self,
        database_id: &str,
        properties: ContainerProperties,
    ) -> Result<(), StoreError> {
        let mut databases = self.databases.lock();
        let container = Self::container_mut(&mut databases, database_id, &properties.id)?;
        container.properties = properties;
        Ok(())
    }

    pub fn container_properties(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Option<ContainerProperties> {
        self.databases
            .lock()
            .get(database_id)
            .and_then(|db| db.containers.get(container_id))
            .map(|c| c.properties.clone())
    }

    pub fn database_exists(&self, database_id: &str) -> bool {
        self.databases.lock().contains_key(database_id)
    }

    /// Store a document in an existing container.
    pub fn insert_document(
        &self,
        database_id: &str,
        container_id: &str,
        document: Value,
    ) -> Result<(), StoreError> {
        if !document.is_object() {
            return Err(StoreError::InvalidRequest(
                "Documents must be JSON objects".to_string(),
            ));
        }
        let mut databases = self.databases.lock();
        let container = Self::container_mut(&mut databases, database_id, container_id)?;
        if resolve_pointer(&document, &container.properties.partition_key_path).is_none() {
            return Err(StoreError::InvalidRequest(format!(
                "Document is missing partition key {}",
                container.properties.partition_key_path
            )));
        }
        container.documents.push(document);
        Ok(())
    }

    pub fn document_count(&self, database_id: &str, container_id: &str) -> usize {
        self.databases
            .lock()
            .get(database_id)
            .and_then(|db| db.containers.get(container_id))
            .map(|c| c.documents.len())
            .unwrap_or(0)
    }

    fn container_mut<'a>(
        databases: &'a mut HashMap<String, DatabaseState>,
        database_id: &str,
        container_id: &str,
    ) -> Result<&'a mut ContainerState, StoreError> {
        databases
            .get_mut(database_id)
            .ok_or_else(|| StoreError::NotFound(format!("database {}", database_id)))?
            .containers
            .get_mut(container_id)
            .ok_or_else(|| StoreError::NotFound(format!("container {}", container_id)))
    }

    /// Count the call, wait out injected latency, then surface an injected failure.
    async fn enter(&self, operation: StoreOperation) -> Result<(), StoreError> {
        let (call, latency) = {
            let mut instrumentation = self.instrumentation.lock();
            let calls = instrumentation.calls.entry(operation).or_insert(0);
            *calls += 1;
            let call = *calls;
            (call, instrumentation.latency.get(&operation).copied())
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let failure = {
            let mut instrumentation = self.instrumentation.lock();
            match instrumentation.scheduled.remove(&(operation, call)) {
                Some(error) => Some(error),
                None => instrumentation
                    .failures
                    .get_mut(&operation)
                    .and_then(VecDeque::pop_front),
            }
        };
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Documents matching the query, filtered, sorted, and sliced by OFFSET/LIMIT.
    fn evaluate(
        &self,
        container: &ContainerHandle,
        query: &QueryDescription,
        partition_key: Option<&Value>,
    ) -> Result<Vec<Value>, StoreError> {
        let mut databases = self.databases.lock();
        let state = Self::container_mut(&mut databases, container.database_id(), container.id())?;
        let partition_key_path = state.properties.partition_key_path.clone();

        let mut matched: Vec<Value> = state
            .documents
            .iter()
            .filter(|doc| match partition_key {
                Some(key) => resolve_pointer(doc, &partition_key_path) == Some(key),
                None => true,
            })
            .filter(|doc| query.filter.matches(doc))
            .cloned()
            .collect();
        drop(databases);

        if !query.order_by.is_empty() {
            matched.sort_by(|a, b| {
                for order in &query.order_by {
                    let ordering =
                        sort_order(resolve_path(a, &order.path), resolve_path(b, &order.path));
                    let ordering = match order.direction {
                        SortDirection::Ascending => ordering,
                        SortDirection::Descending => ordering.reverse(),
                    };
                    if ordering.is_ne() {
                        return ordering;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        let offset = query.offset.unwrap_or(0).min(matched.len());
        let mut sliced = matched.split_off(offset);
        if let Some(limit) = query.limit {
            sliced.truncate(limit);
        }
        Ok(sliced)
    }
}

fn resolve_pointer<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    document.pointer(path)
}

/// Opaque continuation token encoding a position in the result set.
pub fn encode_continuation(position: usize) -> String {
    format!("{}{}", TOKEN_PREFIX, hex::encode((position as u64).to_be_bytes()))
}

pub fn decode_continuation(token: &str) -> Result<usize, StoreError> {
    let invalid = || StoreError::InvalidRequest(format!("Malformed continuation token: {}", token));
    let encoded = token.strip_prefix(TOKEN_PREFIX).ok_or_else(invalid)?;
    let bytes: [u8; 8] = hex::decode(encoded)
        .map_err(|_| invalid())?
        .try_into()
        .map_err(|_| invalid())?;
    usize::try_from(u64::from_be_bytes(bytes)).map_err(|_| invalid())
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn create_database_if_not_exists(
        &self,
        database_id: &str,
    ) -> Result<DatabaseResponse, StoreError> {
        self.enter(StoreOperation::CreateDatabase).await?;
        let mut databases = self.databases.lock();
        let status = if databases.contains_key(database_id) {
            ResourceStatus::Existing
        } else {
            databases.insert(database_id.to_string(), DatabaseState::default());
            ResourceStatus::Created
        };
        Ok(DatabaseResponse {
            id: database_id.to_string(),
            status,
            request_charge: CONTROL_PLANE_CHARGE,
        })
    }

    async fn create_container_if_not_exists(
        &self,
        database_id: &str,
        properties: &ContainerProperties,
    ) -> Result<ContainerResponse, StoreError> {
        self.enter(StoreOperation::CreateContainer).await?;
        let mut databases = self.databases.lock();
        let database = databases
            .get_mut(database_id)
            .ok_or_else(|| StoreError::NotFound(format!("database {}", database_id)))?;

        if let Some(existing) = database.containers.get(&properties.id) {
            return Ok(ContainerResponse {
                properties: existing.properties.clone(),
                status: ResourceStatus::Existing,
                request_charge: CONTROL_PLANE_CHARGE,
            });
        }

        database.containers.insert(
            properties.id.clone(),
            ContainerState {
                properties: properties.clone(),
                documents: Vec::new(),
            },
        );
        Ok(ContainerResponse {
            properties: properties.clone(),
            status: ResourceStatus::Created,
            request_charge: CONTROL_PLANE_CHARGE,
        })
    }

    async fn read_container_properties(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<ContainerResponse, StoreError> {
        self.enter(StoreOperation::ReadContainer).await?;
        let mut databases = self.databases.lock();
        let container = Self::container_mut(&mut databases, database_id, container_id)?;
        Ok(ContainerResponse {
            properties: container.properties.clone(),
            status: ResourceStatus::Existing,
            request_charge: CONTROL_PLANE_CHARGE,
        })
    }

    async fn replace_container_properties(
        &self,
        database_id: &str,
        properties: &ContainerProperties,
    ) -> Result<ContainerResponse, StoreError> {
        self.enter(StoreOperation::ReplaceContainer).await?;
        let mut databases = self.databases.lock();
        let container = Self::container_mut(&mut databases, database_id, &properties.id)?;
        if container.properties.partition_key_path != properties.partition_key_path {
            return Err(StoreError::InvalidRequest(format!(
                "Partition key of container {} cannot be changed",
                properties.id
            )));
        }
        container.properties = properties.clone();
        Ok(ContainerResponse {
            properties: container.properties.clone(),
            status: ResourceStatus::Existing,
            request_charge: CONTROL_PLANE_CHARGE,
        })
    }

    async fn query_page(
        &self,
        container: &ContainerHandle,
        query: &QueryDescription,
        request: &PageRequest,
    ) -> Result<QueryPage, StoreError> {
        self.enter(StoreOperation::QueryPage).await?;
        let results = self.evaluate(container, query, request.partition_key.as_ref())?;

        let start = match request.continuation_token.as_deref() {
            Some(token) => decode_continuation(token)?.min(results.len()),
            None => 0,
        };
        let page_size = request
            .max_item_count
            .unwrap_or(self.default_page_size)
            .max(1);
        let end = start.saturating_add(page_size).min(results.len());

        let documents = results[start..end].to_vec();
        let continuation_token = (end < results.len()).then(|| encode_continuation(end));

        Ok(QueryPage {
            request_charge: PAGE_BASE_CHARGE + PAGE_ITEM_CHARGE * documents.len() as f64,
            documents,
            continuation_token,
        })
    }

    async fn count(
        &self,
        container: &ContainerHandle,
        query: &QueryDescription,
        partition_key: Option<&Value>,
    ) -> Result<CountResponse, StoreError> {
        self.enter(StoreOperation::Count).await?;
        let results = self.evaluate(container, &query.count_query(), partition_key)?;
        Ok(CountResponse {
            count: results.len() as u64,
            request_charge: COUNT_CHARGE,
        })
    }
}
