//! Container Provisioning
//!
//! Resolves the container backing an item type, creating the database and the
//! container on first use. Handles are cached per item type for the lifetime of
//! the provider. Concurrent first use of the same item type is collapsed into a
//! single provisioning run: the first caller provisions, later callers wait on
//! its result.

use crate::cancel::CancellationToken;
use crate::config::{RepositoryOptions, ValidationError};
use crate::error::{RepositoryError, StoreError};
use crate::item::{Item, ItemConfigurationResolver, ItemTypeConfig};
use crate::store::{ContainerHandle, ContainerProperties, ResourceStatus, StoreClient};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

type ProvisionResult = Result<ContainerHandle, RepositoryError>;

/// Provisioning run in progress for one item type.
#[derive(Debug, Default)]
struct InFlightEntry {
    waiters: Vec<oneshot::Sender<ProvisionResult>>,
}

type InFlightTable = Mutex<HashMap<String, InFlightEntry>>;

/// Removes the in-flight entry if the provisioning future is dropped before it
/// completes. Dropping the entry drops its senders, so waiters retry.
struct InFlightGuard<'a> {
    table: &'a InFlightTable,
    item_type: &'a str,
    armed: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(table: &'a InFlightTable, item_type: &'a str) -> Self {
        Self {
            table,
            item_type,
            armed: true,
        }
    }

    /// Remove the entry and hand back everyone waiting on it.
    fn complete(mut self) -> Vec<oneshot::Sender<ProvisionResult>> {
        self.armed = false;
        self.table
            .lock()
            .remove(self.item_type)
            .map(|entry| entry.waiters)
            .unwrap_or_default()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.table.lock().remove(self.item_type);
        }
    }
}

enum Admission {
    Cached(ContainerHandle),
    Leader,
    Waiter(oneshot::Receiver<ProvisionResult>),
}

/// Container provider
///
/// Owns the per-item-type handle cache and the in-flight provisioning table.
/// Neither lock is held across a store round trip.
pub struct ContainerProvider {
    store: Arc<dyn StoreClient>,
    options: RepositoryOptions,
    resolver: Arc<dyn ItemConfigurationResolver>,
    cache: RwLock<HashMap<String, ContainerHandle>>,
    in_flight: InFlightTable,
}

impl ContainerProvider {
    pub fn new(
        store: Arc<dyn StoreClient>,
        options: RepositoryOptions,
        resolver: Arc<dyn ItemConfigurationResolver>,
    ) -> Self {
        Self {
            store,
            options,
            resolver,
            cache: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    /// Container for item type `T`.
    pub async fn get_container_for<T: Item>(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ContainerHandle, RepositoryError> {
        self.get_container(T::TYPE_NAME, cancel).await
    }

    /// Get the container backing `item_type`, provisioning it on first use.
    ///
    /// Configuration errors are raised before any store call. With
    /// `sync_container_properties` on a per-type container, live properties are
    /// re-checked and reconciled on every call, cached or not.
    pub async fn get_container(
        &self,
        item_type: &str,
        cancel: &CancellationToken,
    ) -> Result<ContainerHandle, RepositoryError> {
        let config = self.resolver.resolve(item_type)?;
        let desired = self.descriptor(item_type, &config)?;

        loop {
            match self.admit(item_type) {
                Admission::Cached(handle) => {
                    debug!(item_type, container = %handle.id(), "Container cache hit");
                    if !self.should_sync(&config) {
                        return Ok(handle);
                    }
                    return self.refresh(item_type, &desired, cancel).await;
                }
                Admission::Waiter(rx) => {
                    debug!(item_type, "Awaiting in-flight container provisioning");
                    match cancel.run(rx).await? {
                        Ok(result) => return result,
                        // The provisioning caller gave up; take over.
                        Err(_) => continue,
                    }
                }
                Admission::Leader => {
                    return self.lead(item_type, &config, &desired, cancel).await;
                }
            }
        }
    }

    /// Container descriptor for `item_type` under the current options.
    pub fn descriptor(
        &self,
        item_type: &str,
        config: &ItemTypeConfig,
    ) -> Result<ContainerProperties, RepositoryError> {
        if !config.has_valid_partition_key_path() {
            return Err(RepositoryError::InvalidPartitionKeyPath {
                item_type: item_type.to_string(),
                path: config.partition_key_path.clone(),
            });
        }
        if let Err(msg) = config.validate() {
            return Err(RepositoryError::Validation(vec![ValidationError::Item(
                item_type.to_string(),
                msg,
            )]));
        }
        let container_id = if self.options.container_per_item_type {
            config.container_name.clone()
        } else {
            self.options.container_id.clone()
        };
        Ok(config.to_container_properties(container_id))
    }

    /// Item types with a cached container handle, sorted.
    pub fn cached_item_types(&self) -> Vec<String> {
        let mut item_types: Vec<String> = self.cache.read().keys().cloned().collect();
        item_types.sort_unstable();
        item_types
    }

    /// Drop the cached handle of `item_type`; the next lookup provisions again.
    pub fn invalidate(&self, item_type: &str) -> bool {
        let removed = self.cache.write().remove(item_type).is_some();
        if removed {
            debug!(item_type, "Container handle invalidated");
        }
        removed
    }

    fn admit(&self, item_type: &str) -> Admission {
        if let Some(handle) = self.cache.read().get(item_type) {
            return Admission::Cached(handle.clone());
        }

        let mut in_flight = self.in_flight.lock();
        // A provisioning run may have finished between the cache read and the lock.
        if let Some(handle) = self.cache.read().get(item_type) {
            return Admission::Cached(handle.clone());
        }
        match in_flight.get_mut(item_type) {
            Some(entry) => {
                let (tx, rx) = oneshot::channel();
                entry.waiters.push(tx);
                Admission::Waiter(rx)
            }
            None => {
                in_flight.insert(item_type.to_string(), InFlightEntry::default());
                Admission::Leader
            }
        }
    }

    async fn lead(
        &self,
        item_type: &str,
        config: &ItemTypeConfig,
        desired: &ContainerProperties,
        cancel: &CancellationToken,
    ) -> ProvisionResult {
        let guard = InFlightGuard::new(&self.in_flight, item_type);
        let result = self.provision(item_type, config, desired, cancel).await;

        if let Ok(handle) = &result {
            self.cache
                .write()
                .insert(item_type.to_string(), handle.clone());
        }
        let waiters = guard.complete();

        match &result {
            // Cancellation belongs to this caller only; waiters retry with their own tokens.
            Err(RepositoryError::Cancelled) => drop(waiters),
            _ => {
                for tx in waiters {
                    let _ = tx.send(result.clone());
                }
            }
        }
        result
    }

    async fn provision(
        &self,
        item_type: &str,
        config: &ItemTypeConfig,
        desired: &ContainerProperties,
        cancel: &CancellationToken,
    ) -> ProvisionResult {
        let database_id = self.options.database_id.as_str();

        let database = cancel
            .run(self.store.create_database_if_not_exists(database_id))
            .await?
            .map_err(|e| provisioning_failed(desired, e))?;
        if database.status == ResourceStatus::Created {
            info!(
                database = %database.id,
                charge = database.request_charge,
                "Database created"
            );
        }

        let response = cancel
            .run(self.store.create_container_if_not_exists(database_id, desired))
            .await?
            .map_err(|e| provisioning_failed(desired, e))?;

        if response.status == ResourceStatus::Created {
            info!(
                item_type,
                database = database_id,
                container = %response.properties.id,
                partition_key = %response.properties.partition_key_path,
                charge = response.request_charge,
                "Container created"
            );
            return Ok(ContainerHandle::new(database_id, response.properties));
        }

        self.check_partition_key(item_type, &response.properties, desired)?;

        let live = if self.should_sync(config) {
            self.reconcile(item_type, response.properties, desired, cancel)
                .await?
        } else {
            if response.properties.has_reconcilable_drift(desired) {
                debug!(
                    item_type,
                    container = %desired.id,
                    "Container properties differ from configuration; sync disabled"
                );
            }
            response.properties
        };

        Ok(ContainerHandle::new(database_id, live))
    }

    /// Re-read a cached container and reconcile drift.
    async fn refresh(
        &self,
        item_type: &str,
        desired: &ContainerProperties,
        cancel: &CancellationToken,
    ) -> ProvisionResult {
        let database_id = self.options.database_id.as_str();
        let response = cancel
            .run(self.store.read_container_properties(database_id, &desired.id))
            .await?
            .map_err(|e| provisioning_failed(desired, e))?;

        self.check_partition_key(item_type, &response.properties, desired)?;
        let live = self
            .reconcile(item_type, response.properties, desired, cancel)
            .await?;

        let handle = ContainerHandle::new(database_id, live);
        self.cache
            .write()
            .insert(item_type.to_string(), handle.clone());
        Ok(handle)
    }

    /// Replace drifted properties, keeping the live id and partition key.
    async fn reconcile(
        &self,
        item_type: &str,
        live: ContainerProperties,
        desired: &ContainerProperties,
        cancel: &CancellationToken,
    ) -> Result<ContainerProperties, RepositoryError> {
        if !live.has_reconcilable_drift(desired) {
            return Ok(live);
        }

        let replacement = live.reconciled_with(desired);
        info!(
            item_type,
            container = %replacement.id,
            live_ttl = ?live.default_time_to_live,
            desired_ttl = ?replacement.default_time_to_live,
            "Replacing drifted container properties"
        );

        let response = cancel
            .run(
                self.store
                    .replace_container_properties(&self.options.database_id, &replacement),
            )
            .await?
            .map_err(|e| provisioning_failed(desired, e))?;
        Ok(response.properties)
    }

    fn check_partition_key(
        &self,
        item_type: &str,
        live: &ContainerProperties,
        desired: &ContainerProperties,
    ) -> Result<(), RepositoryError> {
        if live.partition_key_path == desired.partition_key_path {
            return Ok(());
        }
        if self.options.container_per_item_type {
            return Err(RepositoryError::PartitionKeyMismatch {
                container: live.id.clone(),
                expected: desired.partition_key_path.clone(),
                actual: live.partition_key_path.clone(),
            });
        }
        warn!(
            item_type,
            container = %live.id,
            expected = %desired.partition_key_path,
            actual = %live.partition_key_path,
            "Shared container is partitioned differently than the item type declares"
        );
        Ok(())
    }

    /// Shared containers are never reconciled.
    fn should_sync(&self, config: &ItemTypeConfig) -> bool {
        self.options.container_per_item_type && config.sync_container_properties
    }
}

fn provisioning_failed(desired: &ContainerProperties, source: StoreError) -> RepositoryError {
    RepositoryError::Provisioning {
        container: desired.id.clone(),
        source,
    }
}
