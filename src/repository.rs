//! Repository API
//!
//! `RepositoryContext` wires the store client, options, and item configuration
//! together once at startup. `Repository<T>` is the per-item-type surface callers
//! query through.

use crate::cancel::CancellationToken;
use crate::config::{RepositoryConfig, RepositoryOptions, ValidationError};
use crate::error::RepositoryError;
use crate::item::{Item, ItemConfigurationRegistry, ItemConfigurationResolver};
use crate::provisioning::ContainerProvider;
use crate::query::{Filter, QueryPipeline, QueryRequestOptions, QuerySpecification};
use crate::store::{ContainerHandle, StoreClient};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Shared collaborators of every repository.
///
/// Cloning is cheap; clones share the container cache.
#[derive(Clone)]
pub struct RepositoryContext {
    provider: Arc<ContainerProvider>,
    pipeline: Arc<QueryPipeline>,
}

impl RepositoryContext {
    /// Validate options and registry, then build the context.
    pub fn new(
        options: RepositoryOptions,
        registry: ItemConfigurationRegistry,
        store: Arc<dyn StoreClient>,
    ) -> Result<Self, RepositoryError> {
        Self::validated(options, registry, store, Vec::new())
    }

    fn validated(
        options: RepositoryOptions,
        registry: ItemConfigurationRegistry,
        store: Arc<dyn StoreClient>,
        mut errors: Vec<ValidationError>,
    ) -> Result<Self, RepositoryError> {
        if let Err(mut found) = options.validate() {
            errors.append(&mut found);
        }
        if let Err(mut found) = registry.validate() {
            errors.append(&mut found);
        }
        if !errors.is_empty() {
            return Err(RepositoryError::Validation(errors));
        }

        debug!(
            database = %options.database_id,
            per_item_type = options.container_per_item_type,
            item_types = ?registry.item_types(),
            "Repository context created"
        );
        Ok(Self::assemble(options, Arc::new(registry), store))
    }

    /// Build the context around a caller-supplied resolver. Item configuration is
    /// validated when each type is first resolved, before any store call.
    pub fn with_resolver(
        options: RepositoryOptions,
        resolver: Arc<dyn ItemConfigurationResolver>,
        store: Arc<dyn StoreClient>,
    ) -> Result<Self, RepositoryError> {
        options.validate().map_err(RepositoryError::Validation)?;
        Ok(Self::assemble(options, resolver, store))
    }

    /// Build from loaded configuration, registering every declared item type.
    pub fn from_config(
        config: &RepositoryConfig,
        store: Arc<dyn StoreClient>,
    ) -> Result<Self, RepositoryError> {
        let duplicates = config.duplicate_item_types();
        let mut registry = ItemConfigurationRegistry::new();
        registry.load_from_config(config);
        Self::validated(config.repository.clone(), registry, store, duplicates)
    }

    fn assemble(
        options: RepositoryOptions,
        resolver: Arc<dyn ItemConfigurationResolver>,
        store: Arc<dyn StoreClient>,
    ) -> Self {
        let provider = Arc::new(ContainerProvider::new(store.clone(), options, resolver));
        let pipeline = Arc::new(QueryPipeline::new(provider.clone(), store));
        Self { provider, pipeline }
    }

    /// Repository for item type `T`.
    pub fn repository<T: Item>(&self) -> Repository<T> {
        Repository {
            provider: self.provider.clone(),
            pipeline: self.pipeline.clone(),
            _item: PhantomData,
        }
    }

    pub async fn get_container(
        &self,
        item_type: &str,
        cancel: &CancellationToken,
    ) -> Result<ContainerHandle, RepositoryError> {
        self.provider.get_container(item_type, cancel).await
    }

    pub fn container_provider(&self) -> &Arc<ContainerProvider> {
        &self.provider
    }
}

/// Query surface of one item type.
pub struct Repository<T> {
    provider: Arc<ContainerProvider>,
    pipeline: Arc<QueryPipeline>,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            pipeline: self.pipeline.clone(),
            _item: PhantomData,
        }
    }
}

impl<T: Item> Repository<T> {
    /// Container backing `T`, provisioned on first use.
    pub async fn get_container(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ContainerHandle, RepositoryError> {
        self.provider.get_container_for::<T>(cancel).await
    }

    /// Run `specification` with default request options.
    pub async fn query<R>(
        &self,
        specification: QuerySpecification<T, R>,
        cancel: &CancellationToken,
    ) -> Result<R, RepositoryError> {
        self.pipeline
            .execute(specification, QueryRequestOptions::default(), cancel)
            .await
    }

    /// Run `specification` with explicit page size, partition, and concurrency hints.
    pub async fn query_with_options<R>(
        &self,
        specification: QuerySpecification<T, R>,
        options: QueryRequestOptions,
        cancel: &CancellationToken,
    ) -> Result<R, RepositoryError> {
        self.pipeline.execute(specification, options, cancel).await
    }

    /// Count `T` documents matching `filter` (all of them when `None`).
    pub async fn count(
        &self,
        filter: Option<Filter>,
        cancel: &CancellationToken,
    ) -> Result<u64, RepositoryError> {
        self.pipeline
            .count::<T>(filter, QueryRequestOptions::default(), cancel)
            .await
    }

    /// Count within one logical partition.
    pub async fn count_in_partition(
        &self,
        filter: Option<Filter>,
        partition_key: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<u64, RepositoryError> {
        let options = QueryRequestOptions::new().with_partition_key(partition_key);
        self.pipeline.count::<T>(filter, options, cancel).await
    }
}
