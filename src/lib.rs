//! Cosmos Repository: Specification-Driven Data Access
//!
//! A data-access layer over a partitioned, request-unit metered document store.
//! Containers are provisioned lazily per item type, and queries are described by
//! specifications that the pipeline compiles, pages, counts, and shapes into a
//! caller-defined result.

pub mod cancel;
pub mod config;
pub mod error;
pub mod item;
pub mod logging;
pub mod provisioning;
pub mod query;
pub mod repository;
pub mod store;

pub use cancel::CancellationToken;
pub use config::{ConfigLoader, RepositoryConfig, RepositoryOptions};
pub use error::{RepositoryError, StoreError};
pub use item::{Item, ItemConfigurationRegistry, ItemConfigurationResolver, ItemTypeConfig};
pub use provisioning::ContainerProvider;
pub use query::{
    Filter, OrderBy, Page, PageQueryResult, QueryRequestOptions, QueryResult, QuerySpecification,
};
pub use repository::{Repository, RepositoryContext};
pub use store::{ContainerHandle, ContainerProperties, InMemoryStore, StoreClient};
