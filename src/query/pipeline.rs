//! Query execution pipeline.
//!
//! Runs a compiled specification against the store: resolves the container,
//! drains pages into an accumulation, issues the count round trip, and hands
//! everything to the specification's result builder.

use crate::cancel::CancellationToken;
use crate::error::RepositoryError;
use crate::item::Item;
use crate::provisioning::ContainerProvider;
use crate::query::description::QueryDescription;
use crate::query::evaluator::{item_type_filter, SpecificationEvaluator};
use crate::query::filter::Filter;
use crate::query::options::QueryRequestOptions;
use crate::query::specification::QuerySpecification;
use crate::store::{ContainerHandle, PageRequest, StoreClient};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Items and charge gathered while draining pages. Discarded on error.
#[derive(Debug)]
struct PageAccumulation<T> {
    items: Vec<T>,
    consumed_charge: f64,
    continuation_token: Option<String>,
}

impl<T: Item> PageAccumulation<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            consumed_charge: 0.0,
            continuation_token: None,
        }
    }

    fn push_page(&mut self, documents: Vec<Value>, charge: f64) -> Result<(), RepositoryError> {
        self.consumed_charge += charge;
        self.items.reserve(documents.len());
        for document in documents {
            self.items.push(serde_json::from_value(document)?);
        }
        Ok(())
    }
}

/// How many pages one query call fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    SinglePage,
    Exhaust,
}

pub struct QueryPipeline {
    provider: Arc<ContainerProvider>,
    store: Arc<dyn StoreClient>,
    evaluator: SpecificationEvaluator,
}

impl QueryPipeline {
    pub fn new(provider: Arc<ContainerProvider>, store: Arc<dyn StoreClient>) -> Self {
        Self {
            provider,
            store,
            evaluator: SpecificationEvaluator::new(),
        }
    }

    /// Execute `specification` and return its builder's result.
    ///
    /// Specification errors surface before any store call. The result builder
    /// runs exactly once, and only when every page and the count succeeded.
    pub async fn execute<T: Item, R>(
        &self,
        specification: QuerySpecification<T, R>,
        options: QueryRequestOptions,
        cancel: &CancellationToken,
    ) -> Result<R, RepositoryError> {
        specification.validate()?;

        let container = self.provider.get_container_for::<T>(cancel).await?;

        let drain = if specification.uses_continuation_token() {
            Drain::SinglePage
        } else {
            Drain::Exhaust
        };
        let request = PageRequest {
            continuation_token: specification.resume_token().map(str::to_string),
            max_item_count: match drain {
                Drain::SinglePage => specification.page_size(),
                Drain::Exhaust => options.max_item_count,
            },
            partition_key: options.partition_key,
            max_concurrency: options.max_concurrency,
        };

        let query = self.evaluator.compile(QueryDescription::new(), &specification);
        debug!(
            item_type = T::TYPE_NAME,
            container = %container.id(),
            query = %query,
            resume = request.continuation_token.is_some(),
            "Query constructed"
        );

        let accumulation = self
            .drain_pages::<T>(&container, &query, request.clone(), drain, cancel)
            .await?;

        let (total_count, count_charge) = self
            .count_round_trip(&container, &query, &request, cancel)
            .await?;
        let total_charge = accumulation.consumed_charge + count_charge;

        info!(
            item_type = T::TYPE_NAME,
            container = %container.id(),
            items = accumulation.items.len(),
            total_count,
            charge = total_charge,
            "Query executed"
        );

        Ok(specification.build_result(
            accumulation.items,
            total_count,
            total_charge,
            accumulation.continuation_token,
        ))
    }

    /// Number of `T` documents matching `filter`.
    pub async fn count<T: Item>(
        &self,
        filter: Option<Filter>,
        options: QueryRequestOptions,
        cancel: &CancellationToken,
    ) -> Result<u64, RepositoryError> {
        let container = self.provider.get_container_for::<T>(cancel).await?;

        let mut query = QueryDescription::new().and_filter(item_type_filter::<T>());
        if let Some(filter) = filter {
            query = query.and_filter(filter);
        }

        let request = PageRequest {
            partition_key: options.partition_key,
            ..PageRequest::default()
        };
        let (count, charge) = self
            .count_round_trip(&container, &query, &request, cancel)
            .await?;
        debug!(item_type = T::TYPE_NAME, count, charge, "Count executed");
        Ok(count)
    }

    async fn drain_pages<T: Item>(
        &self,
        container: &ContainerHandle,
        query: &QueryDescription,
        mut request: PageRequest,
        drain: Drain,
        cancel: &CancellationToken,
    ) -> Result<PageAccumulation<T>, RepositoryError> {
        let mut accumulation = PageAccumulation::new();

        loop {
            let page = cancel
                .run(self.store.query_page(container, query, &request))
                .await?
                .map_err(RepositoryError::QueryExecution)?;
            debug!(
                container = %container.id(),
                documents = page.documents.len(),
                charge = page.request_charge,
                has_more = page.continuation_token.is_some(),
                "Page fetched"
            );
            accumulation.push_page(page.documents, page.request_charge)?;

            match (drain, page.continuation_token) {
                (Drain::SinglePage, token) => {
                    accumulation.continuation_token = token;
                    return Ok(accumulation);
                }
                (Drain::Exhaust, Some(token)) => request.continuation_token = Some(token),
                (Drain::Exhaust, None) => return Ok(accumulation),
            }
        }
    }

    /// Count with the same filter; ordering and paging are dropped.
    async fn count_round_trip(
        &self,
        container: &ContainerHandle,
        query: &QueryDescription,
        request: &PageRequest,
        cancel: &CancellationToken,
    ) -> Result<(u64, f64), RepositoryError> {
        let count_query = query.count_query();
        let response = cancel
            .run(
                self.store
                    .count(container, &count_query, request.partition_key.as_ref()),
            )
            .await?
            .map_err(RepositoryError::QueryExecution)?;
        Ok((response.count, response.request_charge))
    }
}
