//! Query specifications.
//!
//! A specification describes a query declaratively: filter, ordering, paging
//! mode, and how to shape the final result. It is built by the caller and
//! consumed by exactly one query call.

use crate::error::RepositoryError;
use crate::query::description::OrderBy;
use crate::query::filter::Filter;
use crate::query::result::{Page, PageQueryResult, QueryResult};

/// Shapes `(items, total_count, total_charge, continuation_token)` into a result.
pub type ResultBuilder<T, R> = Box<dyn FnOnce(Vec<T>, u64, f64, Option<String>) -> R + Send>;

pub struct QuerySpecification<T, R> {
    filter: Option<Filter>,
    order_by: Vec<OrderBy>,
    page_size: Option<usize>,
    page_number: Option<usize>,
    use_continuation_token: bool,
    continuation_token: Option<String>,
    result_builder: ResultBuilder<T, R>,
}

impl<T, R> std::fmt::Debug for QuerySpecification<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySpecification")
            .field("filter", &self.filter)
            .field("order_by", &self.order_by)
            .field("page_size", &self.page_size)
            .field("page_number", &self.page_number)
            .field("use_continuation_token", &self.use_continuation_token)
            .field("continuation_token", &self.continuation_token)
            .finish_non_exhaustive()
    }
}

impl<T, R> QuerySpecification<T, R> {
    /// Specification with a custom result builder and no filter or paging.
    pub fn new<F>(result_builder: F) -> Self
    where
        F: FnOnce(Vec<T>, u64, f64, Option<String>) -> R + Send + 'static,
    {
        Self {
            filter: None,
            order_by: Vec::new(),
            page_size: None,
            page_number: None,
            use_continuation_token: false,
            continuation_token: None,
            result_builder: Box::new(result_builder),
        }
    }

    /// Add a filter; repeated calls are combined with AND.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Fetch a single page per call, resuming from `token` when given.
    pub fn with_continuation_token(mut self, token: Option<String>) -> Self {
        self.use_continuation_token = true;
        self.continuation_token = token;
        self
    }

    /// Address a page by its 1-based number.
    pub fn with_page_number(mut self, page_number: usize) -> Self {
        self.page_number = Some(page_number);
        self
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn ordering(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    pub fn page_number(&self) -> Option<usize> {
        self.page_number
    }

    pub fn uses_continuation_token(&self) -> bool {
        self.use_continuation_token
    }

    pub fn resume_token(&self) -> Option<&str> {
        self.continuation_token.as_deref()
    }

    /// Reject paging combinations that cannot be executed.
    pub fn validate(&self) -> Result<(), RepositoryError> {
        if self.use_continuation_token && self.page_size.is_none() {
            return Err(RepositoryError::MissingPageSize);
        }
        if self.page_size == Some(0) {
            return Err(RepositoryError::Configuration(
                "Page size must be greater than zero".to_string(),
            ));
        }
        match self.page_number {
            Some(0) => Err(RepositoryError::Configuration(
                "Page number starts at 1".to_string(),
            )),
            Some(_) if self.use_continuation_token => Err(RepositoryError::Configuration(
                "Page number and continuation token paging cannot be combined".to_string(),
            )),
            Some(_) if self.page_size.is_none() => Err(RepositoryError::Configuration(
                "Page number paging requires a page size".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Consume the specification, producing the caller's result.
    pub fn build_result(
        self,
        items: Vec<T>,
        total_count: u64,
        total_charge: f64,
        continuation_token: Option<String>,
    ) -> R {
        (self.result_builder)(items, total_count, total_charge, continuation_token)
    }
}

impl<T: Send + 'static> QuerySpecification<T, QueryResult<T>> {
    /// Every matching item, drained across all store pages.
    pub fn default_query() -> Self {
        Self::new(|items, total, charge, _| QueryResult {
            items,
            total,
            charge,
        })
    }
}

impl<T: Send + 'static> QuerySpecification<T, Page<T>> {
    /// One page of at most `page_size` items, resuming from `token`.
    pub fn continuation_token(page_size: usize, token: Option<String>) -> Self {
        Self::new(move |items, total, charge, continuation_token| Page {
            total,
            size: page_size,
            items,
            charge,
            continuation_token,
        })
        .with_page_size(page_size)
        .with_continuation_token(token)
    }
}

impl<T: Send + 'static> QuerySpecification<T, PageQueryResult<T>> {
    /// Page `page_number` (1-based) of `page_size` items.
    pub fn offset_by_page_number(page_number: usize, page_size: usize) -> Self {
        Self::new(move |items, total, charge, _| {
            PageQueryResult::new(items, total, charge, page_number, page_size)
        })
        .with_page_size(page_size)
        .with_page_number(page_number)
    }
}
