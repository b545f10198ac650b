//! Specification evaluator: specification → query description.

use crate::item::Item;
use crate::query::description::QueryDescription;
use crate::query::filter::Filter;
use crate::query::specification::QuerySpecification;

/// Field every stored document carries with its item type name.
pub const TYPE_FIELD: &str = "type";

/// Filter scoping a query to documents of item type `T`.
pub fn item_type_filter<T: Item>() -> Filter {
    Filter::eq(TYPE_FIELD, T::TYPE_NAME)
}

/// Compiles specifications into query descriptions without executing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecificationEvaluator;

impl SpecificationEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Apply, in order: the item type filter, the specification's filter, its
    /// ordering, and page-number paging when requested.
    pub fn compile<T: Item, R>(
        &self,
        base: QueryDescription,
        specification: &QuerySpecification<T, R>,
    ) -> QueryDescription {
        let mut query = base.and_filter(item_type_filter::<T>());

        if let Some(filter) = specification.filter() {
            query = query.and_filter(filter.clone());
        }

        for order in specification.ordering() {
            query = query.then_by(order.clone());
        }

        if let (Some(page_number), Some(page_size)) =
            (specification.page_number(), specification.page_size())
        {
            let offset = page_number.saturating_sub(1).saturating_mul(page_size);
            query = query.with_offset_limit(offset, page_size);
        }

        query
    }
}
