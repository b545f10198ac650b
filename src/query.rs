//! Specification-driven querying.
//!
//! A [`QuerySpecification`] is compiled by the [`SpecificationEvaluator`] into a
//! [`QueryDescription`], which the [`QueryPipeline`] executes page by page.

pub mod description;
pub mod evaluator;
pub mod filter;
pub mod options;
pub mod pipeline;
pub mod result;
pub mod specification;

pub use description::{OrderBy, Projection, QueryDescription, SortDirection};
pub use evaluator::{item_type_filter, SpecificationEvaluator, TYPE_FIELD};
pub use filter::Filter;
pub use options::QueryRequestOptions;
pub use pipeline::QueryPipeline;
pub use result::{Page, PageQueryResult, QueryResult};
pub use specification::{QuerySpecification, ResultBuilder};
