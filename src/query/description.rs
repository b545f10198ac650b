//! Lazily evaluated query description.

use crate::query::filter::{field_ref, Filter};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub path: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn ascending(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// What the query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Projection {
    #[default]
    Documents,
    Count,
}

/// A compiled query: nothing runs until a store client is handed this value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryDescription {
    pub projection: Projection,
    pub filter: Filter,
    pub order_by: Vec<OrderBy>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl QueryDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and_filter(mut self, filter: Filter) -> Self {
        self.filter = std::mem::take(&mut self.filter).and(filter);
        self
    }

    pub fn then_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn with_offset_limit(mut self, offset: usize, limit: usize) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    /// Same filter, no ordering or paging.
    pub fn count_query(&self) -> QueryDescription {
        QueryDescription {
            projection: Projection::Count,
            filter: self.filter.clone(),
            order_by: Vec::new(),
            offset: None,
            limit: None,
        }
    }

    pub fn is_count(&self) -> bool {
        self.projection == Projection::Count
    }
}

impl fmt::Display for QueryDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.projection {
            Projection::Documents => f.write_str("SELECT * FROM c")?,
            Projection::Count => f.write_str("SELECT VALUE COUNT(1) FROM c")?,
        }
        if self.filter != Filter::True {
            write!(f, " WHERE {}", self.filter)?;
        }
        if !self.order_by.is_empty() {
            let clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|o| {
                    let dir = match o.direction {
                        SortDirection::Ascending => "ASC",
                        SortDirection::Descending => "DESC",
                    };
                    format!("{} {}", field_ref(&o.path), dir)
                })
                .collect();
            write!(f, " ORDER BY {}", clauses.join(", "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " OFFSET {} LIMIT {}", self.offset.unwrap_or(0), limit)?;
        }
        Ok(())
    }
}
