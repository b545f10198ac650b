//! Shaped query results produced by the built-in specifications.

use serde::{Deserialize, Serialize};

/// All matching items with the charge it took to read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub charge: f64,
}

/// One continuation-token page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Count of all matching items, not just this page.
    pub total: u64,
    /// Requested page size.
    pub size: usize,
    pub items: Vec<T>,
    pub charge: f64,
    /// Present while more pages remain.
    pub continuation_token: Option<String>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.continuation_token.is_some()
    }
}

/// One page addressed by number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageQueryResult<T> {
    pub total: u64,
    /// 1-based.
    pub page_number: usize,
    pub size: usize,
    pub items: Vec<T>,
    pub charge: f64,
    pub total_pages: u64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

impl<T> PageQueryResult<T> {
    pub fn new(items: Vec<T>, total: u64, charge: f64, page_number: usize, size: usize) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total.div_ceil(size as u64)
        };
        Self {
            total,
            page_number,
            size,
            items,
            charge,
            total_pages,
            has_previous_page: page_number > 1,
            has_next_page: (page_number as u64) < total_pages,
        }
    }
}
