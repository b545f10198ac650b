//! Property-based tests for paging guarantees

use super::test_utils::{book_config, per_type_context, seed_books, Book};
use cosmos_repository::query::OrderBy;
use cosmos_repository::store::InMemoryStore;
use cosmos_repository::{CancellationToken, Page, PageQueryResult, QuerySpecification};
use proptest::prelude::*;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn config() -> proptest::test_runner::Config {
    proptest::test_runner::Config {
        cases: 48,
        ..Default::default()
    }
}

/// Following continuation tokens visits every item exactly once, in order.
#[test]
fn test_token_paging_visits_every_item_once() {
    let mut runner = proptest::test_runner::TestRunner::new(config());
    let rt = runtime();

    runner
        .run(&(0u32..40, 1usize..12), |(count, page_size)| {
            let store = Arc::new(InMemoryStore::new());
            seed_books(&store, count);
            let repository = per_type_context(&store, book_config()).repository::<Book>();
            let cancel = CancellationToken::new();

            let (seen, pages) = rt.block_on(async {
                let mut seen = Vec::new();
                let mut pages = 0usize;
                let mut token = None;
                loop {
                    let spec = QuerySpecification::<Book, Page<Book>>::continuation_token(
                        page_size, token,
                    )
                    .order_by(OrderBy::ascending("id"));
                    let page = repository.query(spec, &cancel).await.unwrap();
                    pages += 1;
                    assert!(page.items.len() <= page_size);
                    assert_eq!(page.total, count as u64);
                    seen.extend(page.items.into_iter().map(|b| b.id));
                    token = page.continuation_token;
                    if token.is_none() {
                        break;
                    }
                }
                (seen, pages)
            });

            let expected: Vec<String> = (0..count).map(|n| format!("book-{:02}", n)).collect();
            prop_assert_eq!(seen, expected);
            let expected_pages = (count as usize).div_ceil(page_size).max(1);
            prop_assert_eq!(pages, expected_pages);
            Ok(())
        })
        .unwrap();
}

/// Page-number pages partition the result set and agree on page metadata.
#[test]
fn test_page_numbers_partition_results() {
    let mut runner = proptest::test_runner::TestRunner::new(config());
    let rt = runtime();

    runner
        .run(&(1u32..30, 1usize..8), |(count, page_size)| {
            let store = Arc::new(InMemoryStore::new());
            seed_books(&store, count);
            let repository = per_type_context(&store, book_config()).repository::<Book>();
            let cancel = CancellationToken::new();
            let total_pages = (count as usize).div_ceil(page_size);

            let pages: Vec<PageQueryResult<Book>> = rt.block_on(async {
                let mut pages = Vec::new();
                for page_number in 1..=total_pages + 1 {
                    let spec = QuerySpecification::<Book, PageQueryResult<Book>>::offset_by_page_number(
                        page_number,
                        page_size,
                    )
                    .order_by(OrderBy::ascending("id"));
                    pages.push(repository.query(spec, &cancel).await.unwrap());
                }
                pages
            });

            let mut seen = Vec::new();
            for (index, page) in pages.iter().enumerate() {
                prop_assert_eq!(page.total_pages, total_pages as u64);
                prop_assert_eq!(page.has_previous_page, index > 0);
                prop_assert_eq!(page.has_next_page, index + 1 < total_pages);
                seen.extend(page.items.iter().map(|b| b.id.clone()));
            }
            // The page past the end is empty.
            prop_assert!(pages[total_pages].items.is_empty());

            let expected: Vec<String> = (0..count).map(|n| format!("book-{:02}", n)).collect();
            prop_assert_eq!(seen, expected);
            Ok(())
        })
        .unwrap();
}
