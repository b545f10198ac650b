//! Integration tests for specification-driven queries

use super::test_utils::{
    book_config, book_document, per_type_context, seed_books, shared_context, Author, Book,
    DATABASE, SHARED_CONTAINER,
};
use cosmos_repository::query::{Filter, OrderBy, QueryRequestOptions, QuerySpecification};
use cosmos_repository::store::memory::{COUNT_CHARGE, PAGE_BASE_CHARGE, PAGE_ITEM_CHARGE};
use cosmos_repository::store::{InMemoryStore, StoreOperation};
use cosmos_repository::{
    CancellationToken, Page, PageQueryResult, QueryResult, RepositoryError, StoreError,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_continuation_paging_resumes_from_token() {
    let store = Arc::new(InMemoryStore::new());
    seed_books(&store, 7);
    let repository = per_type_context(&store, book_config()).repository::<Book>();
    let cancel = CancellationToken::new();

    let mut seen = Vec::new();
    let mut token = None;
    let mut pages = 0;
    loop {
        let spec = QuerySpecification::<Book, Page<Book>>::continuation_token(3, token)
            .order_by(OrderBy::ascending("id"));
        let page = repository.query(spec, &cancel).await.unwrap();
        pages += 1;

        assert!(page.items.len() <= 3);
        assert_eq!(page.total, 7);
        assert_eq!(page.size, 3);
        seen.extend(page.items.into_iter().map(|b| b.id));
        token = page.continuation_token;
        if token.is_none() {
            break;
        }
    }

    assert_eq!(pages, 3);
    let expected: Vec<String> = (0..7).map(|n| format!("book-{:02}", n)).collect();
    assert_eq!(seen, expected);
    assert_eq!(store.call_count(StoreOperation::QueryPage), 3);
}

#[tokio::test]
async fn test_token_mode_last_page_has_no_token() {
    let store = Arc::new(InMemoryStore::new());
    seed_books(&store, 3);
    let repository = per_type_context(&store, book_config()).repository::<Book>();

    let spec = QuerySpecification::<Book, Page<Book>>::continuation_token(3, None);
    let page = repository
        .query(spec, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(page.items.len(), 3);
    assert!(!page.has_more());
}

#[tokio::test]
async fn test_default_query_drains_and_sums_charges() {
    let store = Arc::new(InMemoryStore::with_default_page_size(4));
    seed_books(&store, 10);
    let repository = per_type_context(&store, book_config()).repository::<Book>();

    let spec = QuerySpecification::<Book, QueryResult<Book>>::default_query()
        .order_by(OrderBy::descending("pages"));
    let result = repository
        .query(spec, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.items.len(), 10);
    assert_eq!(result.total, 10);
    assert_eq!(result.items[0].pages, 109);
    assert_eq!(result.items[9].pages, 100);
    assert_eq!(store.call_count(StoreOperation::QueryPage), 3);
    assert_eq!(store.call_count(StoreOperation::Count), 1);

    let expected = 3.0 * PAGE_BASE_CHARGE + 10.0 * PAGE_ITEM_CHARGE + COUNT_CHARGE;
    assert_eq!(result.charge, expected);
}

#[tokio::test]
async fn test_max_item_count_option_sets_page_size_when_draining() {
    let store = Arc::new(InMemoryStore::new());
    seed_books(&store, 10);
    let repository = per_type_context(&store, book_config()).repository::<Book>();

    let result = repository
        .query_with_options(
            QuerySpecification::<Book, QueryResult<Book>>::default_query(),
            QueryRequestOptions::new().with_max_item_count(3),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.items.len(), 10);
    assert_eq!(store.call_count(StoreOperation::QueryPage), 4);
}

#[tokio::test]
async fn test_empty_result_still_counts_and_builds_once() {
    let store = Arc::new(InMemoryStore::new());
    seed_books(&store, 4);
    let repository = per_type_context(&store, book_config()).repository::<Book>();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let spec = QuerySpecification::<Book, (usize, u64, f64)>::new(move |items, total, charge, token| {
        counter.fetch_add(1, Ordering::SeqCst);
        assert!(token.is_none());
        (items.len(), total, charge)
    })
    .with_filter(Filter::gt("pages", 10_000));

    let (items, total, charge) = repository
        .query(spec, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(items, 0);
    assert_eq!(total, 0);
    assert_eq!(charge, PAGE_BASE_CHARGE + COUNT_CHARGE);
    assert_eq!(store.call_count(StoreOperation::Count), 1);
}

#[tokio::test]
async fn test_failure_mid_drain_discards_partial_results() {
    let store = Arc::new(InMemoryStore::with_default_page_size(2));
    seed_books(&store, 6);
    let repository = per_type_context(&store, book_config()).repository::<Book>();
    store.fail_at(
        StoreOperation::QueryPage,
        2,
        StoreError::Unavailable("connection reset".to_string()),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let spec = QuerySpecification::<Book, usize>::new(move |items, _, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        items.len()
    });
    let err = repository
        .query(spec, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::QueryExecution(StoreError::Unavailable(_))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.call_count(StoreOperation::QueryPage), 2);
    assert_eq!(store.call_count(StoreOperation::Count), 0);
}

#[tokio::test]
async fn test_count_failure_skips_builder() {
    let store = Arc::new(InMemoryStore::new());
    seed_books(&store, 2);
    let repository = per_type_context(&store, book_config()).repository::<Book>();
    store.fail_next(StoreOperation::Count, StoreError::Throttled { retry_after_ms: 50 });

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let spec = QuerySpecification::<Book, ()>::new(move |_, _, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let err = repository
        .query(spec, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::QueryExecution(StoreError::Throttled { .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_page_size_fails_before_network() {
    let store = Arc::new(InMemoryStore::new());
    let repository = per_type_context(&store, book_config()).repository::<Book>();

    let spec = QuerySpecification::<Book, QueryResult<Book>>::default_query()
        .with_continuation_token(Some("resume".to_string()));
    let err = repository
        .query(spec, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(matches!(err, RepositoryError::MissingPageSize));
    assert_eq!(store.call_count(StoreOperation::CreateDatabase), 0);
}

#[tokio::test]
async fn test_malformed_token_is_a_query_error() {
    let store = Arc::new(InMemoryStore::new());
    seed_books(&store, 2);
    let repository = per_type_context(&store, book_config()).repository::<Book>();

    let spec = QuerySpecification::<Book, Page<Book>>::continuation_token(
        2,
        Some("not-a-token".to_string()),
    );
    let err = repository
        .query(spec, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::QueryExecution(StoreError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_page_number_paging() {
    let store = Arc::new(InMemoryStore::new());
    seed_books(&store, 7);
    let repository = per_type_context(&store, book_config()).repository::<Book>();
    let cancel = CancellationToken::new();

    let spec = QuerySpecification::<Book, PageQueryResult<Book>>::offset_by_page_number(2, 3)
        .order_by(OrderBy::ascending("id"));
    let page = repository.query(spec, &cancel).await.unwrap();

    let ids: Vec<&str> = page.items.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["book-03", "book-04", "book-05"]);
    assert_eq!(page.total, 7);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_previous_page);
    assert!(page.has_next_page);

    let spec = QuerySpecification::<Book, PageQueryResult<Book>>::offset_by_page_number(3, 3)
        .order_by(OrderBy::ascending("id"));
    let last = repository.query(spec, &cancel).await.unwrap();
    assert_eq!(last.items.len(), 1);
    assert!(!last.has_next_page);
}

#[tokio::test]
async fn test_partition_key_scopes_query() {
    let store = Arc::new(InMemoryStore::new());
    seed_books(&store, 9);
    let repository = per_type_context(&store, book_config()).repository::<Book>();
    let cancel = CancellationToken::new();

    let result = repository
        .query_with_options(
            QuerySpecification::<Book, QueryResult<Book>>::default_query(),
            QueryRequestOptions::new().with_partition_key("asimov"),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(result.total, 3);
    assert!(result.items.iter().all(|b| b.author == "asimov"));

    let long_asimov = repository
        .count_in_partition(Some(Filter::gt("pages", 103)), json!("asimov"), &cancel)
        .await
        .unwrap();
    assert_eq!(long_asimov, 2);
}

#[tokio::test]
async fn test_item_types_are_isolated_in_shared_container() {
    let store = Arc::new(InMemoryStore::new());
    let context = shared_context(&store);
    let cancel = CancellationToken::new();
    context.repository::<Book>().get_container(&cancel).await.unwrap();

    for n in 0..3 {
        store
            .insert_document(DATABASE, SHARED_CONTAINER, book_document(n))
            .unwrap();
    }
    store
        .insert_document(
            DATABASE,
            SHARED_CONTAINER,
            json!({"id": "a-1", "type": "Author", "name": "Ursula"}),
        )
        .unwrap();

    let books = context
        .repository::<Book>()
        .query(QuerySpecification::<Book, QueryResult<Book>>::default_query(), &cancel)
        .await
        .unwrap();
    let authors = context
        .repository::<Author>()
        .query(QuerySpecification::<Author, QueryResult<Author>>::default_query(), &cancel)
        .await
        .unwrap();

    assert_eq!(books.total, 3);
    assert_eq!(authors.total, 1);
    assert_eq!(authors.items[0].name, "Ursula");
    assert_eq!(context.repository::<Author>().count(None, &cancel).await.unwrap(), 1);
}

#[tokio::test]
async fn test_filter_and_ordering_combine() {
    let store = Arc::new(InMemoryStore::new());
    seed_books(&store, 9);
    let repository = per_type_context(&store, book_config()).repository::<Book>();

    let spec = QuerySpecification::<Book, QueryResult<Book>>::default_query()
        .with_filter(Filter::is_in("author", vec!["herbert", "le guin"]))
        .with_filter(Filter::lt("pages", 106))
        .order_by(OrderBy::ascending("author"))
        .order_by(OrderBy::descending("pages"));
    let result = repository
        .query(spec, &CancellationToken::new())
        .await
        .unwrap();

    let ids: Vec<&str> = result.items.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["book-03", "book-00", "book-04", "book-01"]);
    assert_eq!(result.total, 4);
}

#[tokio::test]
async fn test_cancelled_query_is_distinct_from_failure() {
    let store = Arc::new(InMemoryStore::new());
    seed_books(&store, 2);
    let repository = per_type_context(&store, book_config()).repository::<Book>();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = repository
        .query(
            QuerySpecification::<Book, QueryResult<Book>>::default_query(),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(!err.is_configuration());
    assert_eq!(store.call_count(StoreOperation::QueryPage), 0);
}
