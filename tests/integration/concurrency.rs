//! Concurrent first use of containers and queries

use super::test_utils::{book_config, per_type_context, seed_books, Book};
use cosmos_repository::store::{InMemoryStore, StoreOperation};
use cosmos_repository::{CancellationToken, QueryResult, QuerySpecification, StoreError};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_creates_container_once() {
    let store = Arc::new(InMemoryStore::new());
    store.set_latency(StoreOperation::CreateContainer, Duration::from_millis(50));
    let context = per_type_context(&store, book_config());
    let cancel = CancellationToken::new();

    let lookups = (0..16).map(|_| {
        let repository = context.repository::<Book>();
        let cancel = cancel.clone();
        async move { repository.get_container(&cancel).await }
    });
    let handles = join_all(lookups).await;

    assert!(handles.iter().all(|h| h.as_ref().map(|h| h.id() == "books").unwrap_or(false)));
    assert_eq!(store.call_count(StoreOperation::CreateContainer), 1);
    assert_eq!(store.call_count(StoreOperation::CreateDatabase), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_spawned_queries_share_provisioning() {
    let store = Arc::new(InMemoryStore::new());
    store.set_latency(StoreOperation::CreateDatabase, Duration::from_millis(20));
    seed_books(&store, 6);
    let context = per_type_context(&store, book_config());

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let repository = context.repository::<Book>();
            tokio::spawn(async move {
                repository
                    .query(
                        QuerySpecification::<Book, QueryResult<Book>>::default_query(),
                        &CancellationToken::new(),
                    )
                    .await
            })
        })
        .collect();

    for result in join_all(tasks).await {
        let result = result.unwrap().unwrap();
        assert_eq!(result.items.len(), 6);
        assert_eq!(result.total, 6);
    }
    assert_eq!(store.call_count(StoreOperation::CreateContainer), 1);
    assert_eq!(store.call_count(StoreOperation::Count), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_waiters_receive_leader_failure() {
    let store = Arc::new(InMemoryStore::new());
    store.set_latency(StoreOperation::CreateContainer, Duration::from_millis(50));
    store.fail_next(
        StoreOperation::CreateContainer,
        StoreError::Unavailable("quota exceeded".to_string()),
    );
    let context = per_type_context(&store, book_config());
    let cancel = CancellationToken::new();

    let lookups = (0..4).map(|_| {
        let repository = context.repository::<Book>();
        let cancel = cancel.clone();
        async move { repository.get_container(&cancel).await }
    });
    let results = join_all(lookups).await;

    assert!(results.iter().all(|r| r.is_err()));
    assert_eq!(store.call_count(StoreOperation::CreateContainer), 1);
    assert!(context.container_provider().cached_item_types().is_empty());

    context
        .repository::<Book>()
        .get_container(&cancel)
        .await
        .unwrap();
    assert_eq!(store.call_count(StoreOperation::CreateContainer), 2);
}

#[tokio::test]
async fn test_cancellation_aborts_provisioning() {
    let store = Arc::new(InMemoryStore::new());
    store.set_latency(StoreOperation::CreateContainer, Duration::from_secs(30));
    let context = per_type_context(&store, book_config());
    let cancel = CancellationToken::new();

    let repository = context.repository::<Book>();
    let lookup = {
        let cancel = cancel.clone();
        tokio::spawn(async move { repository.get_container(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), lookup)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(context.container_provider().cached_item_types().is_empty());
    assert!(store.container_properties("library", "books").is_none());
}
