//! Integration tests for configuration-driven repositories

use super::test_utils::{book_document, Book};
use cosmos_repository::config::ConfigLoader;
use cosmos_repository::store::{InMemoryStore, StoreOperation};
use cosmos_repository::{
    CancellationToken, QueryResult, QuerySpecification, RepositoryContext, RepositoryError,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Serializes tests that touch process environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const LIBRARY_CONFIG: &str = r#"
[repository]
database_id = "library"
container_per_item_type = true

[[items]]
type_name = "Book"
container_name = "books"
partition_key_path = "/author"
time_to_live_seconds = 7200
"#;

#[tokio::test]
async fn test_context_from_config_provisions_declared_items() {
    let config = {
        let _guard = ENV_MUTEX.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("repository.toml");
        std::fs::write(&config_file, LIBRARY_CONFIG).unwrap();
        ConfigLoader::load_file(&config_file).unwrap()
    };

    let store = Arc::new(InMemoryStore::new());
    let context = RepositoryContext::from_config(&config, store.clone()).unwrap();
    let repository = context.repository::<Book>();
    let cancel = CancellationToken::new();

    let handle = repository.get_container(&cancel).await.unwrap();
    assert_eq!(handle.database_id(), "library");
    assert_eq!(handle.id(), "books");
    assert_eq!(handle.properties().default_time_to_live, Some(7200));

    for n in 0..3 {
        store
            .insert_document("library", "books", book_document(n))
            .unwrap();
    }
    let result = repository
        .query(
            QuerySpecification::<Book, QueryResult<Book>>::default_query(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(result.total, 3);
}

#[tokio::test]
async fn test_undeclared_item_type_fails_without_network() {
    let config = {
        let _guard = ENV_MUTEX.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("repository.toml");
        std::fs::write(
            &config_file,
            "[repository]\ndatabase_id = \"library\"\ncontainer_id = \"shared\"\n",
        )
        .unwrap();
        ConfigLoader::load_file(&config_file).unwrap()
    };

    let store = Arc::new(InMemoryStore::new());
    let context = RepositoryContext::from_config(&config, store.clone()).unwrap();

    let err = context
        .repository::<Book>()
        .get_container(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::UnregisteredItemType(ref name) if name == "Book"));
    assert_eq!(store.call_count(StoreOperation::CreateDatabase), 0);
}

#[test]
fn test_invalid_config_is_rejected_with_every_error() {
    let config = {
        let _guard = ENV_MUTEX.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("repository.toml");
        std::fs::write(
            &config_file,
            r#"
[repository]
database_id = ""

[[items]]
type_name = "Book"
container_name = "books"
partition_key_path = "author"
"#,
        )
        .unwrap();
        ConfigLoader::load_file(&config_file).unwrap()
    };

    let err = RepositoryContext::from_config(&config, Arc::new(InMemoryStore::new()))
        .err()
        .unwrap();
    match err {
        RepositoryError::Validation(errors) => assert_eq!(errors.len(), 2),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_environment_overlay_file_is_applied() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("repository.toml");
    std::fs::write(&config_file, LIBRARY_CONFIG).unwrap();
    std::fs::write(
        temp_dir.path().join("repository.staging.toml"),
        "[repository]\ndatabase_id = \"library-staging\"\n",
    )
    .unwrap();

    std::env::set_var("COSMOS_REPOSITORY_ENV", "staging");
    let loaded = ConfigLoader::load_file(&config_file);
    std::env::remove_var("COSMOS_REPOSITORY_ENV");

    let config = loaded.unwrap();
    assert_eq!(config.repository.database_id, "library-staging");
    assert!(config.repository.container_per_item_type);
    assert_eq!(config.items.len(), 1);
}
