/*!
 * Tests for the SQLite-backed cache shared by translators and processes
 */

use std::sync::Arc;

use mtgate::database::SqliteCacheStore;
use mtgate::providers::MockBackend;
use mtgate::translation::Dispatcher;
use mtgate::translation::cache::CacheStore;

use crate::common::{self, mock_builder};

#[tokio::test]
async fn test_sqliteStore_shouldServeTranslationsAfterReopen() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("cache.db");

    {
        let store = Arc::new(SqliteCacheStore::open(&path).unwrap());
        let translator = mock_builder(Arc::new(MockBackend::working()), "m")
            .with_cache_store(store)
            .build()
            .unwrap();
        translator.translate("Hello", false).await.unwrap();
    }

    let backend = Arc::new(MockBackend::failing());
    let store = Arc::new(SqliteCacheStore::open(&path).unwrap());
    let translator = mock_builder(backend.clone(), "m")
        .with_cache_store(store.clone())
        .build()
        .unwrap();

    assert_eq!(
        translator.translate("Hello", false).await.unwrap(),
        "[TRANSLATED] Hello"
    );
    assert_eq!(backend.call_count(), 0);

    let key = translator.request("Hello").fingerprint();
    assert_eq!(store.hit_count(key.as_str()).await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_sqliteStore_withConcurrentWriters_shouldKeepOneEntryPerKey() {
    let store = Arc::new(SqliteCacheStore::in_memory().unwrap());
    let translator = Arc::new(
        mock_builder(Arc::new(MockBackend::slow(2)), "m")
            .with_cache_store(store.clone())
            .build()
            .unwrap(),
    );

    // Duplicates race to write the same fingerprint
    let texts: Vec<String> = (0..40).map(|i| format!("text {}", i % 10)).collect();
    let (reports, _) = Dispatcher::new(translator, 8).run(texts).await;

    assert!(reports.iter().all(|r| r.is_success()));
    assert_eq!(store.len().await.unwrap(), 10);
}

#[tokio::test]
async fn test_sqliteStore_clear_shouldForceBackendCalls() {
    let store = Arc::new(SqliteCacheStore::in_memory().unwrap());
    let backend = Arc::new(MockBackend::working());
    let translator = mock_builder(backend.clone(), "m")
        .with_cache_store(store.clone())
        .build()
        .unwrap();

    translator.translate("Hello", false).await.unwrap();
    store.clear().await.unwrap();
    translator.translate("Hello", false).await.unwrap();

    assert_eq!(backend.call_count(), 2);
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.entries, 1);
}
