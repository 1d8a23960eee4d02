/*!
 * Tests for fingerprints and cache stores
 */

use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use mtgate::translation::cache::{CacheStore, Fingerprint, MemoryCacheStore, TranslationCache};

fn params(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn test_fingerprint_withSameInputs_shouldMatch() {
    let p = params(&[("model", json!("gpt-4o")), ("temperature", json!(0))]);
    let a = Fingerprint::compute("openai", &p, "en", "fr", "Hello");
    let b = Fingerprint::compute("openai", &p, "en", "fr", "Hello");
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 64);
}

#[test]
fn test_fingerprint_withParamsInsertedInOtherOrder_shouldMatch() {
    let mut first = BTreeMap::new();
    first.insert("temperature".to_string(), json!(0));
    first.insert("model".to_string(), json!("m"));
    let mut second = BTreeMap::new();
    second.insert("model".to_string(), json!("m"));
    second.insert("temperature".to_string(), json!(0));

    assert_eq!(
        Fingerprint::compute("openai", &first, "en", "fr", "x"),
        Fingerprint::compute("openai", &second, "en", "fr", "x")
    );
}

#[test]
fn test_fingerprint_withAnyFieldChanged_shouldDiffer() {
    let p = params(&[("model", json!("m"))]);
    let base = Fingerprint::compute("openai", &p, "en", "fr", "Hello");

    assert_ne!(base, Fingerprint::compute("ollama", &p, "en", "fr", "Hello"));
    assert_ne!(base, Fingerprint::compute("openai", &p, "de", "fr", "Hello"));
    assert_ne!(base, Fingerprint::compute("openai", &p, "en", "es", "Hello"));
    assert_ne!(base, Fingerprint::compute("openai", &p, "en", "fr", "Hello!"));
    assert_ne!(
        base,
        Fingerprint::compute("openai", &params(&[("model", json!("n"))]), "en", "fr", "Hello")
    );
}

#[test]
fn test_fingerprint_withFieldBoundaryShift_shouldDiffer() {
    let p = BTreeMap::new();
    assert_ne!(
        Fingerprint::compute("ab", &p, "c", "d", "e"),
        Fingerprint::compute("a", &p, "bc", "d", "e")
    );
}

#[tokio::test]
async fn test_memoryStore_shouldCountHitsAndMisses() {
    let store = MemoryCacheStore::new();
    store.set("k", "v").await.unwrap();

    assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    assert_eq!(store.get("other").await.unwrap(), None);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
}

#[test]
fn test_memoryStore_clones_shouldShareEntries() {
    let store = MemoryCacheStore::new();
    let clone = store.clone();

    let result = tokio_test::block_on(async {
        store.set("k", "v").await?;
        let seen = clone.get("k").await?;
        clone.clear().await?;
        Ok::<_, anyhow::Error>((seen, store.is_empty().await?))
    });

    let (seen, emptied) = result.unwrap();
    assert_eq!(seen, Some("v".to_string()));
    assert!(emptied);
}

#[tokio::test]
async fn test_translationCache_shouldRoundTripThroughFingerprint() {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = TranslationCache::new(store.clone());
    let key = Fingerprint::compute("mock", &BTreeMap::new(), "en", "fr", "cat");

    assert_eq!(cache.get(&key).await, None);
    cache.set(&key, "chat").await;
    assert_eq!(cache.get(&key).await, Some("chat".to_string()));
    assert_eq!(store.len().await.unwrap(), 1);
}
