/*!
 * Tests for concurrent dispatch
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use mtgate::errors::TranslationError;
use mtgate::providers::MockBackend;
use mtgate::translation::cache::{CacheStore, MemoryCacheStore};
use mtgate::translation::{Dispatcher, JobOutcome};

use crate::common::mock_builder;
use crate::common::mock_providers::{ConcurrencyGauge, POISON};

#[tokio::test]
async fn test_run_withOnePoisonedRequest_shouldIsolateFailure() {
    let gauge = Arc::new(ConcurrencyGauge::new(5));
    let translator = Arc::new(mock_builder(gauge.clone(), "A;B").build().unwrap());

    let texts: Vec<String> = (0..100)
        .map(|i| if i == 37 { format!("{} {}", POISON, i) } else { format!("item {}", i) })
        .collect();

    let (reports, summary) = Dispatcher::new(translator, 8).run(texts.clone()).await;

    assert_eq!(reports.len(), 100);
    assert_eq!(summary.translated, 99);
    assert_eq!(summary.failed, 1);
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.index, i);
        assert_eq!(report.source, texts[i]);
        if i == 37 {
            assert!(matches!(
                report.outcome,
                JobOutcome::Failed(TranslationError::ExhaustedCandidates { .. })
            ));
        } else {
            assert_eq!(report.translation(), Some(texts[i].to_uppercase().as_str()));
        }
    }
    // Two candidates for the poisoned item, one call for everything else
    assert_eq!(gauge.calls(), 101);
}

#[tokio::test]
async fn test_run_shouldRespectWorkerBound() {
    let gauge = Arc::new(ConcurrencyGauge::new(20));
    let translator = Arc::new(mock_builder(gauge.clone(), "m").build().unwrap());

    let texts: Vec<String> = (0..24).map(|i| format!("text {}", i)).collect();
    let (_, summary) = Dispatcher::new(translator, 4).run(texts).await;

    assert_eq!(summary.translated, 24);
    assert!(gauge.peak() <= 4, "peak was {}", gauge.peak());
    assert!(gauge.peak() >= 2, "expected some parallelism, peak was {}", gauge.peak());
}

#[tokio::test]
async fn test_run_withSlowItem_shouldNotDelayOthers() {
    let backend = Arc::new(MockBackend::slow(300));
    let slow = Arc::new(mock_builder(backend, "m").build().unwrap());
    let gauge = Arc::new(ConcurrencyGauge::new(1));
    let fast = Arc::new(mock_builder(gauge, "m").build().unwrap());

    let started = Instant::now();
    let slow_run = Dispatcher::new(slow, 1).spawn(vec!["slow".to_string()]);
    let (fast_reports, _) = Dispatcher::new(fast, 4)
        .run((0..10).map(|i| format!("fast {}", i)).collect())
        .await;
    let fast_elapsed = started.elapsed();

    assert!(fast_reports.iter().all(|r| r.is_success()));
    assert!(fast_elapsed < Duration::from_millis(300));

    let (slow_reports, _) = slow_run.wait().await;
    assert!(slow_reports[0].is_success());
}

#[tokio::test]
async fn test_spawn_withCancelledItem_shouldWriteNothingForIt() {
    let store = Arc::new(MemoryCacheStore::new());
    let backend = Arc::new(MockBackend::slow(200));
    let translator = Arc::new(
        mock_builder(backend, "m")
            .with_cache_store(store.clone())
            .build()
            .unwrap(),
    );

    let run = Dispatcher::new(translator.clone(), 2).spawn(vec!["keep".to_string(), "drop".to_string()]);
    assert!(run.canceller().cancel(1));
    let (reports, summary) = run.wait().await;

    assert!(reports[0].is_success());
    assert!(matches!(reports[1].outcome, JobOutcome::Cancelled));
    assert_eq!(summary.cancelled, 1);

    let dropped = translator.request("drop").fingerprint();
    assert_eq!(store.get(dropped.as_str()).await.unwrap(), None);
    assert_eq!(store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_run_withProgressCallback_shouldReachTotal() {
    let translator = Arc::new(mock_builder(Arc::new(MockBackend::working()), "m").build().unwrap());
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_callback = seen.clone();

    let dispatcher = Dispatcher::new(translator, 3).with_progress(move |completed, total| {
        assert!(completed <= total);
        seen_in_callback.fetch_max(completed, Ordering::SeqCst);
    });
    let (reports, _) = dispatcher
        .run((0..9).map(|i| format!("line {}", i)).collect())
        .await;

    assert_eq!(reports.len(), 9);
    assert_eq!(seen.load(Ordering::SeqCst), 9);
}

#[tokio::test]
async fn test_run_withSharedCache_shouldServeDuplicatesOnSecondRound() {
    let store = Arc::new(MemoryCacheStore::new());
    let backend = Arc::new(MockBackend::working());
    let translator = Arc::new(
        mock_builder(backend.clone(), "m")
            .with_cache_store(store.clone())
            .build()
            .unwrap(),
    );
    let texts: Vec<String> = (0..20).map(|i| format!("line {}", i)).collect();

    Dispatcher::new(translator.clone(), 5).run(texts.clone()).await;
    let calls_after_first = backend.call_count();
    let (reports, _) = Dispatcher::new(translator, 5).run(texts).await;

    assert_eq!(calls_after_first, 20);
    assert_eq!(backend.call_count(), 20);
    assert!(reports.iter().all(|r| r.is_success()));
}
