/*!
 * Tests for the retry/failover state machine and candidate chains
 */

use std::time::Duration;

use mtgate::errors::TranslationError;
use mtgate::providers::{Backend, ContentErrorPolicy, MockBackend, MockBehavior};
use mtgate::translation::postprocess::PostProcess;
use mtgate::translation::retry::{EngineOutcome, RetryEngine, RetryState, Transition};
use mtgate::translation::{CandidateChain, Payload, PlaceholderCodec, PlaceholderStyle, RetryPolicy};
use mtgate::validation::{PairIntegrity, ResponseValidator};

use crate::common::fast_policy;

fn engine(retry_ceiling: u32) -> RetryEngine {
    RetryEngine::new(
        fast_policy(retry_ceiling),
        ResponseValidator::standard(PlaceholderStyle::RichTextPair),
        PostProcess::default(),
        ContentErrorPolicy::Raise,
    )
}

fn payload(text: &str) -> Payload {
    Payload::Text {
        text: text.to_string(),
        source_language: "en".to_string(),
        target_language: "fr".to_string(),
    }
}

#[test]
fn test_candidateChain_parse_shouldSplitAndTrim() {
    let chain = CandidateChain::parse(" a ; b ;; c ").unwrap();
    assert_eq!(chain.models(), ["a", "b", "c"]);
    assert_eq!(chain.to_string(), "a;b;c");
}

#[test]
fn test_candidateChain_parse_withOnlySeparators_shouldFail() {
    assert!(CandidateChain::parse(" ; ;").is_err());
}

#[test]
fn test_onFailure_transientBelowCeiling_shouldRetrySame() {
    let policy = fast_policy(3);
    let state = RetryState::start();
    assert_eq!(
        state.on_failure(true, &policy, 2),
        Transition::RetrySame(RetryState { candidate: 0, attempt: 1 })
    );
}

#[test]
fn test_onFailure_transientAtCeiling_shouldMoveOn() {
    let policy = fast_policy(2);
    let state = RetryState { candidate: 0, attempt: 1 };
    assert_eq!(
        state.on_failure(true, &policy, 2),
        Transition::NextCandidate(RetryState { candidate: 1, attempt: 0 })
    );
}

#[test]
fn test_onFailure_permanentOnLastCandidate_shouldExhaust() {
    let policy = fast_policy(5);
    let state = RetryState { candidate: 1, attempt: 0 };
    assert_eq!(state.on_failure(false, &policy, 2), Transition::Exhausted);
}

#[test]
fn test_worstCase_shouldMultiplyOut() {
    let policy = RetryPolicy {
        retry_ceiling: 3,
        backoff: Duration::from_millis(500),
        attempt_timeout: Duration::from_secs(2),
    };
    assert_eq!(policy.worst_case(2), Duration::from_secs(15));
}

#[tokio::test]
async fn test_run_withTransientThenSuccess_shouldStayOnCandidate() {
    // Fails every second call; the warm-up call takes the first slot
    let backend = MockBackend::intermittent(2).with_model_behavior("b", MockBehavior::Failing);
    backend.call(&payload("warm-up"), "warm-up").await.unwrap();
    let chain = CandidateChain::parse("a;b").unwrap();

    let outcome = engine(3).run(&backend, &chain, &payload("hi"), "hi").await.unwrap();
    assert_eq!(
        outcome,
        EngineOutcome::Translated {
            text: "[TRANSLATED] hi".to_string(),
            model: "a".to_string(),
        }
    );
    assert_eq!(backend.calls(), vec!["warm-up", "a", "a"]);
}

#[tokio::test]
async fn test_run_withTransientFailures_shouldRetryUpToCeiling() {
    let backend = MockBackend::failing();
    let chain = CandidateChain::parse("a;b").unwrap();

    let result = engine(3).run(&backend, &chain, &payload("hi"), "hi").await;
    assert!(matches!(
        result,
        Err(TranslationError::ExhaustedCandidates { ref candidates, .. }) if candidates == &["a", "b"]
    ));
    assert_eq!(backend.calls(), vec!["a", "a", "a", "b", "b", "b"]);
}

#[tokio::test]
async fn test_run_withOversizedOutput_shouldFailOverWithoutRetry() {
    let backend = MockBackend::new(MockBehavior::Oversized { len: 10_000 })
        .with_model_behavior("b", MockBehavior::Working);
    let chain = CandidateChain::parse("a;b").unwrap();

    let outcome = engine(3).run(&backend, &chain, &payload("hi"), "hi").await.unwrap();
    assert!(matches!(outcome, EngineOutcome::Translated { ref model, .. } if model == "b"));
    assert_eq!(backend.calls(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_run_withSentinelPolicy_shouldStopAtRejection() {
    let backend = MockBackend::new(MockBehavior::ContentRejected);
    let chain = CandidateChain::parse("a;b").unwrap();
    let engine = RetryEngine::new(
        fast_policy(3),
        ResponseValidator::empty(),
        PostProcess::default(),
        ContentErrorPolicy::Sentinel,
    );

    let outcome = engine.run(&backend, &chain, &payload("hi"), "hi").await.unwrap();
    assert_eq!(outcome, EngineOutcome::Irreparable { model: "a".to_string() });
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_run_withExhaustion_shouldReportLastCandidateError() {
    let backend = MockBackend::new(MockBehavior::Malformed)
        .with_model_behavior("b", MockBehavior::Unauthorized);
    let chain = CandidateChain::parse("a;b").unwrap();

    let result = engine(3).run(&backend, &chain, &payload("hi"), "hi").await;
    match result {
        Err(TranslationError::ExhaustedCandidates { last_error, .. }) => {
            assert!(last_error.contains("Simulated invalid API key"), "{}", last_error);
            assert!(!last_error.contains("malformed"), "{}", last_error);
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_runChecked_withFailingExtraCheck_shouldFailOver() {
    let codec = PlaceholderCodec::new(PlaceholderStyle::Formula);
    let pair = codec.wrap(0);
    let backend = MockBackend::new(MockBehavior::Respond("{{v1}}gras{{v0}}".to_string()))
        .with_model_behavior("b", MockBehavior::Identity);
    let chain = CandidateChain::parse("a;b").unwrap();
    let engine = RetryEngine::new(
        fast_policy(3),
        ResponseValidator::standard(PlaceholderStyle::Formula),
        PostProcess::default(),
        ContentErrorPolicy::Raise,
    );
    let extra = ResponseValidator::empty().with_check(PairIntegrity::new(PlaceholderStyle::Formula, vec![pair]));

    let outcome = engine
        .run_checked(&backend, &chain, &payload("{{v0}}bold{{v1}}"), "{{v0}}bold{{v1}}", &extra)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        EngineOutcome::Translated {
            text: "{{v0}}bold{{v1}}".to_string(),
            model: "b".to_string()
        }
    );
    assert_eq!(backend.calls(), vec!["a", "b"]);
}
