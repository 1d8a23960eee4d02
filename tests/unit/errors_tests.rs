/*!
 * Tests for error classification and conversions
 */

use std::time::Duration;

use mtgate::errors::{AppError, ConfigError, ProviderError, TranslationError};

#[test]
fn test_providerError_transientKinds_shouldRetry() {
    let transient = [
        ProviderError::RequestFailed("reset".to_string()),
        ProviderError::ConnectionError("refused".to_string()),
        ProviderError::Timeout(Duration::from_secs(1)),
        ProviderError::RateLimitExceeded("slow down".to_string()),
        ProviderError::from_status(400, "bad request"),
        ProviderError::from_status(408, "timeout"),
        ProviderError::from_status(502, "bad gateway"),
    ];
    for error in transient {
        assert!(error.is_transient(), "{} should be transient", error);
    }
}

#[test]
fn test_providerError_permanentKinds_shouldNotRetry() {
    let permanent = [
        ProviderError::AuthenticationError("bad key".to_string()),
        ProviderError::ParseError("garbage".to_string()),
        ProviderError::ContentRejected("policy".to_string()),
        ProviderError::from_status(404, "no such model"),
    ];
    for error in permanent {
        assert!(!error.is_transient(), "{} should not be transient", error);
    }
}

#[test]
fn test_providerError_fromStatus_shouldMapAuthAndRateLimit() {
    assert!(matches!(
        ProviderError::from_status(401, "x"),
        ProviderError::AuthenticationError(_)
    ));
    assert!(matches!(
        ProviderError::from_status(429, "x"),
        ProviderError::RateLimitExceeded(_)
    ));
}

#[test]
fn test_translationError_exhausted_shouldListCandidates() {
    let error = TranslationError::ExhaustedCandidates {
        candidates: vec!["a".to_string(), "b".to_string()],
        last_error: "boom".to_string(),
    };
    let message = error.to_string();
    assert!(message.contains("a, b"));
    assert!(message.contains("boom"));
}

#[test]
fn test_appError_fromConfigError_shouldWrap() {
    let error: AppError = ConfigError::UnknownProvider("x".to_string()).into();
    assert!(matches!(error, AppError::Config(_)));

    let error: AppError = std::io::Error::other("disk").into();
    assert!(matches!(error, AppError::File(_)));
}
