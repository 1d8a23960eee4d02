/*!
 * Tests for provider profiles, backend construction and the mock backend
 */

use mtgate::app_config::ProviderSettings;
use mtgate::errors::{ConfigError, ProviderError};
use mtgate::providers::{
    Backend, ContentErrorPolicy, MockBackend, MockBehavior, create_backend, profiles,
    resolve_endpoint,
};
use mtgate::translation::{Payload, PlaceholderStyle};

fn text(value: &str) -> Payload {
    Payload::Text {
        text: value.to_string(),
        source_language: "en".to_string(),
        target_language: "fr".to_string(),
    }
}

#[test]
fn test_all_shouldListEveryBuiltinProfile() {
    let names: Vec<String> = profiles::all().into_iter().map(|p| p.name).collect();
    assert_eq!(names.len(), profiles::BUILTIN_NAMES.len());
    assert_eq!(names.first().map(String::as_str), Some("google"));
    assert!(names.contains(&"qwen-mt".to_string()));
}

#[test]
fn test_lookup_withMockName_shouldReturnMockProfile() {
    let profile = profiles::lookup("MOCK").unwrap();
    assert_eq!(profile.name, profiles::MOCK_NAME);
    assert!(profiles::builtin("mock").is_none());
}

#[test]
fn test_profiles_capabilities_shouldMatchBackendFamilies() {
    let openai = profiles::builtin("openai").unwrap();
    assert_eq!(openai.placeholder_style, PlaceholderStyle::Formula);
    assert!(openai.custom_prompt);

    let google = profiles::builtin("google").unwrap();
    assert_eq!(google.placeholder_style, PlaceholderStyle::RichTextPair);
    assert_eq!(google.content_error_policy, ContentErrorPolicy::Sentinel);
    assert!(!google.custom_prompt);
}

#[test]
fn test_createBackend_withExternalProfile_shouldFail() {
    let profile = profiles::builtin("bing").unwrap();
    let result = create_backend(&profile, &ProviderSettings::new());
    assert_eq!(
        result.err(),
        Some(ConfigError::NoBuiltinBackend("bing".to_string()))
    );
}

#[test]
fn test_createBackend_withResolvedSettings_shouldBuildClients() {
    let ollama = profiles::builtin("ollama").unwrap();
    let settings = ProviderSettings::new().with("OLLAMA_HOST", "http://localhost:11434");
    assert!(create_backend(&ollama, &settings).is_ok());

    let deeplx = profiles::builtin("deeplx").unwrap();
    let settings = ProviderSettings::new().with("DEEPLX_ENDPOINT", "http://localhost:1188/translate");
    assert!(create_backend(&deeplx, &settings).is_ok());
}

#[test]
fn test_createBackend_withMissingEndpoint_shouldFail() {
    let ollama = profiles::builtin("ollama").unwrap();
    assert!(matches!(
        create_backend(&ollama, &ProviderSettings::new()),
        Err(ConfigError::MissingSetting { .. })
    ));
}

#[test]
fn test_resolveEndpoint_shouldTrimTrailingSlash() {
    let ollama = profiles::builtin("ollama").unwrap();
    let settings = ProviderSettings::new().with("OLLAMA_HOST", "http://localhost:11434/");
    assert_eq!(
        resolve_endpoint(&ollama, &settings).unwrap(),
        "http://localhost:11434"
    );
}

#[tokio::test]
async fn test_mockBackend_perModelBehavior_shouldOverrideDefault() {
    let backend = MockBackend::working().with_model_behavior("bad", MockBehavior::Failing);

    assert!(backend.call(&text("hi"), "bad").await.is_err());
    assert_eq!(
        backend.call(&text("hi"), "good").await.unwrap(),
        "[TRANSLATED] hi"
    );
    assert_eq!(backend.calls(), vec!["bad".to_string(), "good".to_string()]);
}

#[tokio::test]
async fn test_mockBackend_intermittent_shouldFailEveryNth() {
    let backend = MockBackend::intermittent(2);
    assert!(backend.call(&text("a"), "m").await.is_ok());
    assert!(matches!(
        backend.call(&text("b"), "m").await,
        Err(ProviderError::ApiError { status_code: 503, .. })
    ));
    assert!(backend.call(&text("c"), "m").await.is_ok());
}

#[tokio::test]
async fn test_mockBackend_clones_shouldShareCallLog() {
    let backend = MockBackend::identity();
    let clone = backend.clone();
    clone.call(&text("x"), "m").await.unwrap();

    assert_eq!(backend.call_count(), 1);
    backend.reset();
    assert_eq!(clone.call_count(), 0);
}
