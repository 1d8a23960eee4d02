/*!
 * Tests for the configuration document and settings resolution
 */

use std::time::Duration;

use mtgate::app_config::{Config, LogLevel, MapEnv, ProviderSettings, resolve_settings};
use mtgate::errors::ConfigError;
use mtgate::providers::profiles;

use crate::common;

#[test]
fn test_config_default_shouldValidate() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.cache.enabled);
}

#[test]
fn test_config_saveThenLoad_shouldPreserveFields() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let mut config = Config::default();
    config.provider = "deeplx".to_string();
    config.target_language = "de".to_string();
    config.retry.retry_ceiling = 5;
    config.providers.insert(
        "deeplx".to_string(),
        ProviderSettings::new().with("DEEPLX_ENDPOINT", "http://localhost:1188/translate"),
    );
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_load_withPartialDocument_shouldFillDefaults() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        dir.path(),
        "conf.json",
        r#"{ "provider": "openai", "target_language": "ja" }"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.provider, "openai");
    assert_eq!(config.target_language, "ja");
    assert_eq!(config.source_language, "en");
    assert_eq!(config.retry.retry_ceiling, 3);
}

#[test]
fn test_config_load_withBrokenJson_shouldFailWithParseError() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "conf.json", "{ nope").unwrap();
    assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn test_config_validate_withUnknownProvider_shouldFail() {
    let mut config = Config::default();
    config.provider = "babelfish".to_string();
    assert_eq!(
        config.validate(),
        Err(ConfigError::UnknownProvider("babelfish".to_string()))
    );
}

#[test]
fn test_config_validate_withZeroConcurrency_shouldFail() {
    let mut config = Config::default();
    config.max_concurrent_requests = Some(0);
    assert!(config.validate().is_err());
}

#[test]
fn test_retryConfig_policy_shouldConvertUnits() {
    let mut config = Config::default();
    config.retry.backoff_ms = 250;
    config.retry.attempt_timeout_secs = 10;
    let policy = config.retry.policy();
    assert_eq!(policy.backoff, Duration::from_millis(250));
    assert_eq!(policy.attempt_timeout, Duration::from_secs(10));
    assert_eq!(policy.worst_case(2), Duration::from_millis(2 * 3 * 10_250));
}

#[test]
fn test_resolveSettings_precedence_shouldPreferExplicitThenEnvThenStored() {
    let profile = profiles::builtin("openai").unwrap();
    let stored = ProviderSettings::new()
        .with("OPENAI_API_KEY", "stored-key")
        .with("OPENAI_MODEL", "stored-model")
        .with("OPENAI_BASE_URL", "https://stored.example/v1");
    let env = MapEnv::new()
        .with("OPENAI_API_KEY", "env-key")
        .with("OPENAI_MODEL", "env-model");
    let explicit = ProviderSettings::new().with("OPENAI_MODEL", "explicit-model");

    let resolved = resolve_settings(&profile, Some(&stored), &env, &explicit).unwrap();
    assert_eq!(resolved.get("OPENAI_MODEL"), Some("explicit-model"));
    assert_eq!(resolved.get("OPENAI_API_KEY"), Some("env-key"));
    assert_eq!(resolved.get("OPENAI_BASE_URL"), Some("https://stored.example/v1"));
}

#[test]
fn test_resolveSettings_withNothingStored_shouldUseProfileDefaults() {
    let profile = profiles::builtin("ollama").unwrap();
    let resolved =
        resolve_settings(&profile, None, &MapEnv::new(), &ProviderSettings::new()).unwrap();
    assert_eq!(resolved.get("OLLAMA_HOST"), Some("http://127.0.0.1:11434"));
    assert_eq!(resolved.get("OLLAMA_MODEL"), Some("gemma2"));
}

#[test]
fn test_resolveSettings_withMissingRequiredKey_shouldFail() {
    let profile = profiles::builtin("deepseek").unwrap();
    let result = resolve_settings(&profile, None, &MapEnv::new(), &ProviderSettings::new());
    assert_eq!(
        result,
        Err(ConfigError::MissingSetting {
            provider: "deepseek".to_string(),
            key: "DEEPSEEK_API_KEY".to_string(),
        })
    );
}

#[test]
fn test_resolveSettings_withInvalidUrl_shouldFail() {
    let profile = profiles::builtin("ollama").unwrap();
    let env = MapEnv::new().with("OLLAMA_HOST", "not a url");
    let result = resolve_settings(&profile, None, &env, &ProviderSettings::new());
    assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "OLLAMA_HOST"));
}

#[test]
fn test_resolveSettings_shouldNotMutateStoredSettings() {
    let profile = profiles::builtin("ollama").unwrap();
    let stored = ProviderSettings::new();
    let env = MapEnv::new().with("OLLAMA_MODEL", "qwen2");
    let resolved = resolve_settings(&profile, Some(&stored), &env, &ProviderSettings::new()).unwrap();

    assert_eq!(resolved.get("OLLAMA_MODEL"), Some("qwen2"));
    assert!(stored.is_empty());
}
