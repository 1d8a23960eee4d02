use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::default::Default;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ConfigError;
use crate::providers::profiles::{self, BackendProfile, SettingKind};
use crate::translation::retry::RetryPolicy;

/// Application configuration module
///
/// This module handles the configuration object passed to translators at
/// construction: loading, validating and saving it, and layering per-provider
/// settings from explicit arguments, environment-style overrides, the stored
/// document and built-in defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Provider name (a key of the backend profile registry)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier(s); `;` separates fallback candidates
    #[serde(default)]
    pub model: Option<String>,

    /// Source language code (generic, resolved per backend)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (generic, resolved per backend)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retry and failover settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Worker bound for batch dispatch; the profile's default when unset
    #[serde(default)]
    pub max_concurrent_requests: Option<usize>,

    /// Optional prompt template file
    #[serde(default)]
    pub prompt_template_path: Option<PathBuf>,

    /// Optional glossary file
    #[serde(default)]
    pub glossary_path: Option<PathBuf>,

    /// Stored settings per provider name
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Log level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to the `log` crate's filter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Cache configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CacheConfig {
    /// Whether translations are cached at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SQLite file; the user data directory when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Keep the cache in memory only
    #[serde(default)]
    pub in_memory: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            in_memory: false,
        }
    }
}

/// Retry configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts per candidate for transient failures
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,

    /// Fixed delay between attempts on the same candidate
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Timeout for a single backend call
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_ceiling: default_retry_ceiling(),
            backoff_ms: default_backoff_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

impl RetryConfig {
    /// Build the engine policy from this configuration
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            retry_ceiling: self.retry_ceiling,
            backoff: Duration::from_millis(self.backoff_ms),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "zh".to_string()
}

fn default_true() -> bool {
    true
}

fn default_retry_ceiling() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_attempt_timeout_secs() -> u64 {
    60
}

/// Key-value settings of one provider (`OPENAI_API_KEY`, `OLLAMA_HOST`, ...)
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ProviderSettings(BTreeMap<String, String>);

impl ProviderSettings {
    /// Create an empty settings map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Interpret a value as a boolean flag ("1", "true", "yes", "on")
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| {
            matches!(
                v.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no entries are set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ProviderSettings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Source of environment-style overrides
pub trait EnvSource: Send + Sync {
    /// Value for `key`, if overridden
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads overrides from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed overrides, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    /// Create an empty override set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Resolve a profile's settings.
///
/// Precedence per key: `explicit` > `env` > `stored` > the profile default.
/// Keys the profile does not declare are carried over from `stored` and
/// `explicit` unchanged. Nothing is written back anywhere.
pub fn resolve_settings(
    profile: &BackendProfile,
    stored: Option<&ProviderSettings>,
    env: &dyn EnvSource,
    explicit: &ProviderSettings,
) -> Result<ProviderSettings, ConfigError> {
    let mut resolved = stored.cloned().unwrap_or_default();
    for (key, value) in explicit.iter() {
        resolved.set(key.clone(), value.clone());
    }

    for spec in &profile.settings {
        let value = explicit
            .get(&spec.key)
            .map(str::to_string)
            .or_else(|| env.var(&spec.key))
            .or_else(|| stored.and_then(|s| s.get(&spec.key)).map(str::to_string))
            .or_else(|| spec.default.clone())
            .filter(|v| !v.trim().is_empty());

        match value {
            Some(value) => {
                if spec.kind == SettingKind::Url {
                    url::Url::parse(&value).map_err(|e| ConfigError::InvalidValue {
                        key: spec.key.clone(),
                        message: format!("not a valid URL ({}): {}", e, value),
                    })?;
                }
                resolved.set(spec.key.clone(), value);
            }
            None if spec.required => {
                return Err(ConfigError::MissingSetting {
                    provider: profile.name.clone(),
                    key: spec.key.clone(),
                });
            }
            None => {}
        }
    }

    Ok(resolved)
}

impl Config {
    /// Load a configuration document from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save the configuration document as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if profiles::lookup(&self.provider).is_none() {
            return Err(ConfigError::UnknownProvider(self.provider.clone()));
        }

        if self.source_language.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "source_language".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if self.target_language.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "target_language".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if self.retry.retry_ceiling == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry.retry_ceiling".to_string(),
                message: "at least one attempt per candidate is required".to_string(),
            });
        }

        if self.retry.attempt_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry.attempt_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.max_concurrent_requests == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "max_concurrent_requests".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Stored settings for a provider
    pub fn provider_settings(&self, provider: &str) -> Option<&ProviderSettings> {
        self.providers.get(provider)
    }

    /// Worker bound for batch dispatch
    pub fn effective_concurrency(&self, profile: &BackendProfile) -> usize {
        self.max_concurrent_requests
            .unwrap_or(profile.max_concurrent_requests)
            .max(1)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            provider: default_provider(),
            model: None,
            source_language: default_source_language(),
            target_language: default_target_language(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            max_concurrent_requests: None,
            prompt_template_path: None,
            glossary_path: None,
            providers: BTreeMap::new(),
            log_level: LogLevel::default(),
        }
    }
}
