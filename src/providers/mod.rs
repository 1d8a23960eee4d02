/*!
 * Backend call interface and built-in provider clients.
 *
 * Every provider is reached through one operation: send a prepared payload
 * for one model and return the raw text, or a structured error. Retries,
 * failover, caching and validation all live above this seam.
 *
 * Built-in clients:
 * - `OpenAiClient`: `/chat/completions` compatible APIs
 * - `OllamaClient`: local Ollama server
 * - `MtServerClient`: self-hosted MT inference server
 * - `DeepLXClient`: DeepLX bridge
 * - `MockBackend`: scripted backend for tests and dry runs
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::ProviderSettings;
use crate::errors::{ConfigError, ProviderError};
use crate::translation::prompts::{Payload, PayloadShape};

pub mod deeplx;
pub mod mock;
pub mod mt_server;
pub mod ollama;
pub mod openai;
pub mod profiles;

pub use mock::{MockBackend, MockBehavior};
pub use profiles::{BackendKind, BackendProfile, SettingKind, SettingSpec};

/// Text returned in place of a translation when a sentinel-policy provider
/// rejects the content
pub const IRREPARABLE_TRANSLATION: &str = "IRREPARABLE TRANSLATION ERROR";

/// What a provider content refusal becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentErrorPolicy {
    /// Candidate failure; the engine moves to the next candidate
    #[default]
    Raise,
    /// Terminal result `IRREPARABLE_TRANSLATION`, never retried
    Sentinel,
}

/// Common trait for all translation backends
///
/// Implementations make exactly one request per `call`. They must not retry;
/// the retry/failover engine owns that.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Send a prepared payload to `model` and return the raw output
    ///
    /// # Arguments
    /// * `payload` - Plain text or chat messages, already shaped for this backend
    /// * `model` - One candidate model identifier
    ///
    /// # Returns
    /// * `Result<String, ProviderError>` - Raw backend output or a classified error
    async fn call(&self, payload: &Payload, model: &str) -> Result<String, ProviderError>;

    /// Test the connection to the backend
    async fn test_connection(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Endpoint for a profile from resolved settings
pub fn resolve_endpoint(
    profile: &BackendProfile,
    settings: &ProviderSettings,
) -> Result<String, ConfigError> {
    let endpoint = match (&profile.endpoint_key, &profile.fixed_endpoint) {
        (Some(key), _) => settings
            .get(key)
            .map(str::to_string)
            .ok_or_else(|| ConfigError::MissingSetting {
                provider: profile.name.clone(),
                key: key.clone(),
            })?,
        (None, Some(fixed)) => fixed.clone(),
        (None, None) => {
            return Err(ConfigError::InvalidValue {
                key: profile.name.clone(),
                message: "profile declares no endpoint".to_string(),
            });
        }
    };

    let mut endpoint = endpoint.trim_end_matches('/').to_string();
    if let Some(suffix) = &profile.endpoint_suffix {
        if !endpoint.ends_with(suffix.as_str()) {
            endpoint.push_str(suffix);
        }
    }
    Ok(endpoint)
}

/// Build the built-in client for a profile
///
/// Profiles of kind `External` have no built-in client and fail with
/// `ConfigError::NoBuiltinBackend`; callers plug in their own `Backend`.
pub fn create_backend(
    profile: &BackendProfile,
    settings: &ProviderSettings,
) -> Result<Arc<dyn Backend>, ConfigError> {
    let api_key = profile
        .api_key_key
        .as_ref()
        .and_then(|key| settings.get(key))
        .map(str::to_string);

    let backend: Arc<dyn Backend> = match profile.kind {
        BackendKind::OpenAiCompatible => {
            let endpoint = resolve_endpoint(profile, settings)?;
            let client = openai::OpenAiClient::new(endpoint, api_key, profile.cache_params.clone());
            // Text payloads on a chat API go to translation-specialised models
            let client = if profile.payload_shape == PayloadShape::Text {
                client.with_translation_options(settings.get("ALI_DOMAINS").map(str::to_string))
            } else {
                client
            };
            Arc::new(client)
        }
        BackendKind::Ollama => {
            let endpoint = resolve_endpoint(profile, settings)?;
            Arc::new(ollama::OllamaClient::new(endpoint, profile.cache_params.clone()))
        }
        BackendKind::MtServer => {
            let endpoint = resolve_endpoint(profile, settings)?;
            let max_tokens = match settings.get("MT_MAX_TOKENS") {
                Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "MT_MAX_TOKENS".to_string(),
                    message: format!("expected a positive integer, got '{}'", value),
                })?,
                None => mt_server::DEFAULT_MAX_TOKENS,
            };
            Arc::new(mt_server::MtServerClient::new(endpoint, max_tokens))
        }
        BackendKind::DeepLX => {
            let endpoint = resolve_endpoint(profile, settings)?;
            let token = settings.get("DEEPLX_ACCESS_TOKEN").map(str::to_string);
            Arc::new(deeplx::DeepLXClient::new(endpoint, token))
        }
        BackendKind::External => {
            return Err(ConfigError::NoBuiltinBackend(profile.name.clone()));
        }
    };

    Ok(backend)
}

/// Cut a response body down for error messages
pub(crate) fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 300;
    if body.chars().count() > LIMIT {
        let head: String = body.chars().take(LIMIT).collect();
        format!("{}...", head)
    } else {
        body.to_string()
    }
}
