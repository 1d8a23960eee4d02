/*!
 * Client for OpenAI-compatible `/chat/completions` APIs.
 *
 * Used by every OpenAI-compatible profile (OpenAI, Zhipu, SiliconFlow,
 * Gemini, Groq, DeepSeek, ...) and by Xinference's OpenAI endpoint.
 */

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{Backend, truncate_body};
use crate::translation::prompts::{ChatMessage, Payload};

/// Provider error codes that mean the content was refused
const CONTENT_FILTER_CODES: &[&str] = &["1301", "content_filter", "content_policy_violation"];

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    /// Model name
    pub model: String,
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Options for translation-specialised models (Qwen-MT)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_options: Option<TranslationOptions>,
}

/// Translation options understood by translation-specialised models
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TranslationOptions {
    /// Source language
    pub source_lang: String,
    /// Target language
    pub target_lang: String,
    /// Domain hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains: Option<String>,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    /// Completion choices
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Error object some providers return with HTTP 200
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

/// One completion choice
#[derive(Debug, Deserialize)]
pub struct Choice {
    /// Generated message
    pub message: ResponseMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Generated message
#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    /// Message text
    #[serde(default)]
    pub content: Option<String>,
}

/// Error body
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    /// Provider error code (string or number)
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    /// Error message
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    fn code_string(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(code)) => Some(code.clone()),
            Some(serde_json::Value::Number(code)) => Some(code.to_string()),
            _ => None,
        }
    }

    fn is_content_filter(&self) -> bool {
        self.code_string()
            .is_some_and(|code| CONTENT_FILTER_CODES.contains(&code.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

/// OpenAI-compatible client
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    /// Base URL, without the `/chat/completions` path
    base_url: String,
    /// Bearer token
    api_key: Option<String>,
    /// HTTP client
    client: Client,
    /// Sampling parameters sent with every request
    options: BTreeMap<String, serde_json::Value>,
    /// Domain hint; `Some` turns on `translation_options` for text payloads
    translation_domains: Option<Option<String>>,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        options: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client: Client::builder()
                .pool_idle_timeout(Duration::from_secs(90))
                .pool_max_idle_per_host(20)
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            options,
            translation_domains: None,
        }
    }

    /// Send `translation_options` with text payloads
    pub fn with_translation_options(mut self, domains: Option<String>) -> Self {
        self.translation_domains = Some(domains);
        self
    }

    /// Completion endpoint
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build the request body for one call
    pub fn build_request(&self, payload: &Payload, model: &str) -> ChatCompletionRequest {
        let translation_options = match (payload, &self.translation_domains) {
            (
                Payload::Text {
                    source_language,
                    target_language,
                    ..
                },
                Some(domains),
            ) => Some(TranslationOptions {
                source_lang: source_language.clone(),
                target_lang: target_language.clone(),
                domains: domains.clone(),
            }),
            _ => None,
        };

        ChatCompletionRequest {
            model: model.to_string(),
            messages: payload.to_messages(),
            temperature: self.options.get("temperature").and_then(|v| v.as_f64()),
            translation_options,
        }
    }

    /// Extract the translation from a successful response body
    pub fn parse_response(body: &str) -> Result<String, ProviderError> {
        let response: ChatCompletionResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", e, truncate_body(body))))?;

        if let Some(error) = &response.error {
            let message = error.message.clone().unwrap_or_default();
            if error.is_content_filter() {
                return Err(ProviderError::ContentRejected(message));
            }
            if response.choices.is_empty() {
                return Err(ProviderError::ParseError(format!(
                    "Empty response with error: {}",
                    message
                )));
            }
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("Empty response from API".to_string()))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(ProviderError::ContentRejected(
                "Completion stopped by content filter".to_string(),
            ));
        }

        choice
            .message
            .content
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ProviderError::ParseError("Response message has no content".to_string()))
    }

    /// Classify a non-success response
    pub fn classify_error(status: u16, body: &str) -> ProviderError {
        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
            if envelope.error.is_content_filter() {
                return ProviderError::ContentRejected(
                    envelope.error.message.unwrap_or_else(|| truncate_body(body)),
                );
            }
        }
        ProviderError::from_status(status, truncate_body(body))
    }
}

#[async_trait]
impl Backend for OpenAiClient {
    async fn call(&self, payload: &Payload, model: &str) -> Result<String, ProviderError> {
        let request = self.build_request(payload, model);
        debug!("POST {} (model {})", self.endpoint(), model);

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Self::parse_response(&body)
        } else {
            Err(Self::classify_error(status.as_u16(), &body))
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let mut builder = self.client.get(format!("{}/models", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Self::classify_error(status.as_u16(), &body))
        }
    }
}
