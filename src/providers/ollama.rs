use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{Backend, truncate_body};
use crate::translation::prompts::{ChatMessage, Payload};

/// Ollama client for interacting with the Ollama chat API
#[derive(Debug, Clone)]
pub struct OllamaClient {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    /// Sampling options sent with every request
    options: GenerationOptions,
}

/// Generation options for the Ollama API
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model name to use for generation
    pub model: String,
    /// Messages of the conversation
    pub messages: Vec<ChatMessage>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerationOptions>,
    /// Whether to stream the response
    pub stream: bool,
}

/// Chat response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Response message
    pub message: ChatMessage,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// Number of generated tokens
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl OllamaClient {
    /// Create a client for `host`; a missing scheme defaults to http
    pub fn new(host: impl Into<String>, options: BTreeMap<String, serde_json::Value>) -> Self {
        let host = host.into();
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("http://{}", host)
        };

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                // Ollama speaks HTTP/1.1
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .pool_max_idle_per_host(20)
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            options: GenerationOptions {
                temperature: options.get("temperature").and_then(|v| v.as_f64()),
                num_predict: None,
            },
        }
    }

    /// Chat endpoint
    pub fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    /// Build the request body for one call
    pub fn build_request(&self, payload: &Payload, model: &str) -> ChatRequest {
        let options = if self.options == GenerationOptions::default() {
            None
        } else {
            Some(self.options.clone())
        };
        ChatRequest {
            model: model.to_string(),
            messages: payload.to_messages(),
            options,
            stream: false,
        }
    }

    /// Extract the message from a response body.
    ///
    /// A streamed (JSON lines) body is tolerated: the pieces are concatenated.
    pub fn parse_response(body: &str) -> Result<String, ProviderError> {
        if let Ok(response) = serde_json::from_str::<ChatResponse>(body) {
            return Ok(response.message.content);
        }

        let mut content = String::new();
        let mut parsed_any = false;
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let chunk: ChatResponse = serde_json::from_str(line).map_err(|e| {
                error!(
                    "Failed to parse Ollama API response: {}. Raw response: {}",
                    e,
                    truncate_body(body)
                );
                ProviderError::ParseError(e.to_string())
            })?;
            content.push_str(&chunk.message.content);
            parsed_any = true;
        }

        if parsed_any {
            Ok(content)
        } else {
            Err(ProviderError::ParseError("Empty response from Ollama".to_string()))
        }
    }
}

#[async_trait]
impl Backend for OllamaClient {
    async fn call(&self, payload: &Payload, model: &str) -> Result<String, ProviderError> {
        let request = self.build_request(payload, model);
        debug!("POST {} (model {})", self.endpoint(), model);

        let response = self.client.post(self.endpoint()).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Self::parse_response(&body)
        } else {
            Err(ProviderError::from_status(status.as_u16(), truncate_body(&body)))
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(format!("{}/api/version", self.base_url))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::from_status(
                response.status().as_u16(),
                "Ollama version check failed",
            ))
        }
    }
}
