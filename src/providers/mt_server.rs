/*!
 * Client for a self-hosted MT inference server.
 *
 * The server takes the target language as a `<2xx>` tag in front of the text
 * and answers with `text_output`. HTTP 400 means the server was momentarily
 * unable to serve the request and is classified as transient.
 */

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{Backend, truncate_body};
use crate::translation::prompts::Payload;

/// Default generation limit
pub const DEFAULT_MAX_TOKENS: u32 = 511;

/// Tag used when the target language has no entry
const DEFAULT_LANGUAGE_TAG: &str = "<2en>";

/// Target language tag for a backend language code
pub fn language_tag(code: &str) -> &'static str {
    match code {
        "en" => "<2en>",
        "zh-CN" | "zh" => "<2zh>",
        "zh-TW" => "<2zt>",
        "ja" => "<2ja>",
        "ko" => "<2ko>",
        "ru" => "<2ru>",
        "fr" => "<2fr>",
        "de" => "<2de>",
        "it" => "<2it>",
        "es" => "<2es>",
        "pt" => "<2pt>",
        _ => DEFAULT_LANGUAGE_TAG,
    }
}

/// Generate request
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Language tag followed by the text
    pub text_input: String,
    /// Generation limit
    pub max_tokens: u32,
    /// Words the model must not produce
    pub bad_words: String,
    /// Words that end generation
    pub stop_words: String,
    /// End-of-sequence token id
    pub end_id: u32,
    /// Padding token id
    pub pad_id: u32,
}

/// Generate response
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    /// Generated translation
    pub text_output: Option<String>,
}

/// MT inference server client
#[derive(Debug, Clone)]
pub struct MtServerClient {
    /// Full generate URL
    endpoint: String,
    /// Generation limit
    max_tokens: u32,
    /// HTTP client
    client: Client,
}

impl MtServerClient {
    /// Create a new client
    pub fn new(endpoint: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            max_tokens,
            client: Client::builder()
                .pool_idle_timeout(Duration::from_secs(90))
                .pool_max_idle_per_host(32)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Build the request body for one call
    pub fn build_request(&self, payload: &Payload) -> GenerateRequest {
        let tag = match payload {
            Payload::Text { target_language, .. } => language_tag(target_language),
            Payload::Chat(_) => DEFAULT_LANGUAGE_TAG,
        };
        GenerateRequest {
            text_input: format!("{} {}", tag, payload.primary_text()),
            max_tokens: self.max_tokens,
            bad_words: String::new(),
            stop_words: String::new(),
            end_id: 2,
            pad_id: 1,
        }
    }

    /// Extract the translation from a response body
    pub fn parse_response(body: &str) -> Result<String, ProviderError> {
        let response: GenerateResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", e, truncate_body(body))))?;
        response
            .text_output
            .map(|text| text.trim().to_string())
            .ok_or_else(|| ProviderError::ParseError("Response has no text_output".to_string()))
    }
}

#[async_trait]
impl Backend for MtServerClient {
    async fn call(&self, payload: &Payload, _model: &str) -> Result<String, ProviderError> {
        let request = self.build_request(payload);
        debug!("POST {} ({} chars)", self.endpoint, request.text_input.chars().count());

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Self::parse_response(&body)
        } else {
            Err(ProviderError::from_status(status.as_u16(), truncate_body(&body)))
        }
    }
}
