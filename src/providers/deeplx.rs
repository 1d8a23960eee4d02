/*!
 * Client for DeepLX-compatible endpoints.
 */

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{Backend, truncate_body};
use crate::translation::prompts::Payload;

/// Translate request
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DeepLXRequest {
    /// Source language code
    pub source_lang: String,
    /// Target language code
    pub target_lang: String,
    /// Text to translate
    pub text: String,
}

/// Translate response
#[derive(Debug, Deserialize)]
pub struct DeepLXResponse {
    /// Translated text
    pub data: Option<String>,
}

/// DeepLX client
#[derive(Debug, Clone)]
pub struct DeepLXClient {
    /// Endpoint URL
    endpoint: String,
    /// Optional access token, sent as `?token=`
    access_token: Option<String>,
    /// HTTP client
    client: Client,
}

impl DeepLXClient {
    /// Create a new client
    pub fn new(endpoint: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_token: access_token.filter(|t| !t.trim().is_empty()),
            client: Client::new(),
        }
    }

    /// Build the request body for one call
    pub fn build_request(payload: &Payload) -> DeepLXRequest {
        match payload {
            Payload::Text {
                text,
                source_language,
                target_language,
            } => DeepLXRequest {
                source_lang: source_language.clone(),
                target_lang: target_language.clone(),
                text: text.clone(),
            },
            Payload::Chat(_) => DeepLXRequest {
                source_lang: "auto".to_string(),
                target_lang: "EN".to_string(),
                text: payload.primary_text().to_string(),
            },
        }
    }

    /// Extract the translation from a response body
    pub fn parse_response(body: &str) -> Result<String, ProviderError> {
        let response: DeepLXResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", e, truncate_body(body))))?;
        response
            .data
            .ok_or_else(|| ProviderError::ParseError("Response has no data field".to_string()))
    }
}

#[async_trait]
impl Backend for DeepLXClient {
    async fn call(&self, payload: &Payload, _model: &str) -> Result<String, ProviderError> {
        let request = Self::build_request(payload);
        debug!("POST {}", self.endpoint);

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = &self.access_token {
            builder = builder.query(&[("token", token)]);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Self::parse_response(&body)
        } else {
            Err(ProviderError::from_status(status.as_u16(), truncate_body(&body)))
        }
    }
}
