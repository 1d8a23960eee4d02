/*!
 * Error types for the mtgate library.
 *
 * The taxonomy separates what a single backend attempt can fail with
 * (`ProviderError`), what is fatal at construction time (`ConfigError`), and
 * what the upstream `translate` contract is allowed to surface
 * (`TranslationError`). Transient and content errors are absorbed by the
 * retry/failover engine and only reach callers folded into
 * `TranslationError::ExhaustedCandidates`.
 */

use std::time::Duration;
use thiserror::Error;

/// Errors that a single backend call can produce
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when sending the request fails at the transport level
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails (malformed output)
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The attempt did not finish within the per-attempt timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The provider refused the content (policy or content filter)
    #[error("Content rejected by provider: {0}")]
    ContentRejected(String),
}

impl ProviderError {
    /// Whether retrying the same candidate may succeed.
    ///
    /// Transport failures, timeouts, rate limits and HTTP 400/408/429/5xx are
    /// transient. Authentication failures, malformed responses and content
    /// rejections are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_)
            | Self::ConnectionError(_)
            | Self::Timeout(_)
            | Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, .. } => {
                matches!(*status_code, 400 | 408 | 429) || (500..600).contains(status_code)
            }
            Self::ParseError(_) | Self::AuthenticationError(_) | Self::ContentRejected(_) => false,
        }
    }

    /// Map an HTTP status and body to the matching variant
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError {
                status_code,
                message,
            },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::RequestFailed(format!("timeout: {}", error))
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else if let Some(status) = error.status() {
            Self::from_status(status.as_u16(), error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Fatal errors raised while building a translator or loading configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// No backend profile is registered under this name
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// A required setting has no value in any configuration layer
    #[error("Missing required setting '{key}' for provider '{provider}'")]
    MissingSetting {
        /// Provider name
        provider: String,
        /// Setting key
        key: String,
    },

    /// A setting or option has an unusable value
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue {
        /// Setting or option name
        key: String,
        /// What is wrong with it
        message: String,
    },

    /// The profile has no built-in client; a backend must be supplied
    #[error("Provider '{0}' has no built-in backend; supply one explicitly")]
    NoBuiltinBackend(String),

    /// Reading a configuration, template or glossary file failed
    #[error("I/O error: {0}")]
    Io(String),

    /// A configuration, template or glossary file could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse(error.to_string())
    }
}

/// Errors surfaced by the translation contract
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// Every candidate model failed
    #[error("All candidates failed ({}): {last_error}", candidates.join(", "))]
    ExhaustedCandidates {
        /// Candidates in the order they were attempted
        candidates: Vec<String>,
        /// Description of the final failure
        last_error: String,
    },

    /// Glossary or placeholder integrity was violated
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Construction-time configuration problem
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A dispatcher worker ended abnormally
    #[error("Worker failed: {0}")]
    Worker(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
