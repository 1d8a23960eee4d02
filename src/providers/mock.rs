/*!
 * Mock backend for testing and dry runs.
 *
 * This module provides a scripted backend that simulates different behaviors:
 * - `MockBackend::identity()` - Echoes the payload text back
 * - `MockBackend::working()` - Always succeeds with a marked-up translation
 * - `MockBackend::failing()` - Always fails with a transient server error
 *
 * Behaviours can be scripted per model, and every call is recorded so tests
 * can assert exactly which candidates were tried and in what order.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::Backend;
use crate::translation::prompts::Payload;

/// Behavior mode for the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Returns the payload text unchanged
    Identity,
    /// Returns `[TRANSLATED] <text>`
    Working,
    /// Returns a fixed response
    Respond(String),
    /// Fails every Nth call with HTTP 503, otherwise behaves like `Working`
    Intermittent { fail_every: usize },
    /// Always fails with HTTP 500
    Failing,
    /// Returns an empty response
    Empty,
    /// Sleeps before answering like `Working`
    Slow { delay_ms: u64 },
    /// Returns `len` characters of filler
    Oversized { len: usize },
    /// The provider refuses the content
    ContentRejected,
    /// Rejects the credentials
    Unauthorized,
    /// Returns a response that cannot be parsed
    Malformed,
}

/// Text transformation applied by `Identity` and `Working`
pub type MockTransform = fn(&str) -> String;

/// Mock backend for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockBackend {
    /// Behavior when no per-model override matches
    behavior: MockBehavior,
    /// Per-model overrides
    model_behaviors: HashMap<String, MockBehavior>,
    /// Call counter shared by clones
    request_count: Arc<AtomicUsize>,
    /// Models called, in order, shared by clones
    call_log: Arc<Mutex<Vec<String>>>,
    /// Optional output transformation
    transform: Option<MockTransform>,
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            model_behaviors: HashMap::new(),
            request_count: Arc::new(AtomicUsize::new(0)),
            call_log: Arc::new(Mutex::new(Vec::new())),
            transform: None,
        }
    }

    /// Create a backend that echoes its input
    pub fn identity() -> Self {
        Self::new(MockBehavior::Identity)
    }

    /// Create a working mock backend that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a failing mock backend that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create an intermittently failing mock backend
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a backend that answers after a delay
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Override the behavior for one model
    pub fn with_model_behavior(mut self, model: &str, behavior: MockBehavior) -> Self {
        self.model_behaviors.insert(model.to_string(), behavior);
        self
    }

    /// Set a custom output transformation
    pub fn with_transform(mut self, transform: MockTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Models called so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.call_log.lock().clone()
    }

    /// Number of calls so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Forget recorded calls
    pub fn reset(&self) {
        self.call_log.lock().clear();
        self.request_count.store(0, Ordering::SeqCst);
    }

    fn behavior_for(&self, model: &str) -> &MockBehavior {
        self.model_behaviors.get(model).unwrap_or(&self.behavior)
    }

    fn translate(&self, text: &str, prefix: &str) -> String {
        match self.transform {
            Some(transform) => transform(text),
            None => format!("{}{}", prefix, text),
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn call(&self, payload: &Payload, model: &str) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.call_log.lock().push(model.to_string());
        let text = payload.primary_text();

        match self.behavior_for(model) {
            MockBehavior::Identity => Ok(self.translate(text, "")),

            MockBehavior::Working => Ok(self.translate(text, "[TRANSLATED] ")),

            MockBehavior::Respond(response) => Ok(response.clone()),

            MockBehavior::Intermittent { fail_every } => {
                let fail_every = (*fail_every).max(1);
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(self.translate(text, "[TRANSLATED] "))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Empty => Ok(String::new()),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(*delay_ms)).await;
                Ok(self.translate(text, "[TRANSLATED] "))
            }

            MockBehavior::Oversized { len } => Ok("x".repeat(*len)),

            MockBehavior::ContentRejected => Err(ProviderError::ContentRejected(
                "Simulated content policy rejection".to_string(),
            )),

            MockBehavior::Unauthorized => Err(ProviderError::AuthenticationError(
                "Simulated invalid API key".to_string(),
            )),

            MockBehavior::Malformed => Err(ProviderError::ParseError(
                "Simulated malformed response".to_string(),
            )),
        }
    }
}
