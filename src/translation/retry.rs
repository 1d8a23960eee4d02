/*!
 * Retry and failover engine.
 *
 * Two independent layers wrap a backend call:
 * - candidate failover: an ordered list of models (`"modelA;modelB"`) is
 *   tried breadth-first, moving on after any failure of a candidate;
 * - transient retry: within one candidate, transport-level failures are
 *   retried up to a fixed ceiling with a fixed backoff.
 *
 * The loop is driven by an explicit `RetryState` so both termination rules
 * can be tested without a backend.
 */

use log::{debug, error, warn};
use std::fmt;
use std::time::Duration;

use crate::errors::{ConfigError, ProviderError, TranslationError};
use crate::providers::{Backend, ContentErrorPolicy};
use crate::translation::postprocess::PostProcess;
use crate::translation::prompts::Payload;
use crate::validation::ResponseValidator;

/// Bounds for the transient-retry layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per candidate, including the first
    pub retry_ceiling: u32,
    /// Fixed delay between attempts on the same candidate
    pub backoff: Duration,
    /// Timeout of a single backend call
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_ceiling: 3,
            backoff: Duration::from_millis(1000),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Worst-case wall-clock time of one translation over `candidates` models:
    /// `candidates × retry_ceiling × (attempt_timeout + backoff)`.
    ///
    /// Batch callers should size their workloads against this bound.
    pub fn worst_case(&self, candidates: usize) -> Duration {
        let attempts = (candidates as u32).saturating_mul(self.retry_ceiling.max(1));
        (self.attempt_timeout + self.backoff).saturating_mul(attempts)
    }
}

/// Ordered candidate models
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateChain {
    models: Vec<String>,
}

impl CandidateChain {
    /// Parse a `;`-separated model list. Blank entries are dropped.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let models: Vec<String> = spec
            .split(';')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
        Self::from_models(models)
    }

    /// Build from an explicit list
    pub fn from_models(models: Vec<String>) -> Result<Self, ConfigError> {
        if models.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "model".to_string(),
                message: "no candidate model given".to_string(),
            });
        }
        Ok(Self { models })
    }

    /// Candidates in attempt order
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Always false; a chain has at least one candidate
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl fmt::Display for CandidateChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.models.join(";"))
    }
}

/// Position in the two-layer retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Index of the current candidate
    pub candidate: usize,
    /// Attempts already made on the current candidate
    pub attempt: u32,
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Back off, then call the same candidate again
    RetrySame(RetryState),
    /// Move to the next candidate
    NextCandidate(RetryState),
    /// Every candidate has failed
    Exhausted,
}

impl RetryState {
    /// First attempt on the first candidate
    pub fn start() -> Self {
        Self {
            candidate: 0,
            attempt: 0,
        }
    }

    /// Transition after a failed attempt.
    ///
    /// Transient failures retry the same candidate until `retry_ceiling`
    /// attempts have been made; any other failure moves on immediately.
    pub fn on_failure(self, transient: bool, policy: &RetryPolicy, candidates: usize) -> Transition {
        let attempts_made = self.attempt + 1;
        if transient && attempts_made < policy.retry_ceiling {
            return Transition::RetrySame(Self {
                candidate: self.candidate,
                attempt: attempts_made,
            });
        }
        if self.candidate + 1 < candidates {
            Transition::NextCandidate(Self {
                candidate: self.candidate + 1,
                attempt: 0,
            })
        } else {
            Transition::Exhausted
        }
    }
}

/// Successful engine result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    /// Output that passed post-processing and every sanity check
    Translated {
        /// Cleaned translation
        text: String,
        /// Candidate that produced it
        model: String,
    },
    /// A sentinel-policy backend rejected the content
    Irreparable {
        /// Candidate that rejected it
        model: String,
    },
}

/// One failed attempt, classified
#[derive(Debug)]
struct AttemptFailure {
    transient: bool,
    reason: String,
}

impl AttemptFailure {
    fn from_provider(error: &ProviderError) -> Self {
        Self {
            transient: error.is_transient(),
            reason: error.to_string(),
        }
    }

    fn invalid_output(reason: String) -> Self {
        Self {
            transient: false,
            reason: format!("invalid output: {}", reason),
        }
    }
}

/// Wraps backend calls with failover, transient retry, post-processing and
/// sanity checks
#[derive(Debug, Clone)]
pub struct RetryEngine {
    policy: RetryPolicy,
    validator: ResponseValidator,
    postprocess: PostProcess,
    content_policy: ContentErrorPolicy,
}

impl RetryEngine {
    /// Create an engine
    pub fn new(
        policy: RetryPolicy,
        validator: ResponseValidator,
        postprocess: PostProcess,
        content_policy: ContentErrorPolicy,
    ) -> Self {
        Self {
            policy,
            validator,
            postprocess,
            content_policy,
        }
    }

    /// Transient-retry bounds
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `payload` through the candidates until one produces valid output.
    ///
    /// `source` is the text the payload was built from; the sanity checks
    /// compare against it.
    pub async fn run(
        &self,
        backend: &dyn Backend,
        chain: &CandidateChain,
        payload: &Payload,
        source: &str,
    ) -> Result<EngineOutcome, TranslationError> {
        self.run_checked(backend, chain, payload, source, &ResponseValidator::empty())
            .await
    }

    /// Like `run`, with `extra` checks for this request applied after the
    /// engine's own
    pub async fn run_checked(
        &self,
        backend: &dyn Backend,
        chain: &CandidateChain,
        payload: &Payload,
        source: &str,
        extra: &ResponseValidator,
    ) -> Result<EngineOutcome, TranslationError> {
        let models = chain.models();
        let mut state = RetryState::start();
        let mut attempted: Vec<String> = Vec::with_capacity(models.len());

        loop {
            let model = &models[state.candidate];
            if state.attempt == 0 {
                attempted.push(model.clone());
            }
            debug!(
                "Calling candidate '{}' (attempt {}/{})",
                model,
                state.attempt + 1,
                self.policy.retry_ceiling
            );

            let failure = match tokio::time::timeout(self.policy.attempt_timeout, backend.call(payload, model)).await {
                Err(_) => AttemptFailure::from_provider(&ProviderError::Timeout(self.policy.attempt_timeout)),
                Ok(Err(ProviderError::ContentRejected(message)))
                    if self.content_policy == ContentErrorPolicy::Sentinel =>
                {
                    warn!("Candidate '{}' rejected the content: {}", model, message);
                    return Ok(EngineOutcome::Irreparable { model: model.clone() });
                }
                Ok(Err(e)) => AttemptFailure::from_provider(&e),
                Ok(Ok(raw)) => match self.accept(source, &raw, extra) {
                    Ok(text) => {
                        return Ok(EngineOutcome::Translated {
                            text,
                            model: model.clone(),
                        });
                    }
                    Err(reason) => AttemptFailure::invalid_output(reason),
                },
            };

            warn!(
                "Candidate '{}' attempt {} failed: {}",
                model,
                state.attempt + 1,
                failure.reason
            );
            let last_error = failure.reason;

            match state.on_failure(failure.transient, &self.policy, models.len()) {
                Transition::RetrySame(next) => {
                    if !self.policy.backoff.is_zero() {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                    state = next;
                }
                Transition::NextCandidate(next) => {
                    warn!(
                        "Falling back from '{}' to '{}'",
                        model, models[next.candidate]
                    );
                    state = next;
                }
                Transition::Exhausted => {
                    error!(
                        "All candidates failed ({}): {}",
                        attempted.join(", "),
                        last_error
                    );
                    return Err(TranslationError::ExhaustedCandidates {
                        candidates: attempted,
                        last_error,
                    });
                }
            }
        }
    }

    /// Post-process and validate one raw response
    fn accept(&self, source: &str, raw: &str, extra: &ResponseValidator) -> Result<String, String> {
        let text = self.postprocess.apply(source, raw)?;
        self.validator.validate(source, &text)?;
        extra.validate(source, &text)?;
        Ok(text)
    }
}
