/*!
 * Shared translation machinery used by every backend.
 *
 * - `core`: the translator contract and its builder
 * - `batch`: concurrent dispatch over a bounded worker pool
 * - `cache`: fingerprints and cache stores
 * - `retry`: candidate failover and transient retry
 * - `placeholder`: markers protecting formulas and rich-text runs
 * - `prompts`: payload construction and prompt templates
 * - `glossary`: fixed terminology
 * - `postprocess`: cleanup of raw backend output
 */

// Re-export main types for easier usage
pub use self::batch::{BatchRun, BatchSummary, Canceller, Dispatcher, JobOutcome, JobReport};
pub use self::cache::{CacheStats, CacheStore, Fingerprint, MemoryCacheStore, TranslationCache};
pub use self::core::{Capabilities, TranslationRequest, Translator, TranslatorBuilder};
pub use self::glossary::{Glossary, is_passthrough};
pub use self::placeholder::{PlaceholderCodec, PlaceholderStyle, ProtectedText};
pub use self::prompts::{Payload, PromptBuilder, PromptTemplate};
pub use self::retry::{CandidateChain, RetryPolicy};

// Submodules
pub mod batch;
pub mod cache;
pub mod core;
pub mod glossary;
pub mod placeholder;
pub mod postprocess;
pub mod prompts;
pub mod retry;
