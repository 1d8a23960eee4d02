/*!
 * # mtgate - provider-agnostic machine translation core
 *
 * Turns a fragment of source text into target text through any of a number
 * of interchangeable backends, guaranteeing along the way:
 *
 * - deterministic caching keyed by a content fingerprint
 * - retry and failover across an ordered chain of candidate models
 * - protection of formulas and rich-text runs behind placeholder markers
 * - glossary substitution ahead of the backend
 * - bounded concurrent dispatch with per-item isolation
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration document and settings resolution
 * - `translation`: The translator and its machinery:
 *   - `translation::core`: Translator contract and builder
 *   - `translation::batch`: Concurrent dispatcher
 *   - `translation::cache`: Fingerprints and cache stores
 *   - `translation::retry`: Retry/failover engine
 *   - `translation::placeholder`: Placeholder codec
 *   - `translation::prompts`: Prompt builder and templates
 *   - `translation::glossary`: Glossary matcher
 * - `providers`: Backend interface, profiles and built-in clients
 * - `validation`: Response-sanity predicates
 * - `database`: SQLite cache store
 * - `app_controller`: Wiring from configuration to translators
 * - `language_utils`: Language code mapping
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod errors;
pub mod language_utils;
pub mod providers;
pub mod translation;
pub mod validation;

// Re-export main types for easier usage
pub use app_config::{Config, EnvSource, MapEnv, ProcessEnv, ProviderSettings};
pub use database::SqliteCacheStore;
pub use errors::{AppError, ConfigError, ProviderError, TranslationError};
pub use language_utils::{LanguageMap, LanguagePair};
pub use providers::{Backend, BackendProfile, IRREPARABLE_TRANSLATION, MockBackend};
pub use translation::{
    BatchSummary, CandidateChain, Dispatcher, Glossary, PlaceholderCodec, RetryPolicy,
    TranslationCache, Translator,
};
