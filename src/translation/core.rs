/*!
 * Translator contract.
 *
 * A `Translator` binds one backend profile to a backend client, a candidate
 * chain and a resolved language pair. Each `translate` call walks a fixed
 * sequence, stopping at the first branch that produces text:
 *
 * 1. numeric or symbol-only input is returned unchanged;
 * 2. a glossary exact match is returned without touching cache or backend;
 * 3. a cache hit is returned (skipped when bypassed or cache-exempt);
 * 4. the prompt is built and dispatched through the retry/failover engine;
 * 5. a normal result is cached (same skip rule) and returned.
 */

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::app_config::ProviderSettings;
use crate::errors::{ConfigError, ProviderError, TranslationError};
use crate::language_utils::LanguagePair;
use crate::providers::{self, Backend, BackendProfile, ContentErrorPolicy, IRREPARABLE_TRANSLATION};
use crate::translation::cache::{CacheStore, Fingerprint, TranslationCache};
use crate::translation::glossary::{Glossary, is_passthrough};
use crate::translation::placeholder::{PlaceholderCodec, PlaceholderStyle, ProtectedText};
use crate::translation::prompts::{PromptBuilder, PromptTemplate};
use crate::translation::retry::{CandidateChain, EngineOutcome, RetryEngine, RetryPolicy};
use crate::validation::{PairIntegrity, ResponseValidator};

/// Cache-impacting parameter carrying the candidate chain
const MODEL_PARAM: &str = "model";

/// What upstream formatting code needs to know about a translator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Accepts a caller-supplied prompt template
    pub custom_prompt: bool,
    /// Marker form the backend preserves
    pub placeholder_style: PlaceholderStyle,
    /// What a content refusal becomes
    pub content_error_policy: ContentErrorPolicy,
    /// Every call bypasses the cache
    pub cache_exempt: bool,
}

/// Everything that identifies one translation for caching
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    /// Text sent to the backend, after glossary substitution
    pub text: String,
    /// Resolved source language code
    pub source_language: String,
    /// Resolved target language code
    pub target_language: String,
    /// Provider name
    pub provider: String,
    /// Candidate models
    pub candidates: CandidateChain,
    /// Cache-impacting parameters, the candidate chain included
    pub cache_params: BTreeMap<String, Value>,
}

impl TranslationRequest {
    /// Cache key for this request
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(
            &self.provider,
            &self.cache_params,
            &self.source_language,
            &self.target_language,
            &self.text,
        )
    }
}

/// One provider bound to a language pair
#[derive(Debug)]
pub struct Translator {
    profile: BackendProfile,
    backend: Arc<dyn Backend>,
    chain: CandidateChain,
    languages: LanguagePair,
    cache_params: BTreeMap<String, Value>,
    prompt_builder: PromptBuilder,
    template: Option<PromptTemplate>,
    glossary: Glossary,
    cache: Option<TranslationCache>,
    engine: RetryEngine,
    cache_exempt: bool,
}

impl Translator {
    /// Start building a translator for `profile`
    pub fn builder(profile: BackendProfile) -> TranslatorBuilder {
        TranslatorBuilder::new(profile)
    }

    /// Translate `text`.
    ///
    /// Fails only with `ExhaustedCandidates` once every candidate has failed;
    /// transient errors are absorbed by the engine. With `ignore_cache` the
    /// store is neither read nor written for this call.
    pub async fn translate(&self, text: &str, ignore_cache: bool) -> Result<String, TranslationError> {
        self.translate_checked(text, ignore_cache, &ResponseValidator::empty())
            .await
    }

    /// `translate` with request-specific checks. A cached entry failing them
    /// is treated as a miss and replaced; a candidate output failing them is
    /// a candidate failure.
    async fn translate_checked(
        &self,
        text: &str,
        ignore_cache: bool,
        extra: &ResponseValidator,
    ) -> Result<String, TranslationError> {
        if is_passthrough(text) {
            debug!("Passing through untranslatable input");
            return Ok(text.to_string());
        }

        let (text, exact) = self.glossary.apply(text);
        if exact {
            debug!("Glossary exact match, skipping backend");
            return Ok(text);
        }

        let bypass = ignore_cache || self.cache_exempt;
        let fingerprint = self.request(&text).fingerprint();

        if !bypass {
            if let Some(cache) = &self.cache {
                if let Some(hit) = cache.get(&fingerprint).await {
                    match extra.validate(&text, &hit) {
                        Ok(()) => return Ok(hit),
                        Err(reason) => warn!("Discarding invalid cache entry: {}", reason),
                    }
                }
            }
        }

        let payload = self
            .prompt_builder
            .build(&text, &self.languages, self.template.as_ref());

        let outcome = self
            .engine
            .run_checked(self.backend.as_ref(), &self.chain, &payload, &text, extra)
            .await?;
        match outcome {
            EngineOutcome::Translated { text: translated, model } => {
                debug!("Translated by '{}' via '{}'", self.profile.name, model);
                if !bypass {
                    if let Some(cache) = &self.cache {
                        cache.set(&fingerprint, &translated).await;
                    }
                }
                Ok(translated)
            }
            EngineOutcome::Irreparable { model } => {
                warn!("'{}' ({}) returned the irreparable sentinel", self.profile.name, model);
                Ok(IRREPARABLE_TRANSLATION.to_string())
            }
        }
    }

    /// Translate, echoing the glossary-rewritten source when the translation
    /// fails
    pub async fn translate_or_source(&self, text: &str, ignore_cache: bool) -> String {
        match self.translate(text, ignore_cache).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!("Falling back to source text: {}", e);
                self.glossary.apply(text).0
            }
        }
    }

    /// Translate text carrying placeholder markers and restore the protected
    /// spans in the result
    pub async fn translate_protected(
        &self,
        protected: &ProtectedText,
        ignore_cache: bool,
    ) -> Result<String, TranslationError> {
        let mut pair_check = ResponseValidator::empty();
        if !protected.pairs.is_empty() {
            pair_check = pair_check.with_check(PairIntegrity::new(
                self.profile.placeholder_style,
                protected.pairs.clone(),
            ));
        }
        let translated = self
            .translate_checked(&protected.text, ignore_cache, &pair_check)
            .await?;
        if translated == IRREPARABLE_TRANSLATION {
            return Ok(translated);
        }
        self.codec().restore(&translated, protected)
    }

    /// The request `text` would be cached under, after glossary substitution
    pub fn request(&self, text: &str) -> TranslationRequest {
        TranslationRequest {
            text: text.to_string(),
            source_language: self.languages.source.clone(),
            target_language: self.languages.target.clone(),
            provider: self.profile.name.clone(),
            candidates: self.chain.clone(),
            cache_params: self.cache_params.clone(),
        }
    }

    /// Capability metadata
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            custom_prompt: self.profile.custom_prompt,
            placeholder_style: self.profile.placeholder_style,
            content_error_policy: self.profile.content_error_policy,
            cache_exempt: self.cache_exempt,
        }
    }

    /// Placeholder codec matching this backend
    pub fn codec(&self) -> PlaceholderCodec {
        PlaceholderCodec::new(self.profile.placeholder_style)
    }

    /// Bound profile
    pub fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    /// Resolved language pair
    pub fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    /// Candidate models
    pub fn candidates(&self) -> &CandidateChain {
        &self.chain
    }

    /// Retry bounds
    pub fn retry_policy(&self) -> &RetryPolicy {
        self.engine.policy()
    }

    /// Cache in use, if any
    pub fn cache(&self) -> Option<&TranslationCache> {
        self.cache.as_ref()
    }

    /// Check that the backend answers
    pub async fn test_connection(&self) -> Result<(), ProviderError> {
        self.backend.test_connection().await
    }
}

/// Builder for `Translator`
#[derive(Debug)]
pub struct TranslatorBuilder {
    profile: BackendProfile,
    backend: Option<Arc<dyn Backend>>,
    settings: ProviderSettings,
    models: Option<String>,
    source_language: String,
    target_language: String,
    policy: RetryPolicy,
    template: Option<PromptTemplate>,
    glossary: Glossary,
    cache: Option<TranslationCache>,
    validator: Option<ResponseValidator>,
}

impl TranslatorBuilder {
    /// New builder with an `en` to `zh` pair and the default policy
    pub fn new(profile: BackendProfile) -> Self {
        Self {
            profile,
            backend: None,
            settings: ProviderSettings::new(),
            models: None,
            source_language: "en".to_string(),
            target_language: "zh".to_string(),
            policy: RetryPolicy::default(),
            template: None,
            glossary: Glossary::empty(),
            cache: None,
            validator: None,
        }
    }

    /// Use this backend instead of the profile's built-in client
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Resolved provider settings
    pub fn with_settings(mut self, settings: ProviderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Candidate models, `;`-separated; overrides the model setting
    pub fn with_models(mut self, models: impl Into<String>) -> Self {
        self.models = Some(models.into());
        self
    }

    /// Generic language codes; resolved through the profile's map
    pub fn with_languages(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_language = source.into();
        self.target_language = target.into();
        self
    }

    /// Retry bounds
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Prompt template override
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Glossary
    pub fn with_glossary(mut self, glossary: Glossary) -> Self {
        self.glossary = glossary;
        self
    }

    /// Cache backed by `store`
    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(TranslationCache::new(store));
        self
    }

    /// Prepared cache
    pub fn with_cache(mut self, cache: TranslationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sanity checks; the profile's standard set when unset
    pub fn with_validator(mut self, validator: ResponseValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Build the translator.
    ///
    /// Fails with a `ConfigError` when no model can be determined or the
    /// profile's built-in client cannot be constructed.
    pub fn build(self) -> Result<Translator, ConfigError> {
        let profile = self.profile;

        let models = match self.models.filter(|m| !m.trim().is_empty()) {
            Some(models) => models,
            None => match &profile.model_key {
                Some(key) => self
                    .settings
                    .get(key)
                    .map(str::to_string)
                    .or_else(|| profile.default_model.clone())
                    .ok_or_else(|| ConfigError::MissingSetting {
                        provider: profile.name.clone(),
                        key: key.clone(),
                    })?,
                None => profile.default_model.clone().unwrap_or_else(|| profile.name.clone()),
            },
        };
        let chain = CandidateChain::parse(&models)?;

        let backend = match self.backend {
            Some(backend) => backend,
            None => providers::create_backend(&profile, &self.settings)?,
        };

        let languages = LanguagePair::resolve(&profile.lang_map, &self.source_language, &self.target_language);

        let mut cache_params = profile.cache_params.clone();
        cache_params.insert(MODEL_PARAM.to_string(), Value::String(chain.to_string()));

        let template = match self.template {
            Some(_) if !profile.custom_prompt => {
                warn!(
                    "Provider '{}' does not accept custom prompts; ignoring template",
                    profile.name
                );
                None
            }
            template => template,
        };

        let cache_exempt = profile.cache_exempt
            || profile
                .cache_exempt_key
                .as_ref()
                .is_some_and(|key| self.settings.flag(key));

        let validator = self
            .validator
            .unwrap_or_else(|| ResponseValidator::standard(profile.placeholder_style));
        let engine = RetryEngine::new(
            self.policy,
            validator,
            profile.postprocess.clone(),
            profile.content_error_policy,
        );
        let prompt_builder = PromptBuilder::new(profile.payload_shape, profile.prompt_style, profile.placeholder_style);

        info!(
            "Translator ready: provider={}, models={}, {} -> {}",
            profile.name, chain, languages.source, languages.target
        );

        Ok(Translator {
            profile,
            backend,
            chain,
            languages,
            cache_params,
            prompt_builder,
            template,
            glossary: self.glossary,
            cache: self.cache,
            engine,
            cache_exempt,
        })
    }
}
