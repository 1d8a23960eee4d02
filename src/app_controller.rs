use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::{Config, EnvSource, ProcessEnv, ProviderSettings, resolve_settings};
use crate::database::{CacheTableStats, SqliteCacheStore};
use crate::errors::ConfigError;
use crate::providers::{MockBackend, profiles};
use crate::translation::batch::{BatchSummary, Dispatcher, JobOutcome, JobReport};
use crate::translation::cache::{CacheStats, CacheStore, MemoryCacheStore};
use crate::translation::core::{Capabilities, Translator};
use crate::translation::glossary::Glossary;
use crate::translation::prompts::PromptTemplate;

// @module: Application controller wiring configuration to translators

/// Call-time values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Provider name
    pub provider: Option<String>,
    /// Candidate models, `;`-separated
    pub models: Option<String>,
    /// Source language code
    pub source_language: Option<String>,
    /// Target language code
    pub target_language: Option<String>,
    /// Prompt template file
    pub prompt_path: Option<PathBuf>,
    /// Glossary file
    pub glossary_path: Option<PathBuf>,
    /// Explicit provider settings
    pub settings: ProviderSettings,
}

/// One row of the provider listing
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderInfo {
    /// Profile name
    pub name: String,
    /// Whether a built-in client exists
    pub builtin_backend: bool,
    /// Capability metadata
    pub capabilities: Capabilities,
    /// Setting keys the profile declares
    pub settings: Vec<String>,
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Environment-style overrides
    env: Arc<dyn EnvSource>,
}

impl Controller {
    /// Create a controller for test purposes with default configuration
    pub fn new_for_test() -> Result<Self> {
        Self::with_config(Config::default())
    }

    // @method: Create a controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        Ok(Self {
            config,
            env: Arc::new(ProcessEnv),
        })
    }

    /// Replace the environment source
    pub fn with_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the cache configured in `cache`, if caching is enabled
    pub fn open_cache_store(&self) -> Result<Option<Arc<dyn CacheStore>>> {
        let cache = &self.config.cache;
        if !cache.enabled {
            return Ok(None);
        }

        let store: Arc<dyn CacheStore> = if cache.in_memory {
            Arc::new(MemoryCacheStore::new())
        } else {
            let store = match &cache.path {
                Some(path) => SqliteCacheStore::open(path)?,
                None => SqliteCacheStore::open_default()?,
            };
            Arc::new(store)
        };
        Ok(Some(store))
    }

    /// Build a translator from the configuration and call-time overrides
    pub fn build_translator(&self, overrides: &Overrides) -> Result<Translator> {
        self.build_translator_with_cache(overrides, self.open_cache_store()?)
    }

    /// Build a translator over an already opened cache store
    pub fn build_translator_with_cache(
        &self,
        overrides: &Overrides,
        cache: Option<Arc<dyn CacheStore>>,
    ) -> Result<Translator> {
        let provider = overrides.provider.as_deref().unwrap_or(&self.config.provider);
        let profile = profiles::lookup(provider)
            .ok_or_else(|| ConfigError::UnknownProvider(provider.to_string()))?;

        let settings = resolve_settings(
            &profile,
            self.config.provider_settings(&profile.name),
            self.env.as_ref(),
            &overrides.settings,
        )?;

        let source = overrides
            .source_language
            .as_deref()
            .unwrap_or(&self.config.source_language);
        let target = overrides
            .target_language
            .as_deref()
            .unwrap_or(&self.config.target_language);

        let mut builder = Translator::builder(profile.clone())
            .with_settings(settings)
            .with_languages(source, target)
            .with_retry_policy(self.config.retry.policy());

        if profile.name == profiles::MOCK_NAME {
            builder = builder.with_backend(Arc::new(MockBackend::working()));
        }

        if let Some(models) = overrides.models.as_ref().or(self.config.model.as_ref()) {
            builder = builder.with_models(models.clone());
        }

        let prompt_path = overrides
            .prompt_path
            .as_ref()
            .or(self.config.prompt_template_path.as_ref());
        if let Some(path) = prompt_path {
            let template = PromptTemplate::load(path)
                .with_context(|| format!("Failed to load prompt template {}", path.display()))?;
            builder = builder.with_template(template);
        }

        let glossary_path = overrides
            .glossary_path
            .as_ref()
            .or(self.config.glossary_path.as_ref());
        if let Some(path) = glossary_path {
            let glossary = Glossary::load(path)
                .with_context(|| format!("Failed to load glossary {}", path.display()))?;
            builder = builder.with_glossary(glossary);
        }

        if let Some(store) = cache {
            builder = builder.with_cache_store(store);
        }

        Ok(builder.build()?)
    }

    /// Translate each text in turn
    pub async fn translate_texts(
        &self,
        texts: &[String],
        overrides: &Overrides,
        ignore_cache: bool,
    ) -> Result<Vec<String>> {
        let translator = self.build_translator(overrides)?;
        let mut translations = Vec::with_capacity(texts.len());
        for text in texts {
            translations.push(translator.translate(text, ignore_cache).await?);
        }
        Ok(translations)
    }

    /// Translate every non-empty line of `input` concurrently, `rounds` times
    ///
    /// Later rounds exercise the cache unless `ignore_cache` is set.
    pub async fn run_batch(
        &self,
        input: &Path,
        overrides: &Overrides,
        concurrency: Option<usize>,
        rounds: usize,
        ignore_cache: bool,
    ) -> Result<Vec<(Vec<JobReport>, BatchSummary)>> {
        let content = std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read batch file {}", input.display()))?;
        let texts = read_fragments(&content);
        if texts.is_empty() {
            warn!("No text fragments found in {}", input.display());
            return Ok(Vec::new());
        }

        let translator = Arc::new(self.build_translator(overrides)?);
        let workers = concurrency
            .unwrap_or_else(|| self.config.effective_concurrency(translator.profile()))
            .max(1);

        info!(
            "mtgate: {} - {} ({} fragments, {} workers)",
            translator.profile().name,
            translator.candidates(),
            texts.len(),
            workers
        );

        let mut results = Vec::with_capacity(rounds.max(1));
        for round in 1..=rounds.max(1) {
            let progress_bar = ProgressBar::new(texts.len() as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} {eta}")
                .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            progress_bar.set_style(style.progress_chars("█▓▒░"));
            progress_bar.set_message(format!("round {}", round));

            let pb = progress_bar.clone();
            let dispatcher = Dispatcher::new(translator.clone(), workers)
                .with_ignore_cache(ignore_cache)
                .with_progress(move |completed, _total| pb.set_position(completed as u64));

            let start = Instant::now();
            let run = dispatcher.spawn(texts.clone());
            let canceller = run.canceller();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling pending fragments");
                    canceller.cancel_all();
                }
            });
            let (reports, summary) = run.wait().await;
            interrupt.abort();
            progress_bar.finish_and_clear();

            for report in reports.iter().filter(|r| !r.is_success()) {
                match &report.outcome {
                    JobOutcome::Failed(e) => warn!("Fragment {} failed: {}", report.index + 1, e),
                    JobOutcome::Cancelled => warn!("Fragment {} was cancelled", report.index + 1),
                    JobOutcome::Translated(_) => {}
                }
            }
            info!("Round {} finished in {}", round, Self::format_duration(start.elapsed()));
            results.push((reports, summary));
        }

        Ok(results)
    }

    /// Every profile this binary knows, with its capabilities
    pub fn list_providers() -> Vec<ProviderInfo> {
        profiles::all()
            .into_iter()
            .map(|profile| ProviderInfo {
                builtin_backend: profile.has_builtin_backend(),
                capabilities: Capabilities {
                    custom_prompt: profile.custom_prompt,
                    placeholder_style: profile.placeholder_style,
                    content_error_policy: profile.content_error_policy,
                    cache_exempt: profile.cache_exempt,
                },
                settings: profile.settings.iter().map(|s| s.key.clone()).collect(),
                name: profile.name,
            })
            .collect()
    }

    /// Check that the configured provider answers
    pub async fn test_connection(&self, overrides: &Overrides) -> Result<()> {
        let translator = self.build_translator_with_cache(overrides, None)?;
        translator
            .test_connection()
            .await
            .with_context(|| format!("Provider '{}' is unreachable", translator.profile().name))
    }

    /// Cache counters
    pub async fn cache_stats(&self) -> Result<Option<CacheStats>> {
        match self.open_cache_store()? {
            Some(store) => Ok(Some(store.stats().await?)),
            None => Ok(None),
        }
    }

    /// Table summary of the durable cache; `None` unless SQLite backs it
    pub async fn cache_table_stats(&self) -> Result<Option<CacheTableStats>> {
        let cache = &self.config.cache;
        if !cache.enabled || cache.in_memory {
            return Ok(None);
        }
        let store = match &cache.path {
            Some(path) => SqliteCacheStore::open(path)?,
            None => SqliteCacheStore::open_default()?,
        };
        Ok(Some(store.table_stats().await?))
    }

    /// Remove every cached translation
    pub async fn cache_clear(&self) -> Result<usize> {
        match self.open_cache_store()? {
            Some(store) => {
                let removed = store.len().await?;
                store.clear().await?;
                Ok(removed)
            }
            None => Ok(0),
        }
    }

    /// Drop durable cache entries older than `days` and compact the file
    pub async fn cache_prune(&self, days: u32) -> Result<Option<usize>> {
        let cache = &self.config.cache;
        if !cache.enabled || cache.in_memory {
            return Ok(None);
        }
        let store = match &cache.path {
            Some(path) => SqliteCacheStore::open(path)?,
            None => SqliteCacheStore::open_default()?,
        };
        let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(days));
        let removed = store.prune_older_than(cutoff).await?;
        if removed > 0 {
            let reclaimed = store.connection().compact().await?;
            info!("Reclaimed {} KB from the cache file", reclaimed / 1024);
        }
        Ok(Some(removed))
    }

    // Format duration in a human-readable format
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

/// Non-empty trimmed lines
pub fn read_fragments(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `provider` can run without a caller-supplied backend
pub fn has_builtin_backend(provider: &str) -> bool {
    profiles::lookup(provider).is_some_and(|p| p.has_builtin_backend() || p.name == profiles::MOCK_NAME)
}
