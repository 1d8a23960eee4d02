/*!
 * Common test utilities for the mtgate test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use mtgate::providers::{Backend, BackendProfile, profiles};
use mtgate::translation::{RetryPolicy, Translator, TranslatorBuilder};

// Re-export the mock providers module
pub mod mock_providers;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Retry policy that never sleeps
pub fn fast_policy(retry_ceiling: u32) -> RetryPolicy {
    RetryPolicy {
        retry_ceiling,
        backoff: Duration::ZERO,
        attempt_timeout: Duration::from_secs(5),
    }
}

/// Builder over the mock profile with the given backend and candidate chain
pub fn mock_builder(backend: Arc<dyn Backend>, models: &str) -> TranslatorBuilder {
    builder_for(profiles::mock(), backend, models)
}

/// Builder over any profile with the given backend and candidate chain
pub fn builder_for(profile: BackendProfile, backend: Arc<dyn Backend>, models: &str) -> TranslatorBuilder {
    Translator::builder(profile)
        .with_backend(backend)
        .with_models(models)
        .with_languages("en", "fr")
        .with_retry_policy(fast_policy(2))
}

/// Initialise `env_logger` once; repeated calls are ignored
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
