/*!
 * Backends for tests that need more than `MockBackend` scripting
 *
 * `ConcurrencyGauge` tracks how many calls are in flight at once and fails
 * on request, so dispatcher tests can check the worker bound and per-item
 * isolation without any network.
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mtgate::errors::ProviderError;
use mtgate::providers::Backend;
use mtgate::translation::Payload;

/// Marker that makes `ConcurrencyGauge` fail a call
pub const POISON: &str = "poison";

/// Backend that measures concurrency
#[derive(Debug, Default, Clone)]
pub struct ConcurrencyGauge {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl ConcurrencyGauge {
    /// Gauge whose calls take `delay_ms`
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            ..Self::default()
        }
    }

    /// Most calls ever observed in flight together
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for ConcurrencyGauge {
    async fn call(&self, payload: &Payload, _model: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let text = payload.primary_text();
        if text.contains(POISON) {
            return Err(ProviderError::AuthenticationError(format!(
                "refusing '{}'",
                text
            )));
        }
        Ok(text.to_uppercase())
    }
}
