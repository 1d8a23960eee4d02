/*!
 * Response-sanity predicates.
 *
 * Each backend output is checked before it is accepted:
 * - `length`: runaway generation and empty output
 * - `markers`: placeholder marker integrity
 *
 * A failed check makes the attempt a candidate failure; it is never retried
 * against the same candidate.
 */

use std::fmt::Debug;
use std::sync::Arc;

use crate::translation::placeholder::PlaceholderStyle;

pub mod length;
pub mod markers;

pub use length::{LengthBound, LengthIssue, NonEmpty};
pub use markers::{MarkerIntegrity, PairIntegrity};

/// A rule rejecting implausible backend output
pub trait SanityCheck: Send + Sync + Debug {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// `Err` describes why `output` is not acceptable for `source`
    fn check(&self, source: &str, output: &str) -> Result<(), String>;
}

/// Ordered set of sanity checks; the first failure wins
#[derive(Debug, Clone, Default)]
pub struct ResponseValidator {
    checks: Vec<Arc<dyn SanityCheck>>,
}

impl ResponseValidator {
    /// Validator with no checks
    pub fn empty() -> Self {
        Self::default()
    }

    /// Default checks: non-empty output, the default length bound, and
    /// marker integrity for `style`
    pub fn standard(style: PlaceholderStyle) -> Self {
        Self::empty()
            .with_check(NonEmpty)
            .with_check(LengthBound::default())
            .with_check(MarkerIntegrity::new(style))
    }

    /// Append a check
    pub fn with_check<C: SanityCheck + 'static>(mut self, check: C) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    /// Replace the length bound, keeping every other check
    pub fn with_length_bound(mut self, bound: LengthBound) -> Self {
        self.checks.retain(|c| c.name() != "length_bound");
        self.checks.push(Arc::new(bound));
        self
    }

    /// Number of checks
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether there are no checks
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check in order
    pub fn validate(&self, source: &str, output: &str) -> Result<(), String> {
        for check in &self.checks {
            check
                .check(source, output)
                .map_err(|reason| format!("{}: {}", check.name(), reason))?;
        }
        Ok(())
    }
}
