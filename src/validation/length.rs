/*!
 * Length predicates for backend output.
 *
 * This module rejects implausible output sizes:
 * - Runaway or repeating generation (too long for its input)
 * - Empty output for a non-empty input
 */

use log::debug;

use crate::validation::SanityCheck;

/// Default absolute floor of the length bound, in characters
pub const DEFAULT_LENGTH_FLOOR: usize = 2000;

/// Default multiple of the input length
pub const DEFAULT_LENGTH_FACTOR: usize = 5;

/// Types of length issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LengthIssue {
    /// Output is empty for a non-empty input
    EmptyTranslation,
    /// Output exceeds the allowed maximum
    TranslationTooLong {
        /// Allowed maximum in characters
        max_len: usize,
        /// Input length in characters
        source_len: usize,
        /// Output length in characters
        translated_len: usize,
    },
}

impl std::fmt::Display for LengthIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LengthIssue::EmptyTranslation => write!(f, "Translation is empty"),
            LengthIssue::TranslationTooLong {
                max_len,
                source_len,
                translated_len,
            } => write!(
                f,
                "Translation too long: {} chars exceeds {} allowed for {} input chars",
                translated_len, max_len, source_len
            ),
        }
    }
}

/// Output must not exceed `max(floor, factor × input length)` characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthBound {
    /// Absolute floor of the bound
    pub floor: usize,
    /// Multiple of the input length
    pub factor: usize,
}

impl Default for LengthBound {
    fn default() -> Self {
        Self {
            floor: DEFAULT_LENGTH_FLOOR,
            factor: DEFAULT_LENGTH_FACTOR,
        }
    }
}

impl LengthBound {
    /// Create a bound
    pub fn new(floor: usize, factor: usize) -> Self {
        Self { floor, factor }
    }

    /// Largest acceptable output for an input of `source_len` characters
    pub fn max_len(&self, source_len: usize) -> usize {
        self.floor.max(self.factor.saturating_mul(source_len))
    }

    /// Check one output
    pub fn validate(&self, source: &str, output: &str) -> Result<(), LengthIssue> {
        let source_len = source.chars().count();
        let translated_len = output.chars().count();
        let max_len = self.max_len(source_len);

        if translated_len > max_len {
            debug!(
                "Rejecting output of {} chars (limit {}, input {} chars)",
                translated_len, max_len, source_len
            );
            return Err(LengthIssue::TranslationTooLong {
                max_len,
                source_len,
                translated_len,
            });
        }
        Ok(())
    }
}

impl SanityCheck for LengthBound {
    fn name(&self) -> &'static str {
        "length_bound"
    }

    fn check(&self, source: &str, output: &str) -> Result<(), String> {
        self.validate(source, output).map_err(|issue| issue.to_string())
    }
}

/// Output must not be empty unless the input is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonEmpty;

impl SanityCheck for NonEmpty {
    fn name(&self) -> &'static str {
        "non_empty"
    }

    fn check(&self, source: &str, output: &str) -> Result<(), String> {
        if output.trim().is_empty() && !source.trim().is_empty() {
            return Err(LengthIssue::EmptyTranslation.to_string());
        }
        Ok(())
    }
}
