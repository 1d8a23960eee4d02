/*!
 * Placeholder marker validation for backend output.
 *
 * A marker that the source carried and the output lost, invented or
 * reordered makes the attempt invalid, so the engine can fall back to the
 * next candidate instead of returning corrupted text.
 */

use log::debug;

use crate::translation::placeholder::{PlaceholderCodec, PlaceholderPair, PlaceholderStyle};
use crate::validation::SanityCheck;

/// Markers of the source must survive in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerIntegrity {
    codec: PlaceholderCodec,
}

impl MarkerIntegrity {
    /// Create a validator for a marker family
    pub fn new(style: PlaceholderStyle) -> Self {
        Self {
            codec: PlaceholderCodec::new(style),
        }
    }

    /// Number of markers of this family in `text`
    pub fn count_markers(&self, text: &str) -> usize {
        self.codec.scan(text).len()
    }
}

impl SanityCheck for MarkerIntegrity {
    fn name(&self) -> &'static str {
        "marker_integrity"
    }

    fn check(&self, source: &str, output: &str) -> Result<(), String> {
        if self.count_markers(source) == 0 && self.count_markers(output) == 0 {
            return Ok(());
        }
        self.codec.verify(source, output).map_err(|error| {
            debug!("Marker integrity failed: {}", error);
            error
        })
    }
}

/// The pairs a request was protected with must each stay present once and
/// ordered left-before-right
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairIntegrity {
    codec: PlaceholderCodec,
    pairs: Vec<PlaceholderPair>,
}

impl PairIntegrity {
    /// Check for `pairs` produced by a codec of `style`
    pub fn new(style: PlaceholderStyle, pairs: Vec<PlaceholderPair>) -> Self {
        Self {
            codec: PlaceholderCodec::new(style),
            pairs,
        }
    }
}

impl SanityCheck for PairIntegrity {
    fn name(&self) -> &'static str {
        "pair_integrity"
    }

    fn check(&self, _source: &str, output: &str) -> Result<(), String> {
        self.codec.verify_pairs(output, &self.pairs).map_err(|error| {
            debug!("Pair integrity failed: {}", error);
            error
        })
    }
}
