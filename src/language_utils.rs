//! Language utilities for backend-specific language codes
//!
//! Every backend speaks its own dialect of language codes ("zh-CN" for one,
//! "zh-Hans" for another). Callers use generic codes; a `LanguageMap`
//! resolves them once, when a translator is constructed.

use isolang::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Code that asks the backend to detect the source language
pub const AUTO_LANGUAGE: &str = "auto";

/// Mapping from generic language codes to a backend's own codes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageMap {
    entries: HashMap<String, String>,
}

impl LanguageMap {
    /// Create an empty map (every code passes through unchanged)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(generic, backend)` pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(from, to)| (from.to_lowercase(), to.to_string()))
            .collect();
        Self { entries }
    }

    /// Resolve a generic code; lookup is case-insensitive and unmapped codes pass through
    pub fn resolve(&self, code: &str) -> String {
        self.entries
            .get(&code.trim().to_lowercase())
            .cloned()
            .unwrap_or_else(|| code.trim().to_string())
    }

    /// Number of mapped codes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Source/target pair after backend-specific resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguagePair {
    /// Resolved source language code (may be "auto")
    pub source: String,
    /// Resolved target language code
    pub target: String,
}

impl LanguagePair {
    /// Resolve both codes through a backend's map
    pub fn resolve(map: &LanguageMap, source: &str, target: &str) -> Self {
        Self {
            source: map.resolve(source),
            target: map.resolve(target),
        }
    }

    /// Whether the source language is left to the backend to detect
    pub fn is_auto_source(&self) -> bool {
        is_auto(&self.source)
    }
}

/// Whether a code is the auto-detect marker
pub fn is_auto(code: &str) -> bool {
    code.trim().eq_ignore_ascii_case(AUTO_LANGUAGE)
}

/// Map ISO 639-2/B codes to ISO 639-2/T
fn part2b_to_part2t(code: &str) -> &str {
    match code {
        "fre" => "fra",
        "ger" => "deu",
        "dut" => "nld",
        "gre" => "ell",
        "chi" => "zho",
        "cze" => "ces",
        "ice" => "isl",
        "per" => "fas",
        "rum" => "ron",
        "slo" => "slk",
        other => other,
    }
}

/// Human-readable English name for a language code, used in prompts.
///
/// Handles region and script subtags ("zh-TW", "zh-Hans", "pt_BR"). Unknown
/// codes come back unchanged so prompts stay usable with exotic backends.
pub fn language_name(code: &str) -> String {
    let trimmed = code.trim();
    let lower = trimmed.to_lowercase().replace('_', "-");

    match lower.as_str() {
        "zh-tw" | "zh-hant" | "zh-hk" | "zt" => return "Traditional Chinese".to_string(),
        "zh" | "zh-cn" | "zh-hans" => return "Simplified Chinese".to_string(),
        _ => {}
    }

    let primary = lower.split('-').next().unwrap_or_default();
    let language = match primary.len() {
        2 => Language::from_639_1(primary),
        3 => Language::from_639_3(part2b_to_part2t(primary)),
        _ => None,
    };

    match language {
        Some(lang) => lang.to_name().to_string(),
        None => trimmed.to_string(),
    }
}
