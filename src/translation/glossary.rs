/*!
 * Glossary matching for fixed terminology.
 *
 * A glossary maps source terms to target terms for one translator. An input
 * equal to a key is translated by the glossary alone; otherwise every key
 * occurrence is substituted before the text reaches a backend. Longer keys
 * win over their own substrings, and substituted values are never matched
 * again.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::errors::ConfigError;

/// Input made only of punctuation and symbols
static SYMBOL_ONLY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\w\s]+$").expect("Invalid symbol-only regex"));

/// Whether `text` needs no translation at all: blank, numeric or symbol-only
pub fn is_passthrough(text: &str) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    text.chars().all(char::is_numeric) || SYMBOL_ONLY_REGEX.is_match(text)
}

/// Term mapping scoped to one translator
#[derive(Debug, Clone, Default)]
pub struct Glossary {
    entries: HashMap<String, String>,
    /// Alternation of all keys, longest first
    matcher: Option<Regex>,
}

impl Glossary {
    /// Glossary with no entries
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a glossary; empty keys are ignored
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let entries: HashMap<String, String> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| !k.is_empty())
            .collect();

        if entries.is_empty() {
            return Ok(Self::empty());
        }

        let mut keys: Vec<&String> = entries.keys().collect();
        // Longest first; ties broken alphabetically so the pattern is stable
        keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
        let pattern = keys
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let matcher = Regex::new(&pattern).map_err(|e| ConfigError::InvalidValue {
            key: "glossary".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            entries,
            matcher: Some(matcher),
        })
    }

    /// Parse a JSON object `{ "source": "target" }`
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let entries: HashMap<String, String> = serde_json::from_str(content)?;
        Self::new(entries)
    }

    /// Parse `source,target` lines. Blank lines, `#` comments and a
    /// `source,target` header are skipped.
    pub fn from_csv_str(content: &str) -> Result<Self, ConfigError> {
        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (source, target) = line.split_once(',').ok_or_else(|| {
                ConfigError::Parse(format!("glossary line {}: expected 'source,target'", index + 1))
            })?;
            let source = unquote(source.trim());
            let target = unquote(target.trim());
            if index == 0 && source.eq_ignore_ascii_case("source") && target.eq_ignore_ascii_case("target") {
                continue;
            }
            entries.push((source.to_string(), target.to_string()));
        }
        Self::new(entries)
    }

    /// Load a glossary file; `.json` files are JSON, anything else is CSV
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            || content.trim_start().starts_with('{');

        let glossary = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_csv_str(&content)?
        };
        debug!("Loaded {} glossary entries from {}", glossary.len(), path.display());
        Ok(glossary)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Target term for an exact key
    pub fn get(&self, term: &str) -> Option<&str> {
        self.entries.get(term).map(String::as_str)
    }

    /// Apply the glossary to `text`.
    ///
    /// Returns the rewritten text and whether the whole input was a key. An
    /// exact match is a finished translation; callers must not send it to a
    /// backend.
    ///
    /// Rewriting scans left to right once. At each position the longest key
    /// starting there wins, so of two keys that overlap without one containing
    /// the other, the one starting first is replaced (`{ab, bcd}` turns
    /// `abcd` into `<ab>cd`).
    pub fn apply(&self, text: &str) -> (String, bool) {
        if let Some(target) = self.entries.get(text) {
            return (target.clone(), true);
        }

        match &self.matcher {
            Some(matcher) => {
                let rewritten = matcher.replace_all(text, |caps: &regex::Captures| {
                    self.entries
                        .get(&caps[0])
                        .cloned()
                        .unwrap_or_else(|| caps[0].to_string())
                });
                (rewritten.into_owned(), false)
            }
            None => (text.to_string(), false),
        }
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
