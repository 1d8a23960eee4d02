/*!
 * Clean-up of raw backend output.
 *
 * Runs before the sanity predicates, so a response that cannot be cleaned
 * (a tagged response without its tags) counts as malformed output.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static THINK_BLOCK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("Invalid think block regex"));

const TAG_START: &str = "<t>";
const TAG_END: &str = "</t>";

/// How the translation is laid out in the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// The whole response is the translation
    #[default]
    Plain,
    /// The translation sits between `<t>` and `</t>`
    Tagged,
}

/// Per-profile output clean-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcess {
    /// Literal tokens removed wherever they appear
    #[serde(default)]
    pub strip_tokens: Vec<String>,
    /// Remove `<think>…</think>` reasoning blocks
    #[serde(default)]
    pub strip_think_blocks: bool,
    /// Response layout
    #[serde(default)]
    pub response_format: ResponseFormat,
    /// Drop leading/trailing quotes the source did not have
    #[serde(default)]
    pub trim_unbalanced_quotes: bool,
    /// Remove Unicode control characters other than newline and tab
    #[serde(default = "default_true")]
    pub remove_control_chars: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PostProcess {
    fn default() -> Self {
        Self {
            strip_tokens: Vec::new(),
            strip_think_blocks: false,
            response_format: ResponseFormat::Plain,
            trim_unbalanced_quotes: false,
            remove_control_chars: true,
        }
    }
}

impl PostProcess {
    /// Clean `raw` produced for `source`. `Err` describes malformed output.
    pub fn apply(&self, source: &str, raw: &str) -> Result<String, String> {
        let mut text = raw.to_string();

        for token in self.strip_tokens.iter().filter(|t| !t.is_empty()) {
            text = text.replace(token.as_str(), "");
        }

        if self.strip_think_blocks {
            text = THINK_BLOCK_REGEX.replace_all(&text, "").into_owned();
        }

        if self.response_format == ResponseFormat::Tagged {
            text = extract_tagged(&text)
                .ok_or_else(|| "response has no <t>…</t> block".to_string())?
                .to_string();
        }

        if self.remove_control_chars {
            text.retain(|c| !c.is_control() || c == '\n' || c == '\t');
        }

        let mut text = text.trim().to_string();

        if self.trim_unbalanced_quotes {
            text = trim_unbalanced_quotes(source, &text);
        }

        Ok(text)
    }
}

/// Text between the first `<t>` and the following `</t>`
pub fn extract_tagged(text: &str) -> Option<&str> {
    let start = text.find(TAG_START)? + TAG_START.len();
    let end = text[start..].find(TAG_END)? + start;
    Some(&text[start..end])
}

fn is_opening_quote(c: char) -> bool {
    matches!(c, '"' | '“')
}

fn is_closing_quote(c: char) -> bool {
    matches!(c, '"' | '”')
}

/// Remove a quote at either end of `output` when `source` has none there
pub fn trim_unbalanced_quotes(source: &str, output: &str) -> String {
    let source = source.trim();
    let mut result = output;

    let source_opens = source.chars().next().is_some_and(is_opening_quote);
    if !source_opens {
        if let Some(first) = result.chars().next().filter(|c| is_opening_quote(*c)) {
            result = &result[first.len_utf8()..];
        }
    }

    let source_closes = source.chars().next_back().is_some_and(is_closing_quote);
    if !source_closes {
        if let Some(last) = result.chars().next_back().filter(|c| is_closing_quote(*c)) {
            result = &result[..result.len() - last.len_utf8()];
        }
    }

    result.to_string()
}
