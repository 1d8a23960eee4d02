/*!
 * Prompt templates.
 *
 * A template is either a JSON array of role-tagged messages or plain text.
 * Substitution is a single pass over a fixed variable set; nothing else in a
 * template is ever interpreted.
 */

use log::warn;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::ConfigError;
use crate::translation::prompts::ChatMessage;

/// Matches `{source_language}`, `{target_language}`, `{text}` and the
/// `$lang_in`, `$lang_out`, `$text` spellings, braced or bare
static VARIABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\$\{(lang_in|lang_out|text)\}|\$(lang_in|lang_out|text)\b|\{(source_language|target_language|text)\}",
    )
    .expect("Invalid template variable regex")
});

/// Any `$name` or `${name}` reference
static DOLLAR_REFERENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("Invalid template reference regex")
});

const DOLLAR_VARIABLES: [&str; 3] = ["lang_in", "lang_out", "text"];

/// Values bound into a template
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    /// Resolved source language code
    pub source_language: &'a str,
    /// Resolved target language code
    pub target_language: &'a str,
    /// Text to translate
    pub text: &'a str,
}

/// Structure of a caller-supplied template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateBody {
    /// Role-tagged messages, rendered into a chat payload
    Messages(Vec<ChatMessage>),
    /// Plain text, rendered into whatever shape the backend expects
    Plain(String),
}

/// Caller-supplied prompt template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    body: TemplateBody,
}

impl PromptTemplate {
    /// Parse a template. A JSON array of `{role, content}` objects becomes a
    /// message template; anything else is a plain-text template.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "prompt_template".to_string(),
                message: "template is empty".to_string(),
            });
        }

        if trimmed.starts_with('[') {
            let messages: Vec<ChatMessage> = serde_json::from_str(trimmed)
                .map_err(|e| ConfigError::Parse(format!("prompt template: {}", e)))?;
            if messages.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "prompt_template".to_string(),
                    message: "message template has no messages".to_string(),
                });
            }
            for message in &messages {
                warn_unknown_references(&message.content);
            }
            return Ok(Self {
                body: TemplateBody::Messages(messages),
            });
        }

        warn_unknown_references(source);
        Ok(Self {
            body: TemplateBody::Plain(source.to_string()),
        })
    }

    /// Load and parse a template file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Template structure
    pub fn body(&self) -> &TemplateBody {
        &self.body
    }

    /// Substitute the variables into every part of the template
    pub fn render(&self, vars: &TemplateVars<'_>) -> TemplateBody {
        match &self.body {
            TemplateBody::Messages(messages) => TemplateBody::Messages(
                messages
                    .iter()
                    .map(|m| ChatMessage::new(&m.role, &substitute(&m.content, vars)))
                    .collect(),
            ),
            TemplateBody::Plain(text) => TemplateBody::Plain(substitute(text, vars)),
        }
    }
}

/// Replace template variables in one pass; substituted values are never rescanned
pub fn substitute(template: &str, vars: &TemplateVars<'_>) -> String {
    VARIABLE_REGEX
        .replace_all(template, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            match name {
                "source_language" | "lang_in" => vars.source_language.to_string(),
                "target_language" | "lang_out" => vars.target_language.to_string(),
                _ => vars.text.to_string(),
            }
        })
        .into_owned()
}

// `$name` references outside the known set are sent to the backend as written
fn warn_unknown_references(template: &str) {
    for caps in DOLLAR_REFERENCE_REGEX.captures_iter(template) {
        let name = &caps[1];
        if !DOLLAR_VARIABLES.contains(&name) {
            warn!("Prompt template references unknown variable '${}'; it is left as written", name);
        }
    }
}

/// System message of the standard chat prompt
pub const STANDARD_SYSTEM: &str = "You are a professional, authentic machine translation engine. \
Only output the translated text, do not include any other text.";

/// System message of the tagged chat prompt
pub const TAGGED_SYSTEM: &str = r#"You are a professional multilingual translator.

1. Principles
- Keep the meaning, tone and register of the source
- Keep terminology consistent and use established translations of technical terms
- Keep the original formatting, punctuation and paragraph structure
- Keep every formula, code span and markup tag exactly as written

2. Output
- Translate the Markdown source text {direction}
- Write the translation inside <t> and </t> tags
- Write notes about difficult choices inside <n> and </n> tags, only when asked with ">>nOtEs"
- On the first answer return only the <t> block

Output format:
<t>translation</t>"#;
