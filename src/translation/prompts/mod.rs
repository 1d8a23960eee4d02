/*!
 * Prompt building for the different backend families.
 *
 * This module provides:
 * - The payload shapes a backend can receive (plain text or chat messages)
 * - The default prompts, with marker-preservation instructions per marker family
 * - Constrained templates for caller-supplied prompts
 */

use serde::{Deserialize, Serialize};

use crate::language_utils::{LanguagePair, language_name};
use crate::translation::placeholder::PlaceholderStyle;

pub mod templates;

pub use templates::{PromptTemplate, TemplateBody, TemplateVars};

/// One role-tagged chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user or assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// System message
    pub fn system(content: &str) -> Self {
        Self::new("system", content)
    }

    /// User message
    pub fn user(content: &str) -> Self {
        Self::new("user", content)
    }
}

/// Request payload handed to a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Opaque text for non-chat backends
    Text {
        /// Text to translate (or a rendered plain template)
        text: String,
        /// Backend-specific source language code
        source_language: String,
        /// Backend-specific target language code
        target_language: String,
    },
    /// Ordered chat messages
    Chat(Vec<ChatMessage>),
}

impl Payload {
    /// The text a non-chat backend should send: the text itself, or the
    /// content of the last user message
    pub fn primary_text(&self) -> &str {
        match self {
            Self::Text { text, .. } => text,
            Self::Chat(messages) => messages
                .iter()
                .rev()
                .find(|m| m.role == "user")
                .or_else(|| messages.last())
                .map(|m| m.content.as_str())
                .unwrap_or_default(),
        }
    }

    /// Messages for a chat backend; a text payload becomes one user message
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        match self {
            Self::Text { text, .. } => vec![ChatMessage::user(text)],
            Self::Chat(messages) => messages.clone(),
        }
    }
}

/// Payload shape a backend expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    /// Plain text plus language codes
    #[default]
    Text,
    /// System and user messages
    Chat,
    /// One user message carrying the system instructions as well
    MergedChat,
}

/// Flavour of the default chat prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStyle {
    /// Direct translation request
    #[default]
    Standard,
    /// Translation wrapped in `<t>` tags
    Tagged,
}

/// Turns source text into the payload a backend family expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBuilder {
    shape: PayloadShape,
    style: PromptStyle,
    placeholder_style: PlaceholderStyle,
}

impl PromptBuilder {
    /// Create a builder for one backend family
    pub fn new(shape: PayloadShape, style: PromptStyle, placeholder_style: PlaceholderStyle) -> Self {
        Self {
            shape,
            style,
            placeholder_style,
        }
    }

    /// Payload shape produced by default
    pub fn shape(&self) -> PayloadShape {
        self.shape
    }

    /// Build the payload for `text`.
    ///
    /// With a template, the template's own structure decides the shape: a
    /// message template always yields a chat payload. Without one, the
    /// default prompt for this builder's shape and style is used.
    pub fn build(&self, text: &str, pair: &LanguagePair, template: Option<&PromptTemplate>) -> Payload {
        let payload = match template {
            Some(template) => {
                let vars = TemplateVars {
                    source_language: &pair.source,
                    target_language: &pair.target,
                    text,
                };
                match template.render(&vars) {
                    TemplateBody::Messages(messages) => Payload::Chat(messages),
                    TemplateBody::Plain(rendered) => match self.shape {
                        PayloadShape::Text => Payload::Text {
                            text: rendered,
                            source_language: pair.source.clone(),
                            target_language: pair.target.clone(),
                        },
                        PayloadShape::Chat | PayloadShape::MergedChat => {
                            Payload::Chat(vec![ChatMessage::user(&rendered)])
                        }
                    },
                }
            }
            None => match self.shape {
                PayloadShape::Text => Payload::Text {
                    text: text.to_string(),
                    source_language: pair.source.clone(),
                    target_language: pair.target.clone(),
                },
                PayloadShape::Chat | PayloadShape::MergedChat => {
                    Payload::Chat(self.default_messages(text, pair))
                }
            },
        };

        match (self.shape, payload) {
            (PayloadShape::MergedChat, Payload::Chat(messages)) => Payload::Chat(merge_messages(messages)),
            (_, payload) => payload,
        }
    }

    /// Default system and user messages
    fn default_messages(&self, text: &str, pair: &LanguagePair) -> Vec<ChatMessage> {
        let target = language_name(&pair.target);
        match self.style {
            PromptStyle::Standard => {
                let direction = if pair.is_auto_source() {
                    format!(
                        "to {}. Parts of the text already written in {} stay unchanged.",
                        target, target
                    )
                } else {
                    format!("from {} to {}.", language_name(&pair.source), target)
                };
                let user = format!(
                    "Translate the following markdown source text {} {} \
                     Output translation directly without any additional text.\n\
                     Source Text: {}\nTranslated Text:",
                    direction,
                    self.marker_instruction(),
                    text
                );
                vec![ChatMessage::system(templates::STANDARD_SYSTEM), ChatMessage::user(&user)]
            }
            PromptStyle::Tagged => {
                let direction = if pair.is_auto_source() {
                    format!(
                        "into {}; parts already written in {} are kept as they are",
                        target, target
                    )
                } else {
                    let source = language_name(&pair.source);
                    format!(
                        "from {} into {}; parts not written in {} are kept as they are",
                        source, target, source
                    )
                };
                let system = templates::TAGGED_SYSTEM.replace("{direction}", &direction);
                vec![
                    ChatMessage::system(&format!("{}\n\n{}", system, self.marker_instruction())),
                    ChatMessage::user(text),
                ]
            }
        }
    }

    fn marker_instruction(&self) -> &'static str {
        match self.placeholder_style {
            PlaceholderStyle::Formula => "Keep the formula notation {v*} unchanged.",
            PlaceholderStyle::RichTextPair => {
                "Keep the markup tags <b*> and </b*> unchanged and around the same words."
            }
        }
    }
}

/// Fold every message into a single user message
fn merge_messages(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    if messages.len() <= 1 && messages.iter().all(|m| m.role == "user") {
        return messages;
    }
    let merged = messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    vec![ChatMessage::user(&merged)]
}
