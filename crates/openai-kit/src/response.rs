use std::collections::HashMap;

use openai_kit_core::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{AIMessage, Model, Role, Usage};

/// Response shared by the completions, chat completions and edits endpoints.
///
/// Streaming calls decode every event line into this type as well; in that
/// case each choice carries the increment in `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Object type, e.g. `text_completion` or `chat.completion.chunk`
    pub object: String,

    pub created: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Model>,

    pub choices: Vec<Choice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<Logprobs>,
}

impl AIResponse {
    /// Text of the first choice, whichever endpoint produced it
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(Choice::content)
    }
}

/// One completion alternative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawChoice")]
pub struct Choice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Chat message, or the folded `delta` of a streaming chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<AIMessage>,

    pub index: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<Logprobs>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl Choice {
    pub fn content(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or_else(|| self.message.as_ref().map(|m| m.content.as_str()))
    }
}

#[derive(Deserialize)]
struct RawChoice {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    message: Option<AIMessage>,
    index: u32,
    #[serde(default)]
    logprobs: Option<Logprobs>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Deserialize)]
struct Delta {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl From<RawChoice> for Choice {
    fn from(raw: RawChoice) -> Self {
        // A streaming delta replaces any message; unknown roles read as assistant
        let message = match raw.delta {
            Some(delta) => Some(AIMessage::new(
                delta
                    .role
                    .and_then(|role| role.parse::<Role>().ok())
                    .unwrap_or(Role::Assistant),
                delta.content.unwrap_or_default(),
            )),
            None => raw.message,
        };

        Self {
            text: raw.text,
            message,
            index: raw.index,
            logprobs: raw.logprobs,
            finish_reason: raw.finish_reason,
        }
    }
}

/// Per-token log probabilities of a completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Logprobs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<String>>,

    /// The first entry is null when the prompt is echoed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_logprobs: Option<Vec<Option<f64>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<Vec<Option<HashMap<String, f64>>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_offset: Option<Vec<u32>>,
}

/// Response of the image generation endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesResponse {
    pub created: Timestamp,
    pub data: Vec<GeneratedImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
}
