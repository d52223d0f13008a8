use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{AIMessage, Model};

/// Request for a text completion
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(builder_type(vis = "pub"), state_mod(vis = "pub"))]
pub struct CompletionsRequest {
    /// The model to use for completion
    #[builder(into)]
    pub model: Model,

    /// The prompt to complete
    #[builder(into)]
    pub prompt: String,

    /// Sampling temperature (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Number of completions to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,

    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Top-p sampling parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Frequency penalty (-2.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Presence penalty (-2.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Number of most likely tokens to return log probabilities for (max 5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<u32>,

    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// User identifier for abuse monitoring
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub user: Option<String>,

    /// Set by the client for streaming calls
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(skip)]
    pub stream: Option<bool>,
}

/// Request for a chat completion
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(builder_type(vis = "pub"), state_mod(vis = "pub"))]
pub struct ChatCompletionsRequest {
    /// Conversation so far, oldest first
    #[builder(field)]
    pub messages: Vec<AIMessage>,

    /// The model to use for completion
    #[builder(into)]
    pub model: Model,

    /// Sampling temperature (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Number of completions to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,

    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Top-p sampling parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Frequency penalty (-2.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Presence penalty (-2.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<u32>,

    /// Response format (plain text or a JSON object)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,

    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// User identifier for abuse monitoring
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub user: Option<String>,

    /// Set by the client for streaming calls
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(skip)]
    pub stream: Option<bool>,
}

// Builder extensions for convenience methods
impl<S: chat_completions_request_builder::State> ChatCompletionsRequestBuilder<S> {
    /// Add a user message
    pub fn user_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(AIMessage::user(content));
        self
    }

    /// Add an assistant message
    pub fn assistant_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(AIMessage::assistant(content));
        self
    }

    /// Add a system message
    pub fn system_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(AIMessage::system(content));
        self
    }

    /// Add a message
    pub fn message(mut self, message: AIMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Add previous messages, then continue appending after them
    pub fn messages(mut self, messages: impl IntoIterator<Item = AIMessage>) -> Self {
        self.messages.extend(messages);
        self
    }
}

/// Output format of a chat completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

/// Request for an instruction-driven edit of some input text
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(builder_type(vis = "pub"), state_mod(vis = "pub"))]
pub struct EditsRequest {
    #[builder(into)]
    pub model: Model,

    /// Text to use as the starting point for the edit
    #[builder(into)]
    pub input: String,

    /// How the model should edit the input
    #[builder(into)]
    pub instruction: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// Image generation request
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(builder_type(vis = "pub"), state_mod(vis = "pub"))]
pub struct ImageRequest {
    /// Description of the image to generate
    #[builder(into)]
    pub prompt: String,

    /// Number of images to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,

    #[builder(default)]
    pub size: ImageSize,

    /// User identifier for abuse monitoring
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum ImageSize {
    #[serde(rename = "256x256")]
    #[strum(serialize = "256x256")]
    Size256,
    #[serde(rename = "512x512")]
    #[strum(serialize = "512x512")]
    Size512,
    #[default]
    #[serde(rename = "1024x1024")]
    #[strum(serialize = "1024x1024")]
    Size1024,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completions_request_omits_unset_fields() {
        let request = CompletionsRequest::builder()
            .model(Model::TextDavinci003)
            .prompt("Say this is a test")
            .max_tokens(7)
            .temperature(0.5)
            .build();

        assert_eq!(
            serde_json::to_value(&request).expect("serializable"),
            json!({
                "model": "text-davinci-003",
                "prompt": "Say this is a test",
                "max_tokens": 7,
                "temperature": 0.5,
            })
        );
    }

    #[test]
    fn test_chat_request_keeps_message_order() {
        let request = ChatCompletionsRequest::builder()
            .model("gpt-3.5-turbo")
            .system_message("You are terse.")
            .messages([AIMessage::user("hi"), AIMessage::assistant("hello")])
            .user_message("how are you?")
            .response_format(ResponseFormat::JsonObject)
            .build();

        let json = serde_json::to_value(&request).expect("serializable");
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["response_format"], json!({"type": "json_object"}));
        let roles: Vec<_> = json["messages"]
            .as_array()
            .expect("messages array")
            .iter()
            .map(|m| m["role"].as_str().expect("role").to_string())
            .collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn test_edits_request_shape() {
        let request = EditsRequest::builder()
            .model("text-davinci-edit-001")
            .input("What day of the wek is it?")
            .instruction("Fix the spelling mistakes")
            .build();

        assert_eq!(
            serde_json::to_value(&request).expect("serializable"),
            json!({
                "model": "text-davinci-edit-001",
                "input": "What day of the wek is it?",
                "instruction": "Fix the spelling mistakes",
            })
        );
    }

    #[test]
    fn test_image_request_defaults_to_largest_size() {
        let request = ImageRequest::builder().prompt("a lighthouse").n(2).build();
        assert_eq!(
            serde_json::to_value(&request).expect("serializable"),
            json!({"prompt": "a lighthouse", "n": 2, "size": "1024x1024"})
        );
        assert_eq!(ImageSize::Size256.to_string(), "256x256");
    }
}
