use std::fmt;

use serde::{Deserialize, Serialize};

/// Model identifiers known to the completions, chat and edits endpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    #[serde(rename = "gpt-4")]
    Gpt4,

    #[serde(rename = "gpt-4-32k")]
    Gpt4_32k,

    #[serde(rename = "gpt-3.5-turbo")]
    Gpt3_5Turbo,

    #[serde(rename = "text-davinci-003")]
    TextDavinci003,

    #[serde(rename = "text-davinci-002")]
    TextDavinci002,

    #[serde(rename = "code-davinci-002")]
    CodeDavinci002,

    #[serde(rename = "text-curie-001")]
    TextCurie001,

    #[serde(rename = "text-babbage-001")]
    TextBabbage001,

    #[serde(rename = "text-ada-001")]
    TextAda001,

    #[serde(rename = "davinci")]
    Davinci,

    #[serde(rename = "curie")]
    Curie,

    #[serde(rename = "babbage")]
    Babbage,

    #[serde(rename = "ada")]
    Ada,

    #[serde(rename = "code-cushman-001")]
    CodeCushman001,

    /// Custom model (fine-tunes, newer releases, other providers)
    #[serde(untagged)]
    Custom(String),
}

/// Generation a known model belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ModelFamily {
    Gpt4,
    Gpt3_5,
    Gpt3,
    Codex,
    Custom,
}

impl Model {
    /// Get the string representation of the model
    pub fn as_str(&self) -> &str {
        match self {
            Model::Gpt4 => "gpt-4",
            Model::Gpt4_32k => "gpt-4-32k",
            Model::Gpt3_5Turbo => "gpt-3.5-turbo",
            Model::TextDavinci003 => "text-davinci-003",
            Model::TextDavinci002 => "text-davinci-002",
            Model::CodeDavinci002 => "code-davinci-002",
            Model::TextCurie001 => "text-curie-001",
            Model::TextBabbage001 => "text-babbage-001",
            Model::TextAda001 => "text-ada-001",
            Model::Davinci => "davinci",
            Model::Curie => "curie",
            Model::Babbage => "babbage",
            Model::Ada => "ada",
            Model::CodeCushman001 => "code-cushman-001",
            Model::Custom(s) => s,
        }
    }

    /// `code-davinci-002` is listed with GPT-3.5, where it was released
    pub fn family(&self) -> ModelFamily {
        match self {
            Model::Gpt4 | Model::Gpt4_32k => ModelFamily::Gpt4,
            Model::Gpt3_5Turbo
            | Model::TextDavinci003
            | Model::TextDavinci002
            | Model::CodeDavinci002 => ModelFamily::Gpt3_5,
            Model::TextCurie001
            | Model::TextBabbage001
            | Model::TextAda001
            | Model::Davinci
            | Model::Curie
            | Model::Babbage
            | Model::Ada => ModelFamily::Gpt3,
            Model::CodeCushman001 => ModelFamily::Codex,
            Model::Custom(_) => ModelFamily::Custom,
        }
    }

    /// Whether the model is served by the chat completions endpoint
    pub fn supports_chat(&self) -> bool {
        match self {
            Model::Gpt4 | Model::Gpt4_32k | Model::Gpt3_5Turbo => true,
            Model::Custom(_) => true, // Assume custom models support chat
            _ => false,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Model {
    fn from(s: String) -> Self {
        match s.as_str() {
            "gpt-4" => Model::Gpt4,
            "gpt-4-32k" => Model::Gpt4_32k,
            "gpt-3.5-turbo" => Model::Gpt3_5Turbo,
            "text-davinci-003" => Model::TextDavinci003,
            "text-davinci-002" => Model::TextDavinci002,
            "code-davinci-002" => Model::CodeDavinci002,
            "text-curie-001" => Model::TextCurie001,
            "text-babbage-001" => Model::TextBabbage001,
            "text-ada-001" => Model::TextAda001,
            "davinci" => Model::Davinci,
            "curie" => Model::Curie,
            "babbage" => Model::Babbage,
            "ada" => Model::Ada,
            "code-cushman-001" => Model::CodeCushman001,
            _ => Model::Custom(s),
        }
    }
}

impl From<&str> for Model {
    fn from(s: &str) -> Self {
        Model::from(s.to_string())
    }
}
