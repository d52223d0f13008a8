use std::path::PathBuf;

use openai_kit_core::RequestError;
use reqwest::StatusCode;
use serde::{Serialize, Serializer, ser::SerializeStruct};
use thiserror::Error;

/// Errors that can occur when talking to an OpenAI-compatible API
#[derive(Debug, Error)]
pub enum OpenAIKitError {
    /// The request failed on the wire or the server rejected it
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Missing API key
    #[error("Missing API key")]
    MissingApiKey,

    /// The pinned certificate file could not be read
    #[error("Failed to read pinned certificate {}: {source}", .path.display())]
    PinnedCertificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pinned certificate was read but is not usable
    #[error("Invalid pinned certificate: {0}")]
    InvalidPinnedCertificate(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl OpenAIKitError {
    /// HTTP status behind this error, if the server answered
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            OpenAIKitError::Request(e) => e.status(),
            _ => None,
        }
    }

    /// Message the server put in its error body, if any
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            OpenAIKitError::Request(e) => e.message(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OpenAIKitError {
    fn from(e: reqwest::Error) -> Self {
        OpenAIKitError::Request(RequestError::Transport(e))
    }
}

impl Serialize for OpenAIKitError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            OpenAIKitError::Request(e) => {
                let status = e.status();
                let message = e.message();
                let field_count = 2
                    + usize::from(status.is_some())
                    + usize::from(message.is_some());
                let mut state = serializer.serialize_struct("OpenAIKitError", field_count)?;
                state.serialize_field("type", "Request")?;
                state.serialize_field("error", &e.to_string())?;
                if let Some(status) = status {
                    state.serialize_field("status", &status.as_u16())?;
                }
                if let Some(message) = message {
                    state.serialize_field("message", &message)?;
                }
                state.end()
            }
            OpenAIKitError::MissingApiKey => {
                let mut state = serializer.serialize_struct("OpenAIKitError", 1)?;
                state.serialize_field("type", "MissingApiKey")?;
                state.end()
            }
            OpenAIKitError::PinnedCertificate { path, source } => {
                let mut state = serializer.serialize_struct("OpenAIKitError", 3)?;
                state.serialize_field("type", "PinnedCertificate")?;
                state.serialize_field("path", &path.display().to_string())?;
                state.serialize_field("error", &source.to_string())?;
                state.end()
            }
            OpenAIKitError::InvalidPinnedCertificate(message) => {
                let mut state = serializer.serialize_struct("OpenAIKitError", 2)?;
                state.serialize_field("type", "InvalidPinnedCertificate")?;
                state.serialize_field("message", message)?;
                state.end()
            }
            OpenAIKitError::InvalidConfig(message) => {
                let mut state = serializer.serialize_struct("OpenAIKitError", 2)?;
                state.serialize_field("type", "InvalidConfig")?;
                state.serialize_field("message", message)?;
                state.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openai_kit_core::error::parse_error_response;

    #[test]
    fn test_serialize_request_error_carries_status_and_message() {
        let err = OpenAIKitError::from(parse_error_response(
            StatusCode::TOO_MANY_REQUESTS,
            br#"{"error":{"message":"slow down"}}"#,
        ));

        let json = serde_json::to_value(&err).expect("serializable");
        assert_eq!(json["type"], "Request");
        assert_eq!(json["status"], 429);
        assert_eq!(json["message"], "slow down");
        assert_eq!(json["error"], "HTTP 429 Too Many Requests: slow down");
    }

    #[test]
    fn test_serialize_missing_api_key() {
        let json = serde_json::to_value(OpenAIKitError::MissingApiKey).expect("serializable");
        assert_eq!(json, serde_json::json!({"type": "MissingApiKey"}));
    }

    #[test]
    fn test_pinned_certificate_display() {
        let err = OpenAIKitError::PinnedCertificate {
            path: PathBuf::from("/etc/pins/api.der"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to read pinned certificate /etc/pins/api.der: no such file"
        );
        assert_eq!(err.status(), None);
    }
}
