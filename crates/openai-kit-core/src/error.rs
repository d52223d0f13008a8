use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Errors produced by the one-shot and streaming request paths
#[derive(Error, Debug)]
pub enum RequestError {
    /// The request URL could not be parsed
    #[error("Invalid URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The server answered without a usable body or HTTP metadata
    #[error("Invalid response shape: {0}")]
    InvalidResponseShape(String),

    /// The underlying HTTP exchange failed
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("HTTP {status}{}", message_suffix(.body))]
    NonSuccessStatus {
        status: StatusCode,
        /// Error body decoded as JSON, when it was JSON
        body: Option<Value>,
    },

    /// The server reported an error inside an otherwise successful event stream
    #[error("Error inside the event stream{}", payload_suffix(.body))]
    ErrorPayload { body: Value },

    /// A one-shot response body did not decode as the expected type
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request body could not be serialized
    #[error("Failed to encode request body: {0}")]
    Body(String),

    /// TLS configuration could not be assembled
    #[error("TLS configuration error: {0}")]
    Tls(String),
}

impl RequestError {
    /// Human-readable message carried by a non-2xx error body, if any
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            RequestError::NonSuccessStatus {
                body: Some(body), ..
            } => extract_error_message(body),
            RequestError::ErrorPayload { body } => extract_error_message(body),
            _ => None,
        }
    }

    /// HTTP status associated with this error, if any
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::NonSuccessStatus { status, .. } => Some(*status),
            RequestError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Build a [`RequestError::NonSuccessStatus`] from a status and a raw body.
///
/// The body is decoded best-effort; a non-JSON body is kept as a JSON string so
/// the caller still sees what the server said.
pub fn parse_error_response(status: StatusCode, body: &[u8]) -> RequestError {
    let body = if body.is_empty() {
        None
    } else {
        Some(
            serde_json::from_slice::<Value>(body)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned())),
        )
    };

    RequestError::NonSuccessStatus { status, body }
}

/// Detect the in-band error envelope: a single JSON object carrying an `error` key.
#[must_use]
pub fn detect_error_payload(bytes: &[u8]) -> Option<Value> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value @ Value::Object(_)) if value.get("error").is_some() => Some(value),
        _ => None,
    }
}

fn message_suffix(body: &Option<Value>) -> String {
    body.as_ref()
        .and_then(extract_error_message)
        .map(|message| format!(": {message}"))
        .unwrap_or_default()
}

fn payload_suffix(body: &Value) -> String {
    extract_error_message(body)
        .map(|message| format!(": {message}"))
        .unwrap_or_default()
}

/// Extract error message from the usual JSON error envelopes
fn extract_error_message(json: &Value) -> Option<String> {
    // {"error": {"message": "..."}}
    if let Some(error_obj) = json.get("error") {
        if let Some(message) = error_obj.get("message").and_then(Value::as_str) {
            return Some(message.to_string());
        }
        // {"error": "..."}
        if let Some(message) = error_obj.as_str() {
            return Some(message.to_string());
        }
    }

    // Generic message field
    if let Some(message) = json.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }

    // Plain-text body kept as a string
    json.as_str().map(str::to_string)
}
