#![warn(clippy::pedantic, clippy::unwrap_used)]

//! Client for OpenAI-compatible HTTP APIs
//!
//! This crate provides:
//! - Completions, chat completions and edits
//! - Image generation
//! - Cancellable streaming, either as a [`futures_util::Stream`] or through a callback
//! - Certificate pinning and optional rate limiting
//!
//! # Example
//!
//! ```rust,no_run
//! use openai_kit::{ChatCompletionsRequest, Model, OpenAIKit};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OpenAIKit::with_token("your-api-key")?;
//!
//!     let request = ChatCompletionsRequest::builder()
//!         .model(Model::Gpt3_5Turbo)
//!         .user_message("Hello, world!")
//!         .build();
//!
//!     let response = client.send_chat_completion(&request).await?;
//!     println!("{}", response.content().unwrap_or("No content"));
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod model;
pub mod request;
pub mod response;
pub mod usage;

// Re-export main types
pub use client::{OpenAIKit, StreamResult};
pub use config::KitConfig;
pub use endpoint::Endpoint;
pub use error::OpenAIKitError;
pub use message::{AIMessage, Role};
pub use model::{Model, ModelFamily};
pub use usage::Usage;

pub use request::{
    ChatCompletionsRequest, CompletionsRequest, EditsRequest, ImageRequest, ImageSize,
    ResponseFormat,
};
pub use response::{AIResponse, Choice, GeneratedImage, ImagesResponse, Logprobs};

// Re-export the streaming and transport types from the core crate
pub use openai_kit_core::{
    CompletionSignal, HttpMethod, RequestError, RequestSpec, ResponseStream, SessionId,
    SessionState, StreamEvent, StreamHandle, StreamResponse, Timestamp, Transport,
    TransportEvent,
};
