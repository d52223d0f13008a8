#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(clippy::pedantic, clippy::unwrap_used)]

//! Streaming HTTP core for the openai-kit client
//!
//! This crate owns everything that carries protocol state: the one-shot request
//! path, the streaming session state machine, the line decoder for
//! `text/event-stream` bodies, the registry that tears sessions down, and the
//! TLS trust decision used for certificate pinning. It knows nothing about the
//! shape of any particular provider's requests or responses.

pub mod error;
pub mod executor;
pub mod request;
pub mod streaming;
pub mod timestamp;
pub mod trust;

pub use error::RequestError;
pub use executor::RequestExecutor;
pub use request::{HttpMethod, RequestSpec};
pub use streaming::{
    CompletionSignal, ReqwestTransport, ResponseStream, SessionId, SessionState, StreamEvent,
    StreamHandle, StreamRegistry, StreamResponse, StreamSession, Transport, TransportEvent,
    decode_chunk,
};
pub use timestamp::Timestamp;
pub use trust::{PinnedCertificate, TrustDecision, TrustValidator};

/// Re-export common types for convenience
pub use futures_util::stream::BoxStream;
pub use serde::{Deserialize, Serialize};
