//! Streaming exchanges over `text/event-stream`
//!
//! - `decoder` - turns one body chunk into zero or more [`StreamEvent`]s
//! - `transport` - the contract between a session and the HTTP client
//! - `session` - one exchange end-to-end: state machine, callbacks, cancellation
//! - `registry` - bulk teardown of the sessions a client owns
//! - `response` - async-stream adapter over the callback surface

mod decoder;
mod registry;
mod response;
mod session;
mod transport;

pub use decoder::{DATA_PREFIX, StreamEvent, decode_chunk};
pub use registry::StreamRegistry;
pub use response::{ResponseStream, StreamResponse};
pub use session::{CompletionSignal, SessionId, SessionState, StreamHandle, StreamSession};
pub use transport::{ReqwestTransport, Transport, TransportEvent};
