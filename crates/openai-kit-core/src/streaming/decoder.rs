use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::detect_error_payload;

/// Prefix of an event line that carries a payload
pub const DATA_PREFIX: &str = "data:";

const DONE_SENTINEL: &[u8] = b"[DONE]";

/// One decoder-recognized line of a streaming body.
///
/// `message` is `None` when the payload did not decode as `T`; the raw line is
/// kept either way so nothing the server sent is lost.
#[derive(Debug, Clone)]
pub struct StreamEvent<T> {
    /// Raw bytes of the line, without the line terminator
    pub data: Bytes,
    pub message: Option<T>,
}

impl<T> StreamEvent<T> {
    fn undecoded(data: Bytes) -> Self {
        Self {
            data,
            message: None,
        }
    }

    /// The bytes after the `data:` prefix, if the line carries one
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        strip_data_prefix(&self.data)
    }

    /// True for the `data: [DONE]` line some servers send before closing
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.payload() == Some(DONE_SENTINEL)
    }

    /// The error envelope carried by this line, if the payload is one
    #[must_use]
    pub fn error_payload(&self) -> Option<Value> {
        self.payload().and_then(detect_error_payload)
    }
}

fn strip_data_prefix(line: &[u8]) -> Option<&[u8]> {
    let rest = line.strip_prefix(DATA_PREFIX.as_bytes())?;
    Some(rest.strip_prefix(b" ").unwrap_or(rest))
}

/// Decode one chunk of a streaming body into events, in order.
///
/// Never fails: a line that is not UTF-8 comes back as a message-less event,
/// and so does a payload that does not parse as `T`. Lines without the
/// `data:` prefix (blank keep-alives, `id:`, `event:`, `:` comments) are dropped.
pub fn decode_chunk<T: DeserializeOwned>(chunk: &[u8]) -> Vec<StreamEvent<T>> {
    chunk
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter_map(|line| {
            if std::str::from_utf8(line).is_err() {
                tracing::debug!(len = line.len(), "event line is not valid UTF-8");
                return Some(StreamEvent::undecoded(Bytes::copy_from_slice(line)));
            }

            let payload = strip_data_prefix(line)?;
            let message = match serde_json::from_slice::<T>(payload) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::trace!(error = %e, "event payload did not decode");
                    None
                }
            };
            Some(StreamEvent {
                data: Bytes::copy_from_slice(line),
                message,
            })
        })
        .collect()
}

/// Reassembles lines split across chunk boundaries.
///
/// Hands back everything up to and including the last line feed seen so far and
/// holds the unterminated tail until more bytes arrive or the stream ends.
#[derive(Debug, Default)]
pub(crate) struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        let Some(last_newline) = chunk.iter().rposition(|&b| b == b'\n') else {
            self.pending.extend_from_slice(chunk);
            return None;
        };

        let mut complete = std::mem::take(&mut self.pending);
        complete.extend_from_slice(&chunk[..=last_newline]);
        self.pending.extend_from_slice(&chunk[last_newline + 1..]);
        Some(complete)
    }

    /// Whatever unterminated tail is left once the body has ended
    pub(crate) fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}
