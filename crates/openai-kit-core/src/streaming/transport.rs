use async_stream::stream;
use bytes::Bytes;
use futures_util::{StreamExt, stream::BoxStream};
use reqwest::StatusCode;

use crate::{error::RequestError, request::RequestSpec};

/// Notifications a transport delivers for one exchange, in order.
#[derive(Debug)]
pub enum TransportEvent {
    /// Response headers arrived
    Response { status: StatusCode },
    /// A piece of the response body
    Chunk(Bytes),
    /// The exchange ended, with the transport error if it failed
    Completed { error: Option<RequestError> },
}

/// Issues one outbound request and reports its progress.
///
/// Dropping the returned stream must abort the exchange and release its
/// connection; sessions rely on that for cancellation. A stream that ends
/// without [`TransportEvent::Completed`] is treated as a clean completion.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, request: RequestSpec) -> BoxStream<'static, TransportEvent>;
}

/// Streaming transport backed by a shared reqwest client.
///
/// The client must not carry a total request timeout: a streaming exchange can
/// legitimately stay open for minutes.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn open(&self, request: RequestSpec) -> BoxStream<'static, TransportEvent> {
        let client = self.client.clone();

        Box::pin(stream! {
            let req = match request.build(&client) {
                Ok(req) => req,
                Err(e) => {
                    yield TransportEvent::Completed { error: Some(e) };
                    return;
                }
            };

            let response = match req.send().await {
                Ok(response) => response,
                Err(e) => {
                    yield TransportEvent::Completed { error: Some(e.into()) };
                    return;
                }
            };

            yield TransportEvent::Response { status: response.status() };

            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(chunk) => yield TransportEvent::Chunk(chunk),
                    Err(e) => {
                        yield TransportEvent::Completed { error: Some(e.into()) };
                        return;
                    }
                }
            }

            yield TransportEvent::Completed { error: None };
        })
    }
}
