use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures_util::Stream;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use super::{
    registry::StreamRegistry,
    session::{SessionId, StreamHandle, StreamSession},
    transport::Transport,
};
use crate::{error::RequestError, request::RequestSpec};

/// One item of a [`ResponseStream`].
#[derive(Debug, Clone)]
pub struct StreamResponse<T> {
    pub message: Option<T>,
    /// Raw event line, absent on the final item
    pub data: Option<Bytes>,
    /// Set only on the last item of a stream
    pub is_finished: bool,
    pub force_end: bool,
}

impl<T> StreamResponse<T> {
    fn event(message: Option<T>, data: Bytes) -> Self {
        Self {
            message,
            data: Some(data),
            is_finished: false,
            force_end: false,
        }
    }

    fn finished(force_end: bool) -> Self {
        Self {
            message: None,
            data: None,
            is_finished: true,
            force_end,
        }
    }
}

type Item<T> = Result<StreamResponse<T>, RequestError>;

/// A streaming exchange consumed as a [`Stream`].
///
/// Yields one item per event line, then either a single `is_finished` item or
/// the session's error, then ends. Dropping the stream cancels the exchange.
#[derive(Debug)]
pub struct ResponseStream<T> {
    rx: UnboundedReceiver<Item<T>>,
    handle: StreamHandle,
}

impl<T> ResponseStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub fn start(
        request: RequestSpec,
        transport: Arc<dyn Transport>,
        registry: Option<&StreamRegistry>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let messages = tx.clone();

        let session = StreamSession::<T>::new(request)
            .on_message(move |event| {
                let _ = messages.send(Ok(StreamResponse::event(event.message, event.data)));
            })
            .on_complete(move |signal| {
                let item = match signal.error {
                    Some(error) => Err(error),
                    None => Ok(StreamResponse::finished(signal.force_end)),
                };
                let _ = tx.send(item);
            });

        let handle = match registry {
            Some(registry) => session.start_in(transport, registry),
            None => session.start(transport),
        };

        Self { rx, handle }
    }
}

impl<T> ResponseStream<T> {
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.handle.id()
    }

    /// Handle to the underlying session, e.g. to cancel from another task
    #[must_use]
    pub fn handle(&self) -> &StreamHandle {
        &self.handle
    }
}

impl<T> Stream for ResponseStream<T> {
    type Item = Item<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl<T> Drop for ResponseStream<T> {
    fn drop(&mut self) {
        if !self.handle.is_terminal() {
            tracing::debug!(session = %self.handle.id(), "response stream dropped, cancelling");
            self.handle.cancel();
        }
    }
}
