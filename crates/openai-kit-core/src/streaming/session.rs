use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
};

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver},
    task::AbortHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::{
    decoder::{LineAssembler, StreamEvent, decode_chunk},
    registry::{RegistryInner, StreamRegistry},
    transport::{Transport, TransportEvent},
};
use crate::{
    error::{self, RequestError},
    request::RequestSpec,
};

/// Most of a non-2xx body kept for the completion error
const MAX_ERROR_BODY: usize = 64 * 1024;

type OnStart = Box<dyn FnOnce() + Send>;
type OnMessage<T> = Box<dyn FnMut(StreamEvent<T>) + Send>;
type OnComplete = Box<dyn FnOnce(CompletionSignal) + Send>;

/// Identity of one streaming exchange; never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a session: `Idle -> Started -> {Completed, Cancelled}`,
/// plus `Idle -> Cancelled` and `Idle -> Completed` (the exchange failed before
/// any response arrived).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Started = 1,
    Completed = 2,
    Cancelled = 3,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Started,
            2 => SessionState::Completed,
            _ => SessionState::Cancelled,
        }
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(SessionState::Idle as u8))
    }

    fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `from -> to` atomically; on failure returns the state actually held.
    fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(SessionState::from_u8)
    }
}

/// The single terminal notification of a session.
#[derive(Debug)]
pub struct CompletionSignal {
    /// Last HTTP status seen, if the response ever started
    pub status: Option<StatusCode>,
    /// True when the caller cancelled rather than the server ending the stream
    pub force_end: bool,
    pub error: Option<RequestError>,
}

impl CompletionSignal {
    /// The server ended the stream normally and nothing went wrong
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.force_end && self.error.is_none()
    }
}

/// State shared between a running session and the handles pointing at it
#[derive(Debug)]
pub(crate) struct SessionShared {
    id: SessionId,
    state: StateCell,
    cancel: CancellationToken,
    pump: OnceLock<AbortHandle>,
    terminated: AtomicBool,
    /// Registries tracking this session; told once it reaches a terminal state
    registries: Mutex<Vec<Weak<RegistryInner>>>,
}

impl SessionShared {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            state: StateCell::new(),
            cancel: CancellationToken::new(),
            pump: OnceLock::new(),
            terminated: AtomicBool::new(false),
            registries: Mutex::new(Vec::new()),
        }
    }

    fn registries(&self) -> MutexGuard<'_, Vec<Weak<RegistryInner>>> {
        self.registries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove this session from every registry it joined.
    fn leave_registries(&self) {
        let registries = std::mem::take(&mut *self.registries());
        for registry in registries.iter().filter_map(Weak::upgrade) {
            registry.forget(self.id);
        }
    }

    /// Returns false when the session was already terminal.
    fn cancel(&self) -> bool {
        loop {
            let current = self.state.load();
            if current.is_terminal() {
                return false;
            }
            if self
                .state
                .transition(current, SessionState::Cancelled)
                .is_ok()
            {
                tracing::debug!(session = %self.id, from = %current, "cancelling stream");
                if let Some(pump) = self.pump.get() {
                    pump.abort();
                }
                self.cancel.cancel();
                return true;
            }
        }
    }

    /// One-shot teardown used by the registry.
    pub(crate) fn terminate(&self) -> bool {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel();
        true
    }
}

/// Caller-side handle to a running session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    shared: Arc<SessionShared>,
}

impl StreamHandle {
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state.load()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Cancel the exchange.
    ///
    /// The underlying connection is released before this returns. A started
    /// session then completes with `force_end = true`; a session that never
    /// started completes silently. Cancelling a terminal session does nothing.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Whether a registry has already torn this session down
    #[must_use]
    pub fn was_terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::Acquire)
    }

    pub(crate) fn downgrade(&self) -> Weak<SessionShared> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn join(&self, registry: Weak<RegistryInner>) {
        self.shared.registries().push(registry);
    }
}

/// One streaming exchange, configured before it starts.
///
/// Callbacks are consumed by [`StreamSession::start`], so each is registered at
/// most once and never after the exchange is running. They fire on the session's
/// own task, strictly in order: `on_start` at most once, then every
/// `on_message`, then `on_complete` exactly once if the session started.
pub struct StreamSession<T> {
    id: SessionId,
    request: RequestSpec,
    on_start: Option<OnStart>,
    on_message: Option<OnMessage<T>>,
    on_complete: Option<OnComplete>,
}

impl<T> fmt::Debug for StreamSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("url", &self.request.url)
            .finish_non_exhaustive()
    }
}

impl<T> StreamSession<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub fn new(request: RequestSpec) -> Self {
        Self {
            id: SessionId::new(),
            request,
            on_start: None,
            on_message: None,
            on_complete: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn on_start(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_message(mut self, f: impl FnMut(StreamEvent<T>) + Send + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_complete(mut self, f: impl FnOnce(CompletionSignal) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Open the exchange. Must be called from within a tokio runtime.
    pub fn start(self, transport: Arc<dyn Transport>) -> StreamHandle {
        self.spawn(transport, None)
    }

    /// Open the exchange and track it in `registry` until it terminates.
    pub fn start_in(self, transport: Arc<dyn Transport>, registry: &StreamRegistry) -> StreamHandle {
        self.spawn(transport, Some(registry))
    }

    fn spawn(self, transport: Arc<dyn Transport>, registry: Option<&StreamRegistry>) -> StreamHandle {
        let shared = Arc::new(SessionShared::new(self.id));
        let handle = StreamHandle {
            shared: Arc::clone(&shared),
        };

        if let Some(registry) = registry {
            registry.register(&handle);
        }

        let span = tracing::debug_span!("stream", session = %self.id, url = %self.request.url);
        let events = transport.open(self.request);
        let (tx, rx) = mpsc::unbounded_channel();

        let pump = tokio::spawn(
            async move {
                let mut events = events;
                while let Some(event) = events.next().await {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }
            .instrument(span.clone()),
        );
        let _ = shared.pump.set(pump.abort_handle());
        // A cancel that raced the line above found no pump to abort
        if shared.state.load() == SessionState::Cancelled {
            pump.abort();
        }

        let driver = Driver {
            shared,
            on_start: self.on_start,
            on_message: self.on_message,
            on_complete: self.on_complete,
            started: false,
            first_chunk: true,
            status: None,
            fetch_error: None,
            error_body: None,
            lines: LineAssembler::default(),
        };
        tokio::spawn(driver.run(rx).instrument(span));

        handle
    }
}

/// Runs on the session's own task; the only place callbacks are invoked.
struct Driver<T> {
    shared: Arc<SessionShared>,
    on_start: Option<OnStart>,
    on_message: Option<OnMessage<T>>,
    on_complete: Option<OnComplete>,
    started: bool,
    first_chunk: bool,
    status: Option<StatusCode>,
    /// First recorded error wins
    fetch_error: Option<RequestError>,
    /// Body of a non-2xx response that was not an error envelope
    error_body: Option<Vec<u8>>,
    lines: LineAssembler,
}

impl<T> Driver<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn run(mut self, mut rx: UnboundedReceiver<TransportEvent>) {
        if let Some(signal) = self.drive(&mut rx).await {
            tracing::debug!(
                status = ?signal.status,
                force_end = signal.force_end,
                error = ?signal.error.as_ref().map(ToString::to_string),
                "stream completed"
            );
            if let Some(on_complete) = self.on_complete.take() {
                on_complete(signal);
            }
        }

        self.shared.leave_registries();
    }

    async fn drive(&mut self, rx: &mut UnboundedReceiver<TransportEvent>) -> Option<CompletionSignal> {
        let cancel = self.shared.cancel.clone();
        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => return self.cancelled(),
                event = rx.recv() => event,
            };

            match event {
                Some(TransportEvent::Response { status }) => self.handle_response(status),
                Some(TransportEvent::Chunk(chunk)) => self.handle_chunk(&chunk),
                Some(TransportEvent::Completed { error }) => return self.complete(error),
                None => return self.complete(None),
            }
        }
    }

    fn handle_response(&mut self, status: StatusCode) {
        if self.started {
            tracing::trace!(%status, "duplicate response notification ignored");
            return;
        }

        match self
            .shared
            .state
            .transition(SessionState::Idle, SessionState::Started)
        {
            Ok(()) => {
                self.started = true;
                self.status = Some(status);
                tracing::debug!(%status, "stream started");
                if let Some(on_start) = self.on_start.take() {
                    on_start();
                }
            }
            Err(state) => {
                tracing::debug!(%state, "response arrived after termination, discarded");
            }
        }
    }

    fn handle_chunk(&mut self, chunk: &Bytes) {
        if !self.started || self.shared.state.load() != SessionState::Started {
            tracing::trace!(len = chunk.len(), "chunk outside started state discarded");
            return;
        }
        tracing::trace!(len = chunk.len(), "chunk received");

        if std::mem::take(&mut self.first_chunk) {
            if let Some(status) = self.status.filter(|s| !s.is_success()) {
                if let Some(body) = error::detect_error_payload(chunk) {
                    tracing::warn!(%status, "server answered with an error payload");
                    self.record_error(RequestError::NonSuccessStatus {
                        status,
                        body: Some(body),
                    });
                    return;
                }
                self.error_body = Some(chunk[..chunk.len().min(MAX_ERROR_BODY)].to_vec());
            }
        } else if let Some(body) = self.error_body.as_mut() {
            let room = MAX_ERROR_BODY.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }

        if let Some(lines) = self.lines.push(chunk) {
            self.deliver(&lines);
        }
    }

    fn deliver(&mut self, bytes: &[u8]) {
        for event in decode_chunk::<T>(bytes) {
            if self.shared.state.load() != SessionState::Started {
                return;
            }

            if event.message.is_none() {
                if let Some(body) = event.error_payload() {
                    tracing::warn!("error payload inside the event stream");
                    self.record_error(RequestError::ErrorPayload { body });
                    continue;
                }
            }

            if let Some(on_message) = self.on_message.as_mut() {
                on_message(event);
            }
        }
    }

    fn record_error(&mut self, error: RequestError) {
        if self.fetch_error.is_none() {
            self.fetch_error = Some(error);
        }
    }

    fn complete(&mut self, transport_error: Option<RequestError>) -> Option<CompletionSignal> {
        if self.started {
            if let Some(tail) = self.lines.finish() {
                self.deliver(&tail);
            }
        }

        let from = if self.started {
            SessionState::Started
        } else {
            SessionState::Idle
        };
        if self
            .shared
            .state
            .transition(from, SessionState::Completed)
            .is_err()
        {
            // Cancelled is the only other way out of Idle or Started
            return self.cancelled();
        }

        if let Some(ref e) = transport_error {
            tracing::warn!(error = %e, "stream transport failed");
        }

        let error = transport_error.or_else(|| self.fetch_error.take()).or_else(|| {
            self.status.filter(|s| !s.is_success()).map(|status| {
                match self.error_body.take() {
                    Some(body) => error::parse_error_response(status, &body),
                    None => RequestError::NonSuccessStatus { status, body: None },
                }
            })
        });

        Some(CompletionSignal {
            status: self.status,
            force_end: false,
            error,
        })
    }

    fn cancelled(&mut self) -> Option<CompletionSignal> {
        if !self.started {
            tracing::debug!("stream cancelled before it started");
            return None;
        }

        Some(CompletionSignal {
            status: self.status,
            force_end: true,
            error: None,
        })
    }
}
