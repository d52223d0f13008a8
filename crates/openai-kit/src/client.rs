use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use openai_kit_core::{
    CompletionSignal, PinnedCertificate, ReqwestTransport, RequestExecutor, RequestSpec,
    ResponseStream, StreamEvent, StreamHandle, StreamRegistry, StreamResponse, StreamSession,
    Transport, TrustValidator,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    AIResponse, ChatCompletionsRequest, CompletionsRequest, EditsRequest, ImageRequest,
    ImagesResponse, KitConfig, OpenAIKitError, endpoint::Endpoint,
};

/// Item handed to the callback of the `*_with` streaming calls
pub type StreamResult = Result<StreamResponse<AIResponse>, OpenAIKitError>;

/// Client for OpenAI-compatible completions, chat, edits and image endpoints.
///
/// Cheap to clone; clones share the connection pool and the set of live
/// streams. Dropping the last clone cancels every stream still running.
#[derive(Clone)]
pub struct OpenAIKit {
    config: Arc<KitConfig>,
    headers: Arc<HashMap<String, String>>,
    executor: RequestExecutor,
    transport: Arc<dyn Transport>,
    registry: StreamRegistry,

    /// Rate limiter (optional)
    #[cfg(feature = "leaky-bucket")]
    rate_limiter: Option<Arc<leaky_bucket::RateLimiter>>,
}

impl fmt::Debug for OpenAIKit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIKit")
            .field("config", &self.config)
            .field("active_streams", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl OpenAIKit {
    pub fn new(config: KitConfig) -> Result<Self, OpenAIKitError> {
        let tls = trust_validator(&config)?
            .client_config()
            .map_err(|e| OpenAIKitError::InvalidPinnedCertificate(e.to_string()))?;

        // No total timeout here: streams may stay open for minutes. One-shot
        // requests get theirs from the executor.
        let client = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .build()?;

        let executor = RequestExecutor::new(client.clone()).with_timeout(config.timeout);
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(client));

        tracing::debug!(base_url = %config.base_url, "openai-kit client created");
        Ok(Self {
            headers: Arc::new(config.base_headers()),
            config: Arc::new(config),
            executor,
            transport,
            registry: StreamRegistry::new(),
            #[cfg(feature = "leaky-bucket")]
            rate_limiter: None,
        })
    }

    /// Create a client with the default configuration for `api_token`
    pub fn with_token(api_token: impl Into<String>) -> Result<Self, OpenAIKitError> {
        Self::new(KitConfig::builder().api_token(api_token).build())
    }

    /// Create a new client from environment variables
    pub fn from_env() -> Result<Self, OpenAIKitError> {
        Self::new(KitConfig::from_env()?)
    }

    pub fn config(&self) -> &KitConfig {
        &self.config
    }

    /// Number of streams started by this client that have not finished
    pub fn active_streams(&self) -> usize {
        self.registry.len()
    }

    /// Cancel every running stream; returns how many were stopped
    pub fn terminate_streams(&self) -> usize {
        self.registry.terminate_all()
    }

    /// Send a completions request and wait for the whole response
    pub async fn send_completion(
        &self,
        request: &CompletionsRequest,
    ) -> Result<AIResponse, OpenAIKitError> {
        let spec = self.spec(Endpoint::Completions, request)?;
        self.send(&spec).await
    }

    pub async fn send_chat_completion(
        &self,
        request: &ChatCompletionsRequest,
    ) -> Result<AIResponse, OpenAIKitError> {
        let spec = self.spec(Endpoint::ChatCompletions, request)?;
        self.send(&spec).await
    }

    pub async fn send_edits(&self, request: &EditsRequest) -> Result<AIResponse, OpenAIKitError> {
        let spec = self.spec(Endpoint::Edits, request)?;
        self.send(&spec).await
    }

    pub async fn send_images_request(
        &self,
        request: &ImageRequest,
    ) -> Result<ImagesResponse, OpenAIKitError> {
        let spec = self.spec(Endpoint::ImageGenerations, request)?;
        self.send(&spec).await
    }

    /// Stream a completion. Dropping the returned stream cancels it.
    pub async fn stream_completion(
        &self,
        request: &CompletionsRequest,
    ) -> Result<ResponseStream<AIResponse>, OpenAIKitError> {
        let mut request = request.clone();
        request.stream = Some(true);
        self.open_stream(Endpoint::Completions, &request).await
    }

    /// Stream a chat completion. Dropping the returned stream cancels it.
    pub async fn stream_chat_completion(
        &self,
        request: &ChatCompletionsRequest,
    ) -> Result<ResponseStream<AIResponse>, OpenAIKitError> {
        let mut request = request.clone();
        request.stream = Some(true);
        self.open_stream(Endpoint::ChatCompletions, &request).await
    }

    /// Stream a completion into `on_event`.
    ///
    /// `on_event` sees one `Ok` item per event line, then either a final
    /// `is_finished` item or the error that ended the stream.
    pub async fn stream_completion_with<F>(
        &self,
        request: &CompletionsRequest,
        on_event: F,
    ) -> Result<StreamHandle, OpenAIKitError>
    where
        F: FnMut(StreamResult) + Send + 'static,
    {
        let mut request = request.clone();
        request.stream = Some(true);
        self.stream_with(Endpoint::Completions, &request, on_event).await
    }

    /// Chat flavour of [`OpenAIKit::stream_completion_with`]
    pub async fn stream_chat_completion_with<F>(
        &self,
        request: &ChatCompletionsRequest,
        on_event: F,
    ) -> Result<StreamHandle, OpenAIKitError>
    where
        F: FnMut(StreamResult) + Send + 'static,
    {
        let mut request = request.clone();
        request.stream = Some(true);
        self.stream_with(Endpoint::ChatCompletions, &request, on_event).await
    }

    /// Send any prepared request and decode the JSON response
    pub async fn send<T: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<T, OpenAIKitError> {
        self.acquire().await;
        Ok(self.executor.send(spec).await?)
    }

    /// Start a streaming exchange for any prepared request.
    ///
    /// The stream is tracked by this client until it finishes.
    pub async fn start_stream<T>(
        &self,
        spec: RequestSpec,
        on_start: impl FnOnce() + Send + 'static,
        on_message: impl FnMut(StreamEvent<T>) + Send + 'static,
        on_complete: impl FnOnce(CompletionSignal) + Send + 'static,
    ) -> StreamHandle
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.acquire().await;
        StreamSession::new(spec)
            .on_start(on_start)
            .on_message(on_message)
            .on_complete(on_complete)
            .start_in(Arc::clone(&self.transport), &self.registry)
    }

    /// Bodiless request for `endpoint` carrying this client's headers.
    ///
    /// For calls the typed methods don't cover, such as multipart image edits;
    /// attach a body and pass it to [`OpenAIKit::send`] or [`OpenAIKit::start_stream`].
    pub fn request_spec(&self, endpoint: Endpoint) -> RequestSpec {
        RequestSpec::new(endpoint.method(), endpoint.url(&self.config.base_url))
            .with_headers(self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn cancel(&self, handle: &StreamHandle) {
        handle.cancel();
    }

    async fn open_stream<B: Serialize>(
        &self,
        endpoint: Endpoint,
        body: &B,
    ) -> Result<ResponseStream<AIResponse>, OpenAIKitError> {
        let spec = self.stream_spec(endpoint, body)?;
        self.acquire().await;
        Ok(ResponseStream::start(
            spec,
            Arc::clone(&self.transport),
            Some(&self.registry),
        ))
    }

    async fn stream_with<B, F>(
        &self,
        endpoint: Endpoint,
        body: &B,
        on_event: F,
    ) -> Result<StreamHandle, OpenAIKitError>
    where
        B: Serialize,
        F: FnMut(StreamResult) + Send + 'static,
    {
        let spec = self.stream_spec(endpoint, body)?;

        // Both callbacks run on the session task, one after the other
        let on_message = Arc::new(Mutex::new(on_event));
        let on_complete = Arc::clone(&on_message);

        let handle = self
            .start_stream(
                spec,
                || {},
                move |event: StreamEvent<AIResponse>| {
                    let mut on_event = on_message.lock().unwrap_or_else(PoisonError::into_inner);
                    on_event(Ok(StreamResponse {
                        message: event.message,
                        data: Some(event.data),
                        is_finished: false,
                        force_end: false,
                    }));
                },
                move |signal: CompletionSignal| {
                    let item = match signal.error {
                        Some(e) => Err(e.into()),
                        None => Ok(StreamResponse {
                            message: None,
                            data: None,
                            is_finished: true,
                            force_end: signal.force_end,
                        }),
                    };
                    let mut on_event = on_complete.lock().unwrap_or_else(PoisonError::into_inner);
                    on_event(item);
                },
            )
            .await;
        Ok(handle)
    }

    fn spec<B: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        body: &B,
    ) -> Result<RequestSpec, OpenAIKitError> {
        Ok(self.request_spec(endpoint).with_json(body)?)
    }

    fn stream_spec<B: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        body: &B,
    ) -> Result<RequestSpec, OpenAIKitError> {
        Ok(self
            .spec(endpoint, body)?
            .with_header("Accept", "text/event-stream")
            .with_header("Cache-Control", "no-cache"))
    }

    #[cfg_attr(not(feature = "leaky-bucket"), allow(clippy::unused_async))]
    async fn acquire(&self) {
        #[cfg(feature = "leaky-bucket")]
        if let Some(ref limiter) = self.rate_limiter {
            limiter.acquire_one().await;
        }
    }
}

#[cfg(feature = "leaky-bucket")]
impl OpenAIKit {
    /// Set rate limiter
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: leaky_bucket::RateLimiter) -> Self {
        self.rate_limiter = Some(Arc::new(rate_limiter));
        self
    }
}

fn trust_validator(config: &KitConfig) -> Result<TrustValidator, OpenAIKitError> {
    let Some(ref path) = config.pinned_certificate else {
        return Ok(TrustValidator::system());
    };

    let bytes = std::fs::read(path).map_err(|source| OpenAIKitError::PinnedCertificate {
        path: path.clone(),
        source,
    })?;
    let pin = PinnedCertificate::from_bytes(&bytes)
        .map_err(|e| OpenAIKitError::InvalidPinnedCertificate(e.to_string()))?;

    tracing::debug!(path = %path.display(), "certificate pinning enabled");
    Ok(TrustValidator::pinned(pin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_pinned_certificate_file() {
        let config = KitConfig::builder()
            .api_token("sk-test")
            .pinned_certificate("/nonexistent/openai-kit/pin.der")
            .build();

        assert!(matches!(
            OpenAIKit::new(config),
            Err(OpenAIKitError::PinnedCertificate { .. })
        ));
    }

    #[test]
    fn test_stream_spec_headers() {
        let client = OpenAIKit::new(
            KitConfig::builder()
                .api_token("sk-test")
                .organization("org-1")
                .base_url("http://localhost:1234")
                .build(),
        )
        .expect("client builds");

        let spec = client
            .stream_spec(Endpoint::ChatCompletions, &serde_json::json!({}))
            .expect("spec builds");
        assert_eq!(spec.url, "http://localhost:1234/v1/chat/completions");
        assert_eq!(spec.headers["Authorization"], "Bearer sk-test");
        assert_eq!(spec.headers["OpenAI-Organization"], "org-1");
        assert_eq!(spec.headers["Accept"], "text/event-stream");
        assert_eq!(spec.headers["Cache-Control"], "no-cache");
        assert_eq!(spec.headers["content-type"], "application/json");
    }
}
