use crate::error::RequestError;
use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use std::collections::HashMap;

/// HTTP method for API endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Patch => Method::PATCH,
        }
    }
}

/// A fully-formed request: method, URL, headers and an optional body.
///
/// Both the one-shot executor and streaming sessions consume this type, so
/// header and body construction happens in exactly one place.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// A POST request carrying `body` serialized as JSON
    pub fn post_json<B: Serialize + ?Sized>(
        url: impl Into<String>,
        body: &B,
    ) -> Result<Self, RequestError> {
        Self::new(HttpMethod::Post, url).with_json(body)
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Merge a header map; entries already present are overwritten.
    #[must_use]
    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, RequestError> {
        let payload = serde_json::to_vec(body).map_err(|e| RequestError::Body(e.to_string()))?;
        Ok(self
            .with_header("content-type", "application/json")
            .with_body(payload))
    }

    /// Validate the URL and turn the spec into a reqwest request.
    pub fn build(&self, client: &reqwest::Client) -> Result<reqwest::RequestBuilder, RequestError> {
        let url = url::Url::parse(&self.url).map_err(|source| RequestError::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;

        let mut req = client.request(self.method.into(), url);

        for (key, value) in &self.headers {
            req = req.header(key, value);
        }

        if let Some(ref body) = self.body {
            tracing::trace!(
                method = ?self.method,
                url = %self.url,
                body = %String::from_utf8_lossy(body),
                "request body"
            );
            req = req.body(body.clone());
        }

        Ok(req)
    }
}
