use openai_kit_core::HttpMethod;

/// Default host for all endpoints
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// API routes the client knows how to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Endpoint {
    Completions,
    ChatCompletions,
    Edits,
    ImageGenerations,
    ImageEdits,
}

impl Endpoint {
    pub fn route(self) -> &'static str {
        match self {
            Endpoint::Completions => "/v1/completions",
            Endpoint::ChatCompletions => "/v1/chat/completions",
            Endpoint::Edits => "/v1/edits",
            Endpoint::ImageGenerations => "/v1/images/generations",
            Endpoint::ImageEdits => "/v1/images/edits",
        }
    }

    pub fn method(self) -> HttpMethod {
        HttpMethod::Post
    }

    /// Full URL of this route under `base_url`
    pub fn url(self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.route())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_under_default_base() {
        assert_eq!(
            Endpoint::ChatCompletions.url(DEFAULT_BASE_URL),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            Endpoint::ImageGenerations.url(DEFAULT_BASE_URL),
            "https://api.openai.com/v1/images/generations"
        );
    }

    #[test]
    fn test_custom_base_with_trailing_slash() {
        assert_eq!(
            Endpoint::Edits.url("http://localhost:8080/"),
            "http://localhost:8080/v1/edits"
        );
        assert_eq!(Endpoint::ImageEdits.method(), HttpMethod::Post);
    }
}
