use std::{collections::HashMap, fmt, path::PathBuf, time::Duration};

use bon::Builder;

use crate::{OpenAIKitError, endpoint::DEFAULT_BASE_URL};

/// Default bound on one-shot requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const ORGANIZATION_VAR: &str = "OPENAI_ORGANIZATION";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const TIMEOUT_VAR: &str = "OPENAI_TIMEOUT_SECS";
pub const PINNED_CERT_VAR: &str = "OPENAI_PINNED_CERT";

/// Client configuration
#[derive(Clone, Builder)]
pub struct KitConfig {
    /// API key sent as a bearer token
    #[builder(into)]
    pub api_token: String,

    /// Sent as `OpenAI-Organization` when set
    #[builder(into)]
    pub organization: Option<String>,

    /// Base URL for the API (allows for custom endpoints)
    #[builder(default = DEFAULT_BASE_URL.to_string(), into)]
    pub base_url: String,

    /// Bound on one-shot requests. Streaming requests are never bounded.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,

    /// PEM or DER certificate the server must present
    #[builder(into)]
    pub pinned_certificate: Option<PathBuf>,

    /// Sent with every request, after the base headers
    #[builder(default)]
    pub extra_headers: HashMap<String, String>,
}

impl fmt::Debug for KitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KitConfig")
            .field("api_token", &"<redacted>")
            .field("organization", &self.organization)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("pinned_certificate", &self.pinned_certificate)
            .field("extra_headers", &self.extra_headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl KitConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, OpenAIKitError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`KitConfig::from_env`] over an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OpenAIKitError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_token = non_empty(API_KEY_VAR).ok_or(OpenAIKitError::MissingApiKey)?;

        let timeout = match non_empty(TIMEOUT_VAR) {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| {
                    OpenAIKitError::InvalidConfig(format!("{TIMEOUT_VAR}={raw:?}: {e}"))
                })?;
                if secs == 0 {
                    return Err(OpenAIKitError::InvalidConfig(format!(
                        "{TIMEOUT_VAR} must be positive"
                    )));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            api_token,
            organization: non_empty(ORGANIZATION_VAR),
            base_url: non_empty(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout,
            pinned_certificate: non_empty(PINNED_CERT_VAR).map(PathBuf::from),
            extra_headers: HashMap::new(),
        })
    }

    /// Headers sent with every request
    pub fn base_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_token),
        );
        if let Some(ref organization) = self.organization {
            headers.insert("OpenAI-Organization".to_string(), organization.clone());
        }
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.extend(
            self.extra_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        headers
    }
}
