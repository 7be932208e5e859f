use std::time::Duration;

use crate::util::env_truthy;

/// Default upstream for the OpenAI provider.
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Outbound proxy settings for the HTTP client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxySettings {
    /// Disable every proxy, including `HTTP(S)_PROXY`.
    pub disabled: bool,
    /// Proxy for all schemes.
    pub all: Option<String>,
    pub http: Option<String>,
    pub https: Option<String>,
}

/// Connection settings for [`crate::client::ResponsesClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the Responses API; `/responses` is appended.
    pub api_base: String,
    /// Bearer token sent upstream. Optional for local gateways.
    pub api_key: Option<String>,
    /// Overall request timeout.
    pub timeout: Option<Duration>,
    pub proxy: ProxySettings,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            api_key: None,
            timeout: None,
            proxy: ProxySettings::default(),
            user_agent: format!("llm-responses/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ClientConfig {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build configuration from the environment.
    ///
    /// Environment:
    /// - OPENAI_BASE_URL / OPENAI_API_BASE         -> upstream base URL
    /// - OPENAI_API_KEY                            -> upstream bearer token
    /// - LLM_RESPONSES_HTTP_TIMEOUT_SECONDS        -> overall request timeout (u64)
    /// - LLM_RESPONSES_NO_PROXY = 1|true|yes|on    -> disable all proxies
    /// - LLM_RESPONSES_PROXY_URL = <url>           -> proxy for all schemes
    /// - HTTP_PROXY / http_proxy                   -> HTTP proxy
    /// - HTTPS_PROXY / https_proxy                 -> HTTPS proxy
    pub fn from_env() -> Self {
        let api_base = non_empty_env("OPENAI_BASE_URL")
            .or_else(|| non_empty_env("OPENAI_API_BASE"))
            .unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string());

        let timeout = non_empty_env("LLM_RESPONSES_HTTP_TIMEOUT_SECONDS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);

        let proxy = ProxySettings {
            disabled: env_truthy("LLM_RESPONSES_NO_PROXY"),
            all: non_empty_env("LLM_RESPONSES_PROXY_URL"),
            http: non_empty_env("HTTP_PROXY").or_else(|| non_empty_env("http_proxy")),
            https: non_empty_env("HTTPS_PROXY").or_else(|| non_empty_env("https_proxy")),
        };

        Self {
            api_base,
            api_key: non_empty_env("OPENAI_API_KEY"),
            timeout,
            proxy,
            ..Self::default()
        }
    }
}
