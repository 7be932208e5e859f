use crate::config::ClientConfig;
use crate::error::ResponsesError;

/// Providers reachable through the Responses API route.
pub const SUPPORTED_PROVIDERS: &[&str] = &["openai"];

/// Where a request is sent and under which model name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRoute {
    /// Provider name recorded as `custom_llm_provider`.
    pub provider: String,
    /// Model name forwarded upstream (provider prefix removed).
    pub model: String,
    pub api_base: String,
}

/// Split an optional `provider/` prefix off `model` and pick the upstream base.
///
/// `gpt-4o` and `openai/gpt-4o` both route to OpenAI as `gpt-4o`.
pub fn resolve(model: &str, config: &ClientConfig) -> Result<ProviderRoute, ResponsesError> {
    let model = model.trim();
    if model.is_empty() {
        return Err(ResponsesError::Config("model must not be empty".to_string()));
    }

    let (provider, bare_model) = match model.split_once('/') {
        Some((prefix, rest)) => (prefix.to_ascii_lowercase(), rest),
        None => ("openai".to_string(), model),
    };

    if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
        return Err(ResponsesError::UnsupportedProvider(provider));
    }
    if bare_model.is_empty() {
        return Err(ResponsesError::Config(format!(
            "model name missing after provider prefix in '{model}'"
        )));
    }

    Ok(ProviderRoute {
        provider,
        model: bare_model.to_string(),
        api_base: config.api_base.trim_end_matches('/').to_string(),
    })
}

impl ProviderRoute {
    pub fn responses_url(&self) -> String {
        format!("{}/responses", self.api_base)
    }
}
