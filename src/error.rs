use thiserror::Error;

/// Errors surfaced by [`crate::client::ResponsesClient`] and the streaming layer.
#[derive(Error, Debug)]
pub enum ResponsesError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Stream error: {0}")]
    Stream(String),
    #[error("Unsupported provider '{0}'")]
    UnsupportedProvider(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ResponsesError {
    /// Build an upstream error from a non-2xx status and its raw body.
    ///
    /// OpenAI-style bodies (`{"error":{"message":...}}`) are reduced to the message;
    /// anything else is kept verbatim.
    pub fn upstream(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message").or(Some(e)))
                    .and_then(|m| m.as_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| body.trim().to_string());
        ResponsesError::Upstream { status, message }
    }

    /// Upstream HTTP status, when the error came from the provider.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ResponsesError::Upstream { status, .. } => Some(*status),
            ResponsesError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
