use axum::response::{IntoResponse, Response};
use http::StatusCode;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use crate::config::ClientConfig;

type FilterHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

static FILTER_HANDLE: OnceCell<FilterHandle> = OnceCell::new();
static VERBOSE: AtomicBool = AtomicBool::new(false);

const DEFAULT_FILTER: &str = "info,tower_http=info";

/// Initialize dotenv and structured tracing based on RUST_LOG.
///
/// - Supports explicit env file paths via ENV_FILE, ENVFILE, DOTENV_PATH
/// - Falls back to .envfile, then default .env discovery
/// - Logs the source used
///
/// The filter is reloadable so [`turn_on_debug`] can raise verbosity at runtime.
pub fn init_tracing() {
    let mut env_source: String = "none".into();
    for key in ["ENV_FILE", "ENVFILE", "DOTENV_PATH"] {
        if let Ok(p) = std::env::var(key) {
            let p = p.trim();
            if !p.is_empty()
                && std::path::Path::new(p).is_file()
                && dotenvy::from_filename(p).is_ok()
            {
                env_source = format!("{p} ({key})");
                break;
            }
        }
    }

    if env_source == "none"
        && std::path::Path::new(".envfile").is_file()
        && dotenvy::from_filename(".envfile").is_ok()
    {
        env_source = ".envfile".into();
    }

    if env_source == "none" && dotenvy::dotenv().is_ok() {
        env_source = ".env".into();
    }

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.into());
    let (filter_layer, handle) = reload::Layer::new(EnvFilter::new(filter));
    let installed = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .try_init()
        .is_ok();
    if installed {
        let _ = FILTER_HANDLE.set(handle);
    }

    if env_truthy("LLM_RESPONSES_DEBUG") {
        set_verbose(true);
    }

    tracing::info!("Environment loaded from: {}", env_source);
}

/// Toggle verbose mode.
///
/// Verbose mode switches the tracing filter to `debug` (when [`init_tracing`]
/// installed the subscriber) and makes the client log request and response bodies.
pub fn set_verbose(on: bool) {
    VERBOSE.store(on, Ordering::SeqCst);
    if let Some(handle) = FILTER_HANDLE.get() {
        let directive = if on {
            "debug".to_string()
        } else {
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.into())
        };
        if let Err(e) = handle.reload(EnvFilter::new(directive)) {
            tracing::warn!("Failed to reload log filter: {}", e);
        }
    }
}

/// Shorthand for `set_verbose(true)`.
pub fn turn_on_debug() {
    set_verbose(true);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// `1`, `true`, `yes` and `on` (any case) count as set.
pub fn env_truthy(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v.trim().to_ascii_lowercase())
        .map(|v| v == "1" || v == "true" || v == "yes" || v == "on")
        .unwrap_or(false)
}

/// Get the bind address for the HTTP server from env or default to 0.0.0.0:8088.
pub fn env_bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8088".into())
}

/// Build an HTTP client honoring the proxy, timeout and user agent settings.
pub fn build_http_client(config: &ClientConfig) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }

    let proxy = &config.proxy;
    if proxy.disabled {
        builder = builder.no_proxy();
    } else {
        if let Some(url) = proxy.all.as_deref() {
            match reqwest::Proxy::all(url) {
                Ok(p) => builder = builder.proxy(p),
                Err(e) => tracing::warn!("Ignoring invalid proxy URL {}: {}", url, e),
            }
        }
        if let Some(url) = proxy.http.as_deref() {
            if let Ok(p) = reqwest::Proxy::http(url) {
                builder = builder.proxy(p);
            }
        }
        if let Some(url) = proxy.https.as_deref() {
            if let Ok(p) = reqwest::Proxy::https(url) {
                builder = builder.proxy(p);
            }
        }
    }

    builder = builder.user_agent(config.user_agent.clone());

    builder.build().unwrap_or_else(|e| {
        tracing::warn!("Falling back to default HTTP client: {}", e);
        reqwest::Client::new()
    })
}

/// Build a JSON error response with the given HTTP status and message.
pub fn error_response(status: StatusCode, msg: &str) -> Response {
    let body = serde_json::json!({ "error": { "message": msg } });
    (status, axum::Json(body)).into_response()
}

/// Build a CORS layer from environment variables.
///
/// - CORS_ALLOWED_ORIGINS: comma-separated origins or "*"
/// - CORS_ALLOWED_METHODS: comma-separated methods or "*"
/// - CORS_ALLOWED_HEADERS: comma-separated header names or "*"
/// - CORS_ALLOW_CREDENTIALS: 1|true|yes|on
/// - CORS_MAX_AGE: max age in seconds (u64)
///
/// Unset variables default to Any.
pub fn cors_layer_from_env() -> tower_http::cors::CorsLayer {
    use std::time::Duration;
    use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};

    fn list(key: &str) -> Option<Vec<String>> {
        let raw = std::env::var(key).ok()?;
        let s = raw.trim();
        if s == "*" {
            return None;
        }
        let parts: Vec<String> = s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then_some(parts)
    }

    let mut layer = CorsLayer::new();

    let origins: Vec<http::HeaderValue> = list("CORS_ALLOWED_ORIGINS")
        .unwrap_or_default()
        .iter()
        .filter_map(|p| http::HeaderValue::from_str(p).ok())
        .collect();
    layer = if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    };

    let methods: Vec<http::Method> = list("CORS_ALLOWED_METHODS")
        .unwrap_or_default()
        .iter()
        .filter_map(|p| http::Method::from_bytes(p.to_ascii_uppercase().as_bytes()).ok())
        .collect();
    layer = if methods.is_empty() {
        layer.allow_methods(Any)
    } else {
        layer.allow_methods(AllowMethods::list(methods))
    };

    let headers: Vec<http::header::HeaderName> = list("CORS_ALLOWED_HEADERS")
        .unwrap_or_default()
        .iter()
        .filter_map(|p| http::header::HeaderName::try_from(p.as_str()).ok())
        .collect();
    layer = if headers.is_empty() {
        layer.allow_headers(Any)
    } else {
        layer.allow_headers(AllowHeaders::list(headers))
    };

    if env_truthy("CORS_ALLOW_CREDENTIALS") {
        layer = layer.allow_credentials(true);
    }

    if let Ok(secs) = std::env::var("CORS_MAX_AGE") {
        if let Ok(n) = secs.trim().parse::<u64>() {
            layer = layer.max_age(Duration::from_secs(n));
        }
    }

    layer
}
