use http::header;
use std::sync::Arc;
use std::time::SystemTime;

use crate::callbacks::{CustomLogger, LoggingDispatcher};
use crate::config::ClientConfig;
use crate::error::ResponsesError;
use crate::models::responses::{ResponsesRequest, ResponsesResponse};
use crate::payload::RequestContext;
use crate::pricing::PricingConfig;
use crate::provider::{self, ProviderRoute};
use crate::stream::{decode_sse, ResponsesStream};
use crate::util::{build_http_client, is_verbose};

/// Result of [`ResponsesClient::aresponses`]: a full response, or a stream of
/// events when the request asked for streaming.
#[derive(Debug)]
pub enum ResponsesOutcome {
    Response(Box<ResponsesResponse>),
    Stream(ResponsesStream),
}

impl ResponsesOutcome {
    pub fn is_stream(&self) -> bool {
        matches!(self, ResponsesOutcome::Stream(_))
    }

    pub fn into_response(self) -> Option<ResponsesResponse> {
        match self {
            ResponsesOutcome::Response(r) => Some(*r),
            ResponsesOutcome::Stream(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<ResponsesStream> {
        match self {
            ResponsesOutcome::Stream(s) => Some(s),
            ResponsesOutcome::Response(_) => None,
        }
    }
}

/// Client for `POST {api_base}/responses`.
///
/// Every call is logged through the global callbacks plus any logger added with
/// [`ResponsesClient::with_callback`]. Logging runs in the background; await
/// [`ResponsesClient::wait_for_logging`] before inspecting what loggers received.
#[derive(Debug, Clone)]
pub struct ResponsesClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    dispatcher: LoggingDispatcher,
}

impl ResponsesClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: build_http_client(&config),
            config: Arc::new(config),
            dispatcher: LoggingDispatcher::new(Arc::new(PricingConfig::default())),
        }
    }

    /// Client configured from the environment, with pricing from
    /// `LLM_RESPONSES_PRICING_CONFIG` when set.
    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env()).with_pricing(PricingConfig::from_env())
    }

    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.dispatcher.set_pricing(Arc::new(pricing));
        self
    }

    /// Register a logger for calls made through this client (and its clones).
    pub fn with_callback(self, logger: Arc<dyn CustomLogger>) -> Self {
        self.dispatcher.add_local(logger);
        self
    }

    pub fn add_callback(&self, logger: Arc<dyn CustomLogger>) {
        self.dispatcher.add_local(logger);
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pricing(&self) -> &PricingConfig {
        self.dispatcher.pricing()
    }

    /// Resolves once every logging task started by this client has finished.
    pub async fn wait_for_logging(&self) {
        self.dispatcher.wait().await;
    }

    /// Send a Responses API request.
    ///
    /// Streaming requests (`stream: true`) yield [`ResponsesOutcome::Stream`];
    /// everything else yields [`ResponsesOutcome::Response`].
    pub async fn aresponses(
        &self,
        request: ResponsesRequest,
    ) -> Result<ResponsesOutcome, ResponsesError> {
        let route = provider::resolve(&request.model, &self.config)?;
        let ctx = RequestContext::new(&request, &route);

        let mut upstream = request;
        upstream.model = route.model.clone();

        match self.send(&route, &upstream).await {
            Ok(resp) if ctx.stream => {
                let events = decode_sse(resp);
                Ok(ResponsesOutcome::Stream(ResponsesStream::new(
                    events,
                    self.dispatcher.clone(),
                    ctx,
                )))
            }
            Ok(resp) => match self.read_response(resp).await {
                Ok(mut response) => {
                    self.dispatcher
                        .log_success(&ctx, &mut response, SystemTime::now(), None);
                    Ok(ResponsesOutcome::Response(Box::new(response)))
                }
                Err(e) => {
                    self.dispatcher
                        .log_failure(&ctx, &e.to_string(), None, SystemTime::now());
                    Err(e)
                }
            },
            Err(e) => {
                self.dispatcher
                    .log_failure(&ctx, &e.to_string(), None, SystemTime::now());
                Err(e)
            }
        }
    }

    /// Non-streaming call; any `stream` flag on the request is cleared.
    pub async fn create(
        &self,
        request: ResponsesRequest,
    ) -> Result<ResponsesResponse, ResponsesError> {
        match self.aresponses(request.with_stream(false)).await? {
            ResponsesOutcome::Response(r) => Ok(*r),
            ResponsesOutcome::Stream(s) => s.collect_response().await,
        }
    }

    /// Streaming call; the request's `stream` flag is forced on.
    pub async fn create_stream(
        &self,
        request: ResponsesRequest,
    ) -> Result<ResponsesStream, ResponsesError> {
        match self.aresponses(request.with_stream(true)).await? {
            ResponsesOutcome::Stream(s) => Ok(s),
            ResponsesOutcome::Response(_) => Err(ResponsesError::Stream(
                "upstream answered a streaming request with a plain response".to_string(),
            )),
        }
    }

    async fn send(
        &self,
        route: &ProviderRoute,
        body: &ResponsesRequest,
    ) -> Result<reqwest::Response, ResponsesError> {
        let url = route.responses_url();
        if is_verbose() {
            tracing::debug!(
                url = %url,
                body = %serde_json::to_string(body).unwrap_or_default(),
                "responses request"
            );
        } else {
            tracing::debug!(
                url = %url,
                model = %body.model,
                stream = body.is_stream(),
                "responses request"
            );
        }

        let mut rb = self
            .http
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body);
        if body.is_stream() {
            rb = rb.header(header::ACCEPT, "text/event-stream");
        }
        if let Some(key) = self.config.api_key.as_deref() {
            rb = rb.bearer_auth(key);
        }

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ResponsesError::upstream(status.as_u16(), &text));
        }
        Ok(resp)
    }

    async fn read_response(
        &self,
        resp: reqwest::Response,
    ) -> Result<ResponsesResponse, ResponsesError> {
        let bytes = resp.bytes().await?;
        if is_verbose() {
            tracing::debug!(body = %String::from_utf8_lossy(&bytes), "responses response");
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
