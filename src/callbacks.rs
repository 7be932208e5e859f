
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::models::responses::ResponsesResponse;
use crate::payload::{RequestContext, StandardLoggingPayload};
use crate::pricing::PricingConfig;

/// Everything a logger receives for one call.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub standard_logging_object: StandardLoggingPayload,
    /// The provider response, when one was produced.
    pub response: Option<ResponsesResponse>,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
}

/// Hook invoked after every call. Both methods default to no-ops.
#[async_trait]
pub trait CustomLogger: Send + Sync {
    async fn log_success_event(&self, _event: &LogEvent) -> anyhow::Result<()> {
        Ok(())
    }

    async fn log_failure_event(&self, _event: &LogEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

static CALLBACKS: Lazy<RwLock<Vec<Arc<dyn CustomLogger>>>> =
    Lazy::new(|| RwLock::new(Vec::new()));

/// Replace the global logger list.
pub fn set_callbacks(loggers: Vec<Arc<dyn CustomLogger>>) {
    let mut guard = CALLBACKS.write().unwrap_or_else(|e| e.into_inner());
    *guard = loggers;
}

pub fn add_callback(logger: Arc<dyn CustomLogger>) {
    CALLBACKS
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .push(logger);
}

pub fn clear_callbacks() {
    CALLBACKS.write().unwrap_or_else(|e| e.into_inner()).clear();
}

/// Snapshot of the global logger list.
pub fn callbacks() -> Vec<Arc<dyn CustomLogger>> {
    CALLBACKS.read().unwrap_or_else(|e| e.into_inner()).clone()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
}

/// Builds payloads and fans them out to global and client-local loggers.
#[derive(Clone)]
pub struct LoggingDispatcher {
    pricing: Arc<PricingConfig>,
    local: Arc<RwLock<Vec<Arc<dyn CustomLogger>>>>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl LoggingDispatcher {
    pub fn new(pricing: Arc<PricingConfig>) -> Self {
        Self {
            pricing,
            local: Arc::new(RwLock::new(Vec::new())),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    pub fn set_pricing(&mut self, pricing: Arc<PricingConfig>) {
        self.pricing = pricing;
    }

    pub fn add_local(&self, logger: Arc<dyn CustomLogger>) {
        self.local
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(logger);
    }

    fn loggers(&self) -> Vec<Arc<dyn CustomLogger>> {
        let mut all = callbacks();
        all.extend(
            self.local
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .cloned(),
        );
        all
    }

    /// Record a successful call.
    ///
    /// Fills `response.hidden_params` (call id, provider, api base, cost) and returns
    /// the payload handed to loggers.
    pub fn log_success(
        &self,
        ctx: &RequestContext,
        response: &mut ResponsesResponse,
        end_time: SystemTime,
        completion_start_time: Option<SystemTime>,
    ) -> StandardLoggingPayload {
        let payload = StandardLoggingPayload::success(
            ctx,
            response,
            &self.pricing,
            end_time,
            completion_start_time,
        );

        response.hidden_params.call_id = Some(ctx.call_id.clone());
        response.hidden_params.custom_llm_provider = Some(ctx.provider.clone());
        response.hidden_params.api_base = Some(ctx.api_base.clone());
        response.hidden_params.response_cost = Some(payload.response_cost);

        tracing::debug!(
            call_id = %ctx.call_id,
            response_id = %payload.id,
            total_tokens = payload.total_tokens,
            response_cost = payload.response_cost,
            "responses call succeeded"
        );

        self.spawn(
            Outcome::Success,
            LogEvent {
                standard_logging_object: payload.clone(),
                response: Some(response.clone()),
                start_time: ctx.start_time,
                end_time,
            },
        );
        payload
    }

    /// Record a failed call.
    pub fn log_failure(
        &self,
        ctx: &RequestContext,
        error: &str,
        response: Option<&ResponsesResponse>,
        end_time: SystemTime,
    ) -> StandardLoggingPayload {
        let payload = StandardLoggingPayload::failure(ctx, error, response, end_time);

        tracing::warn!(call_id = %ctx.call_id, error = %error, "responses call failed");

        self.spawn(
            Outcome::Failure,
            LogEvent {
                standard_logging_object: payload.clone(),
                response: response.cloned(),
                start_time: ctx.start_time,
                end_time,
            },
        );
        payload
    }

    fn spawn(&self, outcome: Outcome, event: LogEvent) {
        let loggers = self.loggers();
        if loggers.is_empty() {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No tokio runtime available; dropping logging event");
                return;
            }
        };

        let handle = runtime.spawn(async move {
            for logger in loggers {
                let result = match outcome {
                    Outcome::Success => logger.log_success_event(&event).await,
                    Outcome::Failure => logger.log_failure_event(&event).await,
                };
                if let Err(e) = result {
                    tracing::warn!("Logging callback failed: {}", e);
                }
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait until every logging task spawned so far has completed.
    pub async fn wait(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *pending)
            };
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!("Logging task panicked: {}", e);
                }
            }
        }
    }
}

impl std::fmt::Debug for LoggingDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let local = self.local.read().map(|l| l.len()).unwrap_or(0);
        f.debug_struct("LoggingDispatcher")
            .field("local_loggers", &local)
            .finish_non_exhaustive()
    }
}

/// Logger that keeps the most recent payloads and lets callers await them.
#[derive(Default)]
pub struct CapturingLogger {
    success: Mutex<Option<StandardLoggingPayload>>,
    failure: Mutex<Option<StandardLoggingPayload>>,
    success_count: AtomicUsize,
    failure_count: AtomicUsize,
    notify: Notify,
}

impl CapturingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_success(&self) -> Option<StandardLoggingPayload> {
        self.success
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last_failure(&self) -> Option<StandardLoggingPayload> {
        self.failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn success_count(&self) -> usize {
        self.success_count.load(Ordering::SeqCst)
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::SeqCst)
    }

    /// Wait for a success payload, giving up after `timeout`.
    pub async fn wait_for_success(&self, timeout: Duration) -> Option<StandardLoggingPayload> {
        self.wait_for(timeout, Self::last_success).await
    }

    /// Wait for a failure payload, giving up after `timeout`.
    pub async fn wait_for_failure(&self, timeout: Duration) -> Option<StandardLoggingPayload> {
        self.wait_for(timeout, Self::last_failure).await
    }

    async fn wait_for(
        &self,
        timeout: Duration,
        read: fn(&Self) -> Option<StandardLoggingPayload>,
    ) -> Option<StandardLoggingPayload> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register interest before checking so a store in between is not missed.
            let notified = self.notify.notified();
            if let Some(payload) = read(self) {
                return Some(payload);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return read(self);
            }
        }
    }
}

#[async_trait]
impl CustomLogger for CapturingLogger {
    async fn log_success_event(&self, event: &LogEvent) -> anyhow::Result<()> {
        *self.success.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(event.standard_logging_object.clone());
        self.success_count.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn log_failure_event(&self, event: &LogEvent) -> anyhow::Result<()> {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(event.standard_logging_object.clone());
        self.failure_count.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::models::responses::ResponsesRequest;
    use crate::provider::resolve;
    use serde_json::json;

    struct FailingLogger;

    #[async_trait]
    impl CustomLogger for FailingLogger {
        async fn log_success_event(&self, _event: &LogEvent) -> anyhow::Result<()> {
            anyhow::bail!("sink unavailable")
        }
    }

    fn ctx() -> RequestContext {
        let cfg = ClientConfig::new("http://127.0.0.1:9/v1");
        RequestContext::new(
            &ResponsesRequest::new("gpt-4o", "hi"),
            &resolve("gpt-4o", &cfg).unwrap(),
        )
    }

    fn response() -> ResponsesResponse {
        serde_json::from_value(json!({
            "id": "resp_1",
            "created_at": 1,
            "model": "gpt-4o",
            "status": "completed",
            "output": [],
            "usage": {"input_tokens": 3, "output_tokens": 4, "total_tokens": 7}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn dispatch_reaches_local_logger_and_fills_hidden_params() {
        let dispatcher = LoggingDispatcher::new(Arc::new(PricingConfig::default()));
        let logger = Arc::new(CapturingLogger::new());
        dispatcher.add_local(logger.clone());
        dispatcher.add_local(Arc::new(FailingLogger));

        let mut resp = response();
        let payload = dispatcher.log_success(&ctx(), &mut resp, SystemTime::now(), None);
        dispatcher.wait().await;

        assert_eq!(logger.success_count(), 1);
        assert_eq!(logger.last_success(), Some(payload.clone()));
        assert_eq!(resp.hidden_params.response_cost, Some(payload.response_cost));
        assert_eq!(resp.hidden_params.custom_llm_provider.as_deref(), Some("openai"));
    }

    #[tokio::test]
    async fn failure_goes_to_failure_hook() {
        let dispatcher = LoggingDispatcher::new(Arc::new(PricingConfig::default()));
        let logger = Arc::new(CapturingLogger::new());
        dispatcher.add_local(logger.clone());

        dispatcher.log_failure(&ctx(), "Upstream returned 500: oops", None, SystemTime::now());
        let payload = logger
            .wait_for_failure(Duration::from_secs(5))
            .await
            .expect("failure payload");

        assert_eq!(payload.error_str.as_deref(), Some("Upstream returned 500: oops"));
        assert_eq!(logger.success_count(), 0);
    }

    #[tokio::test]
    async fn wait_for_success_times_out_without_events() {
        let logger = CapturingLogger::new();
        let got = logger.wait_for_success(Duration::from_millis(20)).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn wait_returns_immediately_without_loggers() {
        let dispatcher = LoggingDispatcher::new(Arc::new(PricingConfig::default()));
        let mut resp = response();
        dispatcher.log_success(&ctx(), &mut resp, SystemTime::now(), None);
        dispatcher.wait().await;
        assert!(resp.hidden_params.response_cost.unwrap() > 0.0);
    }
}
