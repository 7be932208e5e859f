use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::conversion::{input_to_messages, model_parameters};
use crate::models::responses::{ResponsesRequest, ResponsesResponse};
use crate::pricing::PricingConfig;
use crate::provider::ProviderRoute;

/// Call type recorded for every Responses API call.
pub const CALL_TYPE_ARESPONSES: &str = "aresponses";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingStatus {
    Success,
    Failure,
}

/// Request message echoed into the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedMessage {
    pub content: Value,
    pub role: String,
}

/// Normalized record of one request/response pair, used for cost and usage tracking.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardLoggingPayload {
    /// Provider response id; a generated id when the call failed before a response existed
    pub id: String,
    /// Client-side call id, unique per request
    pub trace_id: String,
    pub call_type: String,
    pub stream: bool,
    pub status: LoggingStatus,

    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// Total cost in USD
    pub response_cost: f64,
    #[serde(default)]
    pub response_cost_failure_debug_info: Option<String>,

    /// Epoch seconds
    pub start_time: f64,
    pub end_time: f64,
    /// First streamed event for streaming calls, `end_time` otherwise
    pub completion_start_time: f64,
    /// `end_time - start_time`, in seconds
    pub response_time: f64,

    /// Requested model without provider prefix
    pub model: String,
    pub custom_llm_provider: String,
    pub api_base: String,

    pub messages: Vec<LoggedMessage>,
    /// Copy of the provider response
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub model_parameters: Map<String, Value>,
    #[serde(default)]
    pub error_str: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Request-side facts captured when a call starts.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub call_id: String,
    pub model: String,
    pub provider: String,
    pub api_base: String,
    pub stream: bool,
    pub messages: Vec<LoggedMessage>,
    pub model_parameters: Map<String, Value>,
    pub metadata: Map<String, Value>,
    pub start_time: SystemTime,
}

impl RequestContext {
    pub fn new(request: &ResponsesRequest, route: &ProviderRoute) -> Self {
        Self {
            call_id: generate_call_id(),
            model: route.model.clone(),
            provider: route.provider.clone(),
            api_base: route.api_base.clone(),
            stream: request.is_stream(),
            messages: input_to_messages(&request.input),
            model_parameters: model_parameters(request),
            metadata: request.metadata.clone().unwrap_or_default(),
            start_time: SystemTime::now(),
        }
    }
}

impl StandardLoggingPayload {
    /// Payload for a completed call. Usage and cost come from `response`.
    pub fn success(
        ctx: &RequestContext,
        response: &ResponsesResponse,
        pricing: &PricingConfig,
        end_time: SystemTime,
        completion_start_time: Option<SystemTime>,
    ) -> Self {
        let usage = response.usage.clone().unwrap_or_default();
        let prompt_tokens = usage.input_tokens;
        let completion_tokens = usage.output_tokens;

        // Requested name first, then the dated name the provider answered with.
        let cost = pricing
            .calculate_cost(
                &ctx.model,
                prompt_tokens,
                completion_tokens,
                usage.cached_tokens(),
                usage.reasoning_tokens(),
            )
            .or_else(|| {
                pricing.calculate_cost(
                    &response.model,
                    prompt_tokens,
                    completion_tokens,
                    usage.cached_tokens(),
                    usage.reasoning_tokens(),
                )
            });
        let (response_cost, response_cost_failure_debug_info) = match cost {
            Some(c) => (c.total_cost, None),
            None => (
                0.0,
                Some(format!(
                    "no pricing configured for model '{}' (response model '{}')",
                    ctx.model, response.model
                )),
            ),
        };

        let mut payload = Self::base(ctx, LoggingStatus::Success, end_time, completion_start_time);
        payload.id = response.id.clone();
        payload.prompt_tokens = prompt_tokens;
        payload.completion_tokens = completion_tokens;
        payload.total_tokens = prompt_tokens + completion_tokens;
        payload.response_cost = response_cost;
        payload.response_cost_failure_debug_info = response_cost_failure_debug_info;
        payload.response = serde_json::to_value(response).ok();
        payload
    }

    /// Payload for a call that errored before or during the response.
    pub fn failure(
        ctx: &RequestContext,
        error: &str,
        response: Option<&ResponsesResponse>,
        end_time: SystemTime,
    ) -> Self {
        let mut payload = Self::base(ctx, LoggingStatus::Failure, end_time, None);
        if let Some(resp) = response {
            payload.id = resp.id.clone();
            payload.response = serde_json::to_value(resp).ok();
        }
        payload.error_str = Some(error.to_string());
        payload
    }

    fn base(
        ctx: &RequestContext,
        status: LoggingStatus,
        end_time: SystemTime,
        completion_start_time: Option<SystemTime>,
    ) -> Self {
        let start = epoch_seconds(ctx.start_time);
        let end = epoch_seconds(end_time);
        Self {
            id: ctx.call_id.clone(),
            trace_id: ctx.call_id.clone(),
            call_type: CALL_TYPE_ARESPONSES.to_string(),
            stream: ctx.stream,
            status,
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            response_cost: 0.0,
            response_cost_failure_debug_info: None,
            start_time: start,
            end_time: end,
            completion_start_time: completion_start_time.map(epoch_seconds).unwrap_or(end),
            response_time: (end - start).max(0.0),
            model: ctx.model.clone(),
            custom_llm_provider: ctx.provider.clone(),
            api_base: ctx.api_base.clone(),
            messages: ctx.messages.clone(),
            response: None,
            model_parameters: ctx.model_parameters.clone(),
            error_str: None,
            metadata: ctx.metadata.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == LoggingStatus::Success
    }

    /// Dictionary view of the payload, for index-style inspection.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Helper to create a call id
pub fn generate_call_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Seconds since the Unix epoch with sub-second precision
pub fn epoch_seconds(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs_f64()
}
