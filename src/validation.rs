use serde_json::Value;
use thiserror::Error;

use crate::models::responses::{OutputItem, ResponsesResponse};
use crate::payload::{LoggingStatus, StandardLoggingPayload};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field}: logged {logged} != live {live}")]
    Mismatch {
        field: String,
        logged: String,
        live: String,
    },
    #[error("{0} missing from logging payload")]
    Missing(String),
}

fn mismatch(
    field: impl Into<String>,
    logged: impl ToString,
    live: impl ToString,
) -> ValidationError {
    ValidationError::Mismatch {
        field: field.into(),
        logged: logged.to_string(),
        live: live.to_string(),
    }
}

fn expect_eq<T: PartialEq + ToString>(
    field: &str,
    logged: T,
    live: T,
) -> Result<(), ValidationError> {
    if logged == live {
        Ok(())
    } else {
        Err(mismatch(field, logged, live))
    }
}

fn str_at<'a>(v: &'a Value, pointer: &str) -> &'a str {
    v.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

fn u64_at(v: &Value, pointer: &str) -> Option<u64> {
    v.pointer(pointer).and_then(Value::as_u64)
}

/// Compare a logged response (JSON) against the live response.
///
/// Checks `id`, `model`, `created_at`, the usage triple, the output length and,
/// for each output item in order, `role`, first content text and `status`
/// (messages) or `type` (other items).
pub fn validate_responses_match(
    logged: &Value,
    live: &ResponsesResponse,
) -> Result<(), ValidationError> {
    expect_eq("id", str_at(logged, "/id"), live.id.as_str())?;
    expect_eq("model", str_at(logged, "/model"), live.model.as_str())?;
    expect_eq(
        "created_at",
        u64_at(logged, "/created_at").unwrap_or_default(),
        live.created_at,
    )?;

    let usage = live.usage.clone().unwrap_or_default();
    for (field, value) in [
        ("usage.input_tokens", usage.input_tokens),
        ("usage.output_tokens", usage.output_tokens),
        ("usage.total_tokens", usage.total_tokens),
    ] {
        let pointer = format!("/{}", field.replace('.', "/"));
        expect_eq(field, u64_at(logged, &pointer).unwrap_or_default(), value)?;
    }

    let logged_output = logged
        .get("output")
        .and_then(Value::as_array)
        .ok_or_else(|| ValidationError::Missing("response.output".to_string()))?;
    expect_eq("output.len", logged_output.len(), live.output.len())?;

    for (idx, (logged_item, live_item)) in logged_output.iter().zip(&live.output).enumerate() {
        match live_item {
            OutputItem::Message(message) => {
                expect_eq(
                    &format!("output[{idx}].role"),
                    str_at(logged_item, "/role"),
                    message.role.as_str(),
                )?;
                expect_eq(
                    &format!("output[{idx}].content[0].text"),
                    str_at(logged_item, "/content/0/text"),
                    message.first_text().unwrap_or(""),
                )?;
                expect_eq(
                    &format!("output[{idx}].status"),
                    str_at(logged_item, "/status"),
                    message.status.as_deref().unwrap_or(""),
                )?;
            }
            other => {
                expect_eq(
                    &format!("output[{idx}].type"),
                    str_at(logged_item, "/type"),
                    other.item_type(),
                )?;
            }
        }
    }
    Ok(())
}

/// Check a success payload against the live response and the request that produced it.
///
/// `request_model` is the model name as sent (provider prefix allowed);
/// `expected_messages` is the JSON the payload's `messages` must equal.
pub fn validate_logging_payload(
    payload: &StandardLoggingPayload,
    live: &ResponsesResponse,
    request_model: &str,
    expected_messages: &Value,
) -> Result<(), ValidationError> {
    if payload.status != LoggingStatus::Success {
        return Err(mismatch(
            "status",
            payload.error_str.as_deref().unwrap_or("failure"),
            "success",
        ));
    }

    let usage = live.usage.clone().unwrap_or_default();
    expect_eq("prompt_tokens", payload.prompt_tokens, usage.input_tokens)?;
    expect_eq("completion_tokens", payload.completion_tokens, usage.output_tokens)?;
    expect_eq(
        "total_tokens",
        payload.total_tokens,
        payload.prompt_tokens + payload.completion_tokens,
    )?;
    if payload.total_tokens > 0 && payload.response_cost <= 0.0 {
        return Err(mismatch("response_cost", payload.response_cost, "> 0"));
    }

    expect_eq("id", payload.id.as_str(), live.id.as_str())?;
    let bare_model = request_model
        .split_once('/')
        .map(|(_, m)| m)
        .unwrap_or(request_model);
    expect_eq("model", payload.model.as_str(), bare_model)?;

    let messages = serde_json::to_value(&payload.messages).unwrap_or_default();
    if &messages != expected_messages {
        return Err(mismatch("messages", messages, expected_messages));
    }

    let logged = payload
        .response
        .as_ref()
        .ok_or_else(|| ValidationError::Missing("response".to_string()))?;
    validate_responses_match(logged, live)
}
