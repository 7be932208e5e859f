use serde_json::{Map, Value};

use crate::models::responses::{InputItem, ResponseInput, ResponsesRequest};
use crate::payload::LoggedMessage;

/// Echo the request input as role/content pairs.
///
/// A bare string becomes a single user message; list input keeps each
/// message's role and content untouched. Non-message items (tool outputs,
/// item references, reasoning) are not echoed.
pub fn input_to_messages(input: &ResponseInput) -> Vec<LoggedMessage> {
    match input {
        ResponseInput::Text(text) => vec![LoggedMessage {
            content: Value::String(text.clone()),
            role: "user".to_string(),
        }],
        ResponseInput::Items(items) => items
            .iter()
            .filter_map(InputItem::as_message)
            .map(|m| LoggedMessage {
                content: m.content.clone(),
                role: m.role.clone(),
            })
            .collect(),
    }
}

/// Optional sampling and shaping parameters that were set on the request.
pub fn model_parameters(req: &ResponsesRequest) -> Map<String, Value> {
    let mut params = Map::new();

    if let Some(v) = req.temperature {
        params.insert("temperature".into(), Value::from(v));
    }
    if let Some(v) = req.top_p {
        params.insert("top_p".into(), Value::from(v));
    }
    if let Some(v) = req.max_output_tokens {
        params.insert("max_output_tokens".into(), Value::from(v));
    }
    if let Some(v) = req.instructions.as_ref() {
        params.insert("instructions".into(), Value::String(v.clone()));
    }
    if let Some(v) = req.previous_response_id.as_ref() {
        params.insert("previous_response_id".into(), Value::String(v.clone()));
    }
    if let Some(v) = req.tool_choice.as_ref() {
        params.insert("tool_choice".into(), v.clone());
    }
    if let Some(tools) = req.tools.as_ref() {
        params.insert("tools".into(), Value::Array(tools.clone()));
    }
    if let Some(v) = req.user.as_ref() {
        params.insert("user".into(), Value::String(v.clone()));
    }
    for (k, v) in &req.extra {
        params.insert(k.clone(), v.clone());
    }

    params
}
