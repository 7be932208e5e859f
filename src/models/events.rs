use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::responses::{ContentPart, OutputItem, ResponsesResponse};

// ============================================================================
// Responses API Streaming Event Models
// ============================================================================

/// Server-sent event emitted by the Responses API when `stream: true`.
///
/// Event names follow the wire `type` field. Anything that does not match a
/// modelled event lands in [`StreamEvent::Unknown`] with its full JSON, so new
/// upstream events neither break a stream nor lose their payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "response.created")]
    ResponseCreated {
        response: Box<ResponsesResponse>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "response.in_progress")]
    ResponseInProgress {
        response: Box<ResponsesResponse>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        output_index: usize,
        item: OutputItem,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        item_id: String,
        output_index: usize,
        content_index: usize,
        part: ContentPart,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        item_id: String,
        output_index: usize,
        content_index: usize,
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "response.output_text.done")]
    OutputTextDone {
        item_id: String,
        output_index: usize,
        content_index: usize,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        item_id: String,
        output_index: usize,
        content_index: usize,
        part: ContentPart,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        output_index: usize,
        item: OutputItem,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        item_id: String,
        output_index: usize,
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        item_id: String,
        output_index: usize,
        arguments: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "response.completed")]
    ResponseCompleted {
        response: Box<ResponsesResponse>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "response.incomplete")]
    ResponseIncomplete {
        response: Box<ResponsesResponse>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "response.failed")]
    ResponseFailed {
        response: Box<ResponsesResponse>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        param: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
    },
    #[serde(untagged)]
    Unknown(Value),
}

impl StreamEvent {
    /// Wire name of the event (`response.output_text.delta`, ...).
    pub fn event_type(&self) -> &str {
        match self {
            StreamEvent::ResponseCreated { .. } => "response.created",
            StreamEvent::ResponseInProgress { .. } => "response.in_progress",
            StreamEvent::OutputItemAdded { .. } => "response.output_item.added",
            StreamEvent::ContentPartAdded { .. } => "response.content_part.added",
            StreamEvent::OutputTextDelta { .. } => "response.output_text.delta",
            StreamEvent::OutputTextDone { .. } => "response.output_text.done",
            StreamEvent::ContentPartDone { .. } => "response.content_part.done",
            StreamEvent::OutputItemDone { .. } => "response.output_item.done",
            StreamEvent::FunctionCallArgumentsDelta { .. } => {
                "response.function_call_arguments.delta"
            }
            StreamEvent::FunctionCallArgumentsDone { .. } => {
                "response.function_call_arguments.done"
            }
            StreamEvent::ResponseCompleted { .. } => "response.completed",
            StreamEvent::ResponseIncomplete { .. } => "response.incomplete",
            StreamEvent::ResponseFailed { .. } => "response.failed",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Unknown(v) => v
                .get("type")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty() && !t.contains(['\r', '\n']))
                .unwrap_or("unknown"),
        }
    }

    /// Whether the event closes the response (no further output follows).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::ResponseCompleted { .. }
                | StreamEvent::ResponseIncomplete { .. }
                | StreamEvent::ResponseFailed { .. }
                | StreamEvent::Error { .. }
        )
    }

    /// Response snapshot carried by lifecycle events.
    pub fn response(&self) -> Option<&ResponsesResponse> {
        match self {
            StreamEvent::ResponseCreated { response, .. }
            | StreamEvent::ResponseInProgress { response, .. }
            | StreamEvent::ResponseCompleted { response, .. }
            | StreamEvent::ResponseIncomplete { response, .. }
            | StreamEvent::ResponseFailed { response, .. } => Some(response),
            _ => None,
        }
    }
}
