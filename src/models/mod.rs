//! Data models for the Responses API.
//!
//! - `responses`: request and response bodies for `POST /responses`.
//! - `events`: server-sent events emitted when `stream: true`.
//!
//! Reassembly of streamed events into a final response lives in `crate::stream`.

pub mod events;
pub mod responses;

pub use events::StreamEvent;
pub use responses::{
    ContentPart, FunctionCallItem, HiddenParams, InputItem, InputMessage, OutputItem,
    OutputMessage, ReasoningItem, ResponseInput, ResponsesRequest, ResponsesResponse,
    ResponsesUsage,
};
