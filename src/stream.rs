use eventsource_stream::Eventsource;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::SystemTime;

use crate::callbacks::LoggingDispatcher;
use crate::error::ResponsesError;
use crate::models::events::StreamEvent;
use crate::models::responses::{ContentPart, OutputItem, OutputMessage, ResponsesResponse};
use crate::payload::RequestContext;

/// Parse the `data:` field of one SSE frame.
///
/// Empty frames and the `[DONE]` sentinel yield `Ok(None)`.
pub fn parse_sse_data(data: &str) -> Result<Option<StreamEvent>, ResponsesError> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }
    serde_json::from_str(data)
        .map(Some)
        .map_err(|e| ResponsesError::Stream(format!("invalid stream event: {e}")))
}

/// Decode an upstream `text/event-stream` body into typed events.
pub fn decode_sse(
    response: reqwest::Response,
) -> BoxStream<'static, Result<StreamEvent, ResponsesError>> {
    response
        .bytes_stream()
        .eventsource()
        .filter_map(|frame| async move {
            match frame {
                Ok(event) => parse_sse_data(&event.data).transpose(),
                Err(e) => Some(Err(ResponsesError::Stream(e.to_string()))),
            }
        })
        .boxed()
}

/// Rebuilds the final response from streamed events.
#[derive(Debug, Clone, Default)]
pub struct StreamAccumulator {
    snapshot: Option<ResponsesResponse>,
    items: BTreeMap<usize, OutputItem>,
    terminal: Option<ResponsesResponse>,
    failed: bool,
    error: Option<String>,
    events_seen: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    pub fn push(&mut self, event: &StreamEvent) {
        self.events_seen += 1;
        match event {
            StreamEvent::ResponseCreated { response, .. }
            | StreamEvent::ResponseInProgress { response, .. } => {
                self.snapshot = Some((**response).clone());
            }
            StreamEvent::OutputItemAdded {
                output_index, item, ..
            }
            | StreamEvent::OutputItemDone {
                output_index, item, ..
            } => {
                self.items.insert(*output_index, item.clone());
            }
            StreamEvent::ContentPartAdded {
                item_id,
                output_index,
                content_index,
                part,
                ..
            }
            | StreamEvent::ContentPartDone {
                item_id,
                output_index,
                content_index,
                part,
                ..
            } => {
                if let Some(slot) = self.content_slot(item_id, *output_index, *content_index) {
                    *slot = part.clone();
                }
            }
            StreamEvent::OutputTextDelta {
                item_id,
                output_index,
                content_index,
                delta,
                ..
            } => {
                if let Some(text) = self.text_slot(item_id, *output_index, *content_index) {
                    text.push_str(delta);
                }
            }
            StreamEvent::OutputTextDone {
                item_id,
                output_index,
                content_index,
                text,
                ..
            } => {
                if let Some(slot) = self.text_slot(item_id, *output_index, *content_index) {
                    *slot = text.clone();
                }
            }
            StreamEvent::FunctionCallArgumentsDelta {
                output_index,
                delta,
                ..
            } => {
                if let Some(OutputItem::FunctionCall(call)) = self.items.get_mut(output_index) {
                    call.arguments.push_str(delta);
                }
            }
            StreamEvent::FunctionCallArgumentsDone {
                output_index,
                arguments,
                ..
            } => {
                if let Some(OutputItem::FunctionCall(call)) = self.items.get_mut(output_index) {
                    call.arguments = arguments.clone();
                }
            }
            StreamEvent::ResponseCompleted { response, .. }
            | StreamEvent::ResponseIncomplete { response, .. } => {
                self.terminal = Some((**response).clone());
            }
            StreamEvent::ResponseFailed { response, .. } => {
                self.failed = true;
                if self.error.is_none() {
                    self.error = response.error_message();
                }
                self.terminal = Some((**response).clone());
            }
            StreamEvent::Error { message, .. } => {
                self.failed = true;
                self.error = Some(message.clone());
            }
            StreamEvent::Unknown(_) => {}
        }
    }

    fn message_at(&mut self, item_id: &str, output_index: usize) -> Option<&mut OutputMessage> {
        let item = self.items.entry(output_index).or_insert_with(|| {
            OutputItem::Message(OutputMessage {
                id: item_id.to_string(),
                role: "assistant".to_string(),
                status: Some("in_progress".to_string()),
                content: Vec::new(),
                extra: Default::default(),
            })
        });
        match item {
            OutputItem::Message(message) => Some(message),
            _ => None,
        }
    }

    fn content_slot(
        &mut self,
        item_id: &str,
        output_index: usize,
        content_index: usize,
    ) -> Option<&mut ContentPart> {
        let message = self.message_at(item_id, output_index)?;
        while message.content.len() <= content_index {
            message.content.push(ContentPart::output_text(""));
        }
        message.content.get_mut(content_index)
    }

    fn text_slot(
        &mut self,
        item_id: &str,
        output_index: usize,
        content_index: usize,
    ) -> Option<&mut String> {
        match self.content_slot(item_id, output_index, content_index)? {
            ContentPart::OutputText { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Whether the stream reported `response.failed` or an `error` event.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The reassembled response.
    ///
    /// The terminal snapshot wins when the provider sent one; otherwise the
    /// `response.created` snapshot is filled with the accumulated items.
    pub fn finish(self) -> Option<ResponsesResponse> {
        let items: Vec<OutputItem> = self.items.into_values().collect();
        if let Some(mut done) = self.terminal {
            if done.output.is_empty() && !items.is_empty() {
                done.output = items;
            }
            return Some(done);
        }
        let mut base = self.snapshot?;
        base.output = items;
        Some(base)
    }
}

struct StreamLogging {
    dispatcher: LoggingDispatcher,
    context: RequestContext,
}

/// Stream of Responses API events that logs the reassembled response once exhausted.
///
/// Logging fires when the upstream stream ends or errors. Dropping the stream
/// before that point logs nothing.
pub struct ResponsesStream {
    inner: BoxStream<'static, Result<StreamEvent, ResponsesError>>,
    accumulator: StreamAccumulator,
    logging: Option<StreamLogging>,
    first_event_at: Option<SystemTime>,
    final_response: Option<ResponsesResponse>,
    failure: Option<String>,
    finished: bool,
}

impl ResponsesStream {
    pub fn new(
        inner: BoxStream<'static, Result<StreamEvent, ResponsesError>>,
        dispatcher: LoggingDispatcher,
        context: RequestContext,
    ) -> Self {
        Self {
            inner,
            accumulator: StreamAccumulator::new(),
            logging: Some(StreamLogging {
                dispatcher,
                context,
            }),
            first_event_at: None,
            final_response: None,
            failure: None,
            finished: false,
        }
    }

    /// Stream without logging, e.g. over pre-recorded events.
    pub fn unlogged(inner: BoxStream<'static, Result<StreamEvent, ResponsesError>>) -> Self {
        Self {
            inner,
            accumulator: StreamAccumulator::new(),
            logging: None,
            first_event_at: None,
            final_response: None,
            failure: None,
            finished: false,
        }
    }

    /// Reassembled response, available after the stream is exhausted.
    pub fn final_response(&self) -> Option<&ResponsesResponse> {
        self.final_response.as_ref()
    }

    /// Drain the stream and return the reassembled response.
    pub async fn collect_response(mut self) -> Result<ResponsesResponse, ResponsesError> {
        while let Some(event) = self.next().await {
            event?;
        }
        if let Some(error) = self.failure.take() {
            return Err(ResponsesError::Stream(error));
        }
        self.final_response
            .take()
            .ok_or_else(|| ResponsesError::Stream("stream ended without a response".to_string()))
    }

    fn finish(&mut self, stream_error: Option<String>) {
        self.finished = true;
        let end_time = SystemTime::now();
        let accumulator = std::mem::take(&mut self.accumulator);
        let failure = stream_error.or_else(|| {
            accumulator.is_failed().then(|| {
                accumulator
                    .error()
                    .unwrap_or("response failed")
                    .to_string()
            })
        });
        let response = accumulator.finish();

        match (&failure, response) {
            (None, Some(mut response)) => {
                if let Some(logging) = self.logging.take() {
                    logging.dispatcher.log_success(
                        &logging.context,
                        &mut response,
                        end_time,
                        self.first_event_at,
                    );
                }
                self.final_response = Some(response);
            }
            (Some(error), response) => {
                if let Some(logging) = self.logging.take() {
                    logging.dispatcher.log_failure(
                        &logging.context,
                        error,
                        response.as_ref(),
                        end_time,
                    );
                }
                self.final_response = response;
            }
            (None, None) => {
                let error = "stream ended without a response".to_string();
                if let Some(logging) = self.logging.take() {
                    logging
                        .dispatcher
                        .log_failure(&logging.context, &error, None, end_time);
                }
            }
        }
        self.failure = failure;
    }
}

impl Stream for ResponsesStream {
    type Item = Result<StreamEvent, ResponsesError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(event))) => {
                if this.first_event_at.is_none() {
                    this.first_event_at = Some(SystemTime::now());
                }
                this.accumulator.push(&event);
                Poll::Ready(Some(Ok(event)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.finish(Some(err.to_string()));
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.finish(None);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for ResponsesStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsesStream")
            .field("events_seen", &self.accumulator.events_seen())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
