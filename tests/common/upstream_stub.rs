#![allow(dead_code)]

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const STUB_RESPONSE_ID: &str = "resp_stub_001";
pub const STUB_MESSAGE_ID: &str = "msg_stub_001";
pub const STUB_MODEL: &str = "gpt-4o-2024-08-06";
pub const STUB_CREATED_AT: u64 = 1741476542;
pub const STUB_TEXT: &str = "Hello! How can I help you today?";

/// Fake `/v1/responses` upstream serving canned JSON and SSE.
#[derive(Clone)]
pub struct UpstreamStub {
    base_url: String,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
    auth_headers: Arc<Mutex<Vec<Option<String>>>>,
    shutdown: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

#[derive(Clone)]
pub enum StubBehaviour {
    /// JSON for non-streaming requests, a full event sequence for streaming ones.
    Ok,
    Error { status: StatusCode, body: Value },
    /// Streams text deltas without `response.completed`.
    StreamDeltasOnly,
    /// Streams a `response.failed` terminal event.
    StreamFailed,
    /// Streams a few deltas, then a bare `error` event instead of a terminal response.
    StreamErrorEvent,
}

#[derive(Clone)]
struct StubState {
    behaviour: StubBehaviour,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
    auth_headers: Arc<Mutex<Vec<Option<String>>>>,
}

impl UpstreamStub {
    pub async fn start(behaviour: StubBehaviour) -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let auth_headers = Arc::new(Mutex::new(Vec::new()));
        let state = Arc::new(StubState {
            behaviour,
            calls: calls.clone(),
            requests: requests.clone(),
            auth_headers: auth_headers.clone(),
        });

        let router = Router::new()
            .route("/v1/responses", post(responses_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub upstream");
        let addr = listener.local_addr().expect("stub upstream local addr");
        let (tx, rx) = oneshot::channel::<()>();

        let server = axum::serve(listener, router.into_make_service());
        tokio::spawn(async move {
            tokio::select! {
                res = server => {
                    if let Err(err) = res {
                        eprintln!("Stub upstream server error: {err:?}");
                    }
                }
                _ = rx => {}
            }
        });

        UpstreamStub {
            base_url: format!("http://{}/v1", addr),
            calls,
            requests,
            auth_headers,
            shutdown: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Base URL to use as `api_base` (ends in `/v1`).
    pub fn url(&self) -> String {
        self.base_url.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn take_requests(&self) -> Vec<Value> {
        let mut guard = self.requests.lock().expect("lock stub requests");
        guard.drain(..).collect()
    }

    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.auth_headers.lock().expect("lock stub auth").clone()
    }
}

impl Drop for UpstreamStub {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.shutdown.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(());
            }
        }
    }
}

async fn responses_handler(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(req): Json<Value>,
) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut guard) = state.auth_headers.lock() {
        guard.push(
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string()),
        );
    }
    if let Ok(mut guard) = state.requests.lock() {
        guard.push(req.clone());
    }

    let stream = req.get("stream").and_then(Value::as_bool).unwrap_or(false);
    match &state.behaviour {
        StubBehaviour::Error { status, body } => (*status, Json(body.clone())).into_response(),
        StubBehaviour::Ok if !stream => Json(sample_response()).into_response(),
        StubBehaviour::Ok => sse(&full_event_sequence()),
        StubBehaviour::StreamDeltasOnly => sse(&deltas_only_sequence()),
        StubBehaviour::StreamFailed => sse(&failed_sequence()),
        StubBehaviour::StreamErrorEvent => sse(&error_event_sequence()),
    }
}

fn sse(events: &[Value]) -> Response {
    let mut body = String::new();
    for ev in events {
        let ty = ev["type"].as_str().unwrap_or("message");
        body.push_str(&format!("event: {ty}\ndata: {ev}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
        .into_response()
}

pub fn sample_message(status: &str, text: Option<&str>) -> Value {
    let content = match text {
        Some(t) => json!([text_part(t)]),
        None => json!([]),
    };
    json!({
        "type": "message",
        "id": STUB_MESSAGE_ID,
        "status": status,
        "role": "assistant",
        "content": content
    })
}

pub fn text_part(text: &str) -> Value {
    json!({"type": "output_text", "text": text, "annotations": [], "logprobs": []})
}

fn response_with(status: &str, output: Value, usage: Value) -> Value {
    json!({
        "id": STUB_RESPONSE_ID,
        "object": "response",
        "created_at": STUB_CREATED_AT,
        "status": status,
        "error": null,
        "incomplete_details": null,
        "instructions": null,
        "max_output_tokens": null,
        "model": STUB_MODEL,
        "output": output,
        "parallel_tool_calls": true,
        "previous_response_id": null,
        "reasoning": {"effort": null, "summary": null},
        "store": true,
        "temperature": 1.0,
        "text": {"format": {"type": "text"}},
        "tool_choice": "auto",
        "tools": [],
        "top_p": 1.0,
        "truncation": "disabled",
        "usage": usage,
        "user": null,
        "metadata": {}
    })
}

fn sample_usage() -> Value {
    json!({
        "input_tokens": 8,
        "input_tokens_details": {"cached_tokens": 0},
        "output_tokens": 10,
        "output_tokens_details": {"reasoning_tokens": 0},
        "total_tokens": 18
    })
}

/// Completed response returned for non-streaming requests.
pub fn sample_response() -> Value {
    response_with(
        "completed",
        json!([sample_message("completed", Some(STUB_TEXT))]),
        sample_usage(),
    )
}

fn text_deltas() -> Vec<Value> {
    ["Hello!", " How can I help", " you today?"]
        .iter()
        .map(|d| {
            json!({
                "type": "response.output_text.delta",
                "item_id": STUB_MESSAGE_ID,
                "output_index": 0,
                "content_index": 0,
                "delta": d
            })
        })
        .collect()
}

fn created_events() -> Vec<Value> {
    let in_progress = response_with("in_progress", json!([]), Value::Null);
    vec![
        json!({"type": "response.created", "response": in_progress, "sequence_number": 0}),
        json!({"type": "response.in_progress", "response": in_progress, "sequence_number": 1}),
    ]
}

pub fn full_event_sequence() -> Vec<Value> {
    let mut events = created_events();
    events.push(json!({
        "type": "response.output_item.added",
        "output_index": 0,
        "item": sample_message("in_progress", None)
    }));
    events.push(json!({
        "type": "response.content_part.added",
        "item_id": STUB_MESSAGE_ID,
        "output_index": 0,
        "content_index": 0,
        "part": text_part("")
    }));
    events.extend(text_deltas());
    events.push(json!({
        "type": "response.some_new_event",
        "item_id": STUB_MESSAGE_ID,
        "detail": {"kept": true}
    }));
    events.push(json!({
        "type": "response.output_text.done",
        "item_id": STUB_MESSAGE_ID,
        "output_index": 0,
        "content_index": 0,
        "text": STUB_TEXT
    }));
    events.push(json!({
        "type": "response.content_part.done",
        "item_id": STUB_MESSAGE_ID,
        "output_index": 0,
        "content_index": 0,
        "part": text_part(STUB_TEXT)
    }));
    events.push(json!({
        "type": "response.output_item.done",
        "output_index": 0,
        "item": sample_message("completed", Some(STUB_TEXT))
    }));
    events.push(json!({"type": "response.completed", "response": sample_response()}));
    events
}

fn deltas_only_sequence() -> Vec<Value> {
    let mut events = created_events();
    events.extend(text_deltas());
    events
}

fn failed_sequence() -> Vec<Value> {
    let mut failed = response_with("failed", json!([]), Value::Null);
    failed["error"] = json!({"code": "server_error", "message": "The model is overloaded"});
    let mut events = created_events();
    events.push(json!({"type": "response.failed", "response": failed}));
    events
}

pub const STUB_STREAM_ERROR: &str = "Upstream connection lost mid-response";

fn error_event_sequence() -> Vec<Value> {
    let mut events = created_events();
    events.extend(text_deltas().into_iter().take(1));
    events.push(json!({
        "type": "error",
        "code": "server_error",
        "message": STUB_STREAM_ERROR,
        "param": null
    }));
    events
}
