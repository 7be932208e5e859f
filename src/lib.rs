#![forbid(unsafe_code)]
#![doc = r#"
llm-responses

Async client for the OpenAI Responses API with streaming reassembly, cost tracking and
standard logging callbacks.

Crate highlights
- Library: `ResponsesClient::aresponses(ResponsesRequest)` returns either a full
  `ResponsesResponse` or a `ResponsesStream` of typed events.
- Logging: every call produces a `StandardLoggingPayload` (tokens, cost, timings, request
  echo, response copy) handed to `CustomLogger` callbacks, registered globally or per client.
  `ResponsesClient::wait_for_logging()` resolves once callbacks have run.
- HTTP server (in `server`): `/status` and `/v1/responses` passthrough built on the client.

Modules
- `models`: Request, response and stream event types for the Responses API.
- `client` / `stream`: Upstream calls and SSE reassembly.
- `payload` / `pricing` / `callbacks`: Logging payloads, cost computation and dispatch.
- `analytics`: Payload stores (memory, JSONL, sled) usable as loggers.
- `validation`: Field-level comparison of logged and live responses.
- `util`: Shared helpers (tracing, env, HTTP client, CORS).
"#]

pub mod analytics;
pub mod callbacks;
pub mod client;
pub mod config;
pub mod conversion;
pub mod error;
pub mod models;
pub mod payload;
pub mod pricing;
pub mod provider;
pub mod server;
pub mod stream;
pub mod util;
pub mod validation;

pub use crate::callbacks::{
    add_callback, clear_callbacks, set_callbacks, CapturingLogger, CustomLogger, LogEvent,
};
pub use crate::client::{ResponsesClient, ResponsesOutcome};
pub use crate::config::ClientConfig;
pub use crate::error::ResponsesError;
pub use crate::payload::StandardLoggingPayload;
pub use crate::stream::ResponsesStream;

// Model namespaces, so downstream users can `use llm_responses::responses`.
pub use crate::models::{events, responses};
