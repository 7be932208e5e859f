use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::client::{ResponsesClient, ResponsesOutcome};
use crate::error::ResponsesError;
use crate::models::responses::ResponsesRequest;
use crate::stream::ResponsesStream;
use crate::util::{cors_layer_from_env, error_response};

/// Shared application state used by the HTTP server and handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<ResponsesClient>,
}

impl AppState {
    pub fn new(client: ResponsesClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

/// Build the Axum router with `/status` and the Responses passthrough routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/v1/responses", post(responses))
        .route("/responses", post(responses))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer_from_env())
}

/// Service status endpoint exposing version and routes.
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "llm-responses",
        "version": env!("CARGO_PKG_VERSION"),
        "upstream": state.client.config().api_base,
        "routes": ["/status", "/v1/responses", "/responses"]
    }))
}

/// Forward a Responses request through the client.
/// - Non-streaming: JSON roundtrip
/// - Streaming: events re-emitted as SSE
async fn responses(
    State(state): State<AppState>,
    Json(req): Json<ResponsesRequest>,
) -> Response {
    match state.client.aresponses(req).await {
        Ok(ResponsesOutcome::Response(resp)) => Json(*resp).into_response(),
        Ok(ResponsesOutcome::Stream(stream)) => sse_response(stream).into_response(),
        Err(e) => error_into_response(&e),
    }
}

fn sse_response(
    stream: ResponsesStream,
) -> Sse<impl futures_util::Stream<Item = Result<Event, axum::Error>>> {
    // Unmodelled events go out unchanged under their upstream name.
    let events = stream.map(|item| match item {
        Ok(ev) => Event::default().event(ev.event_type()).json_data(&ev),
        Err(e) => Event::default().event("error").json_data(serde_json::json!({
            "type": "error",
            "message": e.to_string(),
        })),
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Map a client error onto an HTTP response with an OpenAI-style error body.
pub fn error_into_response(err: &ResponsesError) -> Response {
    let status = match err {
        ResponsesError::Upstream { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        ResponsesError::UnsupportedProvider(_) | ResponsesError::Config(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::BAD_GATEWAY,
    };
    let message = match err {
        ResponsesError::Upstream { message, .. } => message.clone(),
        other => other.to_string(),
    };
    error_response(status, &message)
}
