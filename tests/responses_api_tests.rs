// Responses API client tests against a local stub upstream.
//
// Each test starts its own stub and registers a per-client CapturingLogger, so
// nothing here touches the global callback registry.

#[path = "common/upstream_stub.rs"]
mod upstream_stub;

use futures_util::StreamExt;
use http::StatusCode;
use llm_responses::callbacks::CapturingLogger;
use llm_responses::client::{ResponsesClient, ResponsesOutcome};
use llm_responses::config::ClientConfig;
use llm_responses::error::ResponsesError;
use llm_responses::models::events::StreamEvent;
use llm_responses::models::responses::{InputItem, ResponseInput, ResponsesRequest};
use llm_responses::payload::LoggingStatus;
use llm_responses::validation::{validate_logging_payload, validate_responses_match};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use upstream_stub::{
    sample_response, StubBehaviour, UpstreamStub, STUB_CREATED_AT, STUB_MODEL, STUB_RESPONSE_ID,
    STUB_STREAM_ERROR, STUB_TEXT,
};

const WAIT: Duration = Duration::from_secs(5);

fn client_for(stub: &UpstreamStub) -> ResponsesClient {
    ResponsesClient::new(ClientConfig::new(stub.url()).with_api_key("sk-test"))
}

fn client_with_logger(stub: &UpstreamStub) -> (ResponsesClient, Arc<CapturingLogger>) {
    let logger = Arc::new(CapturingLogger::new());
    let client = client_for(stub).with_callback(logger.clone());
    (client, logger)
}

#[tokio::test]
async fn basic_responses_call() {
    let stub = UpstreamStub::start(StubBehaviour::Ok).await;
    let client = client_for(&stub);

    let outcome = client
        .aresponses(ResponsesRequest::new("gpt-4o", "Basic ping"))
        .await
        .expect("non-streaming call");
    assert!(!outcome.is_stream());
    let response = outcome.into_response().expect("response object");

    println!(
        "response: {}",
        serde_json::to_string_pretty(&response).unwrap()
    );
    assert_eq!(response.id, STUB_RESPONSE_ID);
    assert_eq!(response.output_text(), STUB_TEXT);
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn basic_responses_streaming_call() {
    let stub = UpstreamStub::start(StubBehaviour::Ok).await;
    let client = client_for(&stub);

    let outcome = client
        .aresponses(ResponsesRequest::new("gpt-4o", "hi").with_stream(true))
        .await
        .expect("streaming call");
    let mut stream = outcome.into_stream().expect("event stream");

    let mut event_types = Vec::new();
    while let Some(event) = stream.next().await {
        let event = event.expect("stream event");
        println!("event: {}", event.event_type());
        if let StreamEvent::Unknown(raw) = &event {
            assert_eq!(raw["detail"], json!({"kept": true}));
        }
        event_types.push(event.event_type().to_string());
    }

    assert!(!event_types.is_empty());
    assert_eq!(event_types.first().map(String::as_str), Some("response.created"));
    assert_eq!(event_types.last().map(String::as_str), Some("response.completed"));
    assert!(event_types.iter().any(|t| t == "response.some_new_event"));
    assert_eq!(
        stream.final_response().map(|r| r.output_text()),
        Some(STUB_TEXT.to_string())
    );

    let sent = stub.take_requests();
    assert_eq!(sent[0]["stream"], json!(true));
}

#[tokio::test]
async fn responses_streaming_with_logging() {
    let stub = UpstreamStub::start(StubBehaviour::Ok).await;
    let (client, logger) = client_with_logger(&stub);

    let stream = client
        .create_stream(ResponsesRequest::new("gpt-4o", "hi"))
        .await
        .expect("streaming call");
    let response = stream.collect_response().await.expect("reassembled response");
    client.wait_for_logging().await;

    let payload = logger.last_success().expect("success payload after stream end");
    assert!(payload.stream);
    assert_eq!(payload.id, response.id);
    assert!(payload.completion_start_time >= payload.start_time);
    assert!(payload.completion_start_time <= payload.end_time);
    validate_logging_payload(
        &payload,
        &response,
        "gpt-4o",
        &json!([{"content": "hi", "role": "user"}]),
    )
    .expect("payload matches streamed response");
    assert_eq!(logger.failure_count(), 0);
}

#[tokio::test]
async fn logging_payload_matches_non_streaming_response() {
    let stub = UpstreamStub::start(StubBehaviour::Ok).await;
    let (client, logger) = client_with_logger(&stub);

    let response = client
        .create(ResponsesRequest::new("gpt-4o", "hi"))
        .await
        .expect("non-streaming call");
    let payload = logger
        .wait_for_success(WAIT)
        .await
        .expect("success payload");

    println!(
        "logged payload: {}",
        serde_json::to_string_pretty(&payload).unwrap()
    );

    let usage = response.usage.clone().expect("usage");
    assert_eq!(payload.prompt_tokens, usage.input_tokens);
    assert_eq!(payload.completion_tokens, usage.output_tokens);
    assert_eq!(
        payload.total_tokens,
        payload.prompt_tokens + payload.completion_tokens
    );
    assert!(payload.response_cost > 0.0);
    assert_eq!(response.hidden_params.response_cost, Some(payload.response_cost));

    assert_eq!(payload.id, response.id);
    let logged = payload.response.as_ref().expect("response copy");
    assert_eq!(logged["model"], json!(response.model));
    assert_eq!(logged["created_at"], json!(STUB_CREATED_AT));
    assert_eq!(
        serde_json::to_value(&payload.messages).unwrap(),
        json!([{"content": "hi", "role": "user"}])
    );

    let logged_output = logged["output"].as_array().expect("output array");
    assert_eq!(logged_output.len(), response.output.len());
    for (logged_item, live_item) in logged_output.iter().zip(response.messages()) {
        assert_eq!(logged_item["role"], json!(live_item.role));
        assert_eq!(
            logged_item["content"][0]["text"],
            json!(live_item.first_text().unwrap_or(""))
        );
        assert_eq!(logged_item["status"], json!(live_item.status));
    }

    validate_responses_match(logged, &response).expect("logged copy matches live response");
    // Nulls, logprobs and unmodelled provider keys survive into the logged copy.
    assert_eq!(logged, &sample_response());
}

#[tokio::test]
async fn provider_prefix_is_stripped_before_forwarding() {
    let stub = UpstreamStub::start(StubBehaviour::Ok).await;
    let (client, logger) = client_with_logger(&stub);

    client
        .create(ResponsesRequest::new("openai/gpt-4o", "hi").with_temperature(0.2))
        .await
        .expect("call with provider prefix");
    client.wait_for_logging().await;

    let sent = stub.take_requests();
    assert_eq!(sent[0]["model"], json!("gpt-4o"));
    assert_eq!(sent[0]["temperature"], json!(0.2));
    assert_eq!(stub.auth_headers(), vec![Some("Bearer sk-test".to_string())]);

    let payload = logger.last_success().expect("success payload");
    assert_eq!(payload.model, "gpt-4o");
    assert_eq!(payload.custom_llm_provider, "openai");
    assert_eq!(payload.api_base, stub.url());
    assert_eq!(payload.model_parameters["temperature"], json!(0.2));
}

#[tokio::test]
async fn upstream_error_is_returned_and_logged_as_failure() {
    let stub = UpstreamStub::start(StubBehaviour::Error {
        status: StatusCode::UNAUTHORIZED,
        body: json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        }),
    })
    .await;
    let (client, logger) = client_with_logger(&stub);

    let err = client
        .create(ResponsesRequest::new("gpt-4o", "hi"))
        .await
        .unwrap_err();
    match &err {
        ResponsesError::Upstream { status, message } => {
            assert_eq!(*status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let payload = logger
        .wait_for_failure(WAIT)
        .await
        .expect("failure payload");
    assert_eq!(payload.status, LoggingStatus::Failure);
    assert_eq!(payload.error_str, Some(err.to_string()));
    assert_eq!(payload.total_tokens, 0);
    assert_eq!(logger.success_count(), 0);
}

#[tokio::test]
async fn deltas_without_completed_event_rebuild_text() {
    let stub = UpstreamStub::start(StubBehaviour::StreamDeltasOnly).await;
    let (client, logger) = client_with_logger(&stub);

    let response = client
        .create_stream(ResponsesRequest::new("gpt-4o", "hi"))
        .await
        .expect("streaming call")
        .collect_response()
        .await
        .expect("reassembled response");
    client.wait_for_logging().await;

    assert_eq!(response.id, STUB_RESPONSE_ID);
    assert_eq!(response.model, STUB_MODEL);
    assert_eq!(response.output_text(), STUB_TEXT);
    // No usage without a completed snapshot, so nothing is billed.
    let payload = logger.last_success().expect("success payload");
    assert_eq!(payload.total_tokens, 0);
    assert_eq!(payload.response_cost, 0.0);
}

#[tokio::test]
async fn failed_stream_logs_failure() {
    let stub = UpstreamStub::start(StubBehaviour::StreamFailed).await;
    let (client, logger) = client_with_logger(&stub);

    let stream = client
        .create_stream(ResponsesRequest::new("gpt-4o", "hi"))
        .await
        .expect("streaming call");
    let events: Vec<_> = stream.collect().await;
    assert!(events.iter().all(|e| e.is_ok()));
    assert!(matches!(
        events.last(),
        Some(Ok(StreamEvent::ResponseFailed { .. }))
    ));
    client.wait_for_logging().await;

    let payload = logger.last_failure().expect("failure payload");
    assert_eq!(payload.error_str.as_deref(), Some("The model is overloaded"));
    assert_eq!(payload.id, STUB_RESPONSE_ID);
    assert!(logger.last_success().is_none());
}

#[tokio::test]
async fn error_event_mid_stream_logs_failure() {
    let stub = UpstreamStub::start(StubBehaviour::StreamErrorEvent).await;
    let (client, logger) = client_with_logger(&stub);

    let stream = client
        .create_stream(ResponsesRequest::new("gpt-4o", "hi"))
        .await
        .expect("streaming call");
    let err = stream.collect_response().await.unwrap_err();
    assert!(err.to_string().contains(STUB_STREAM_ERROR));

    let payload = logger
        .wait_for_failure(WAIT)
        .await
        .expect("failure payload");
    assert_eq!(payload.status, LoggingStatus::Failure);
    assert_eq!(payload.error_str.as_deref(), Some(STUB_STREAM_ERROR));
    assert!(payload.stream);
    // The partial response from `response.created` is attached.
    assert_eq!(payload.id, STUB_RESPONSE_ID);
    assert_eq!(logger.success_count(), 0);
}

#[tokio::test]
async fn tool_output_items_are_forwarded_untouched() {
    let stub = UpstreamStub::start(StubBehaviour::Ok).await;
    let (client, logger) = client_with_logger(&stub);

    let input = json!([
        {"role": "user", "content": "Weather in Paris?"},
        {"type": "function_call_output", "call_id": "call_1", "output": "sunny"},
        {"type": "item_reference", "id": "fc_1"}
    ]);
    let request: ResponsesRequest =
        serde_json::from_value(json!({"model": "gpt-4o", "input": input.clone()}))
            .expect("list input with tool output parses");
    match &request.input {
        ResponseInput::Items(items) => {
            assert!(items[0].as_message().is_some());
            assert!(matches!(items[1], InputItem::Other(_)));
        }
        other => panic!("unexpected input: {other:?}"),
    }

    client.create(request).await.expect("call succeeds");
    client.wait_for_logging().await;

    assert_eq!(stub.take_requests()[0]["input"], input);
    let payload = logger.last_success().expect("success payload");
    assert_eq!(
        serde_json::to_value(&payload.messages).unwrap(),
        json!([{"content": "Weather in Paris?", "role": "user"}])
    );
}

#[tokio::test]
async fn unsupported_provider_never_reaches_upstream() {
    let stub = UpstreamStub::start(StubBehaviour::Ok).await;
    let client = client_for(&stub);

    let err = client
        .aresponses(ResponsesRequest::new("acme/model-x", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResponsesError::UnsupportedProvider(ref p) if p == "acme"));
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn stream_flag_selects_outcome() {
    let stub = UpstreamStub::start(StubBehaviour::Ok).await;
    let client = client_for(&stub);

    let plain = client
        .aresponses(ResponsesRequest::new("gpt-4o", "hi"))
        .await
        .unwrap();
    assert!(matches!(plain, ResponsesOutcome::Response(_)));

    let streamed = client
        .aresponses(ResponsesRequest::new("gpt-4o", "hi").with_stream(true))
        .await
        .unwrap();
    assert!(streamed.is_stream());
}
