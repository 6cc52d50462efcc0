// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end proxy tests: the axum router driven in-process against fake
//! upstream providers.

use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use futures::StreamExt;
use serde_json::{Value, json};
use throttle_config::{ProviderConfig, SharedConfig, ThrottleConfig};
use throttle_core::{ClientDialect, ProviderId, RoutingMode};
use throttle_cost::{DEFAULT_QUEUE_CAPACITY, LogEntry, LogStatus, LogWriter, RoutingLog};
use throttle_gateway::{GatewayState, build_router};
use tower::ServiceExt;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    app: Router,
    state: GatewayState,
}

async fn harness(
    providers: &[(ProviderId, &MockServer)],
    tweak: impl FnOnce(&mut ThrottleConfig),
) -> Harness {
    let mut config = ThrottleConfig::default();
    for (provider, server) in providers {
        *config.providers.get_mut(*provider) = ProviderConfig {
            api_key: Some("test-key".into()),
            base_url: Some(server.uri()),
        };
    }
    tweak(&mut config);

    let log = RoutingLog::open_in_memory().await.unwrap();
    let (writer, _task) = LogWriter::spawn(log.clone(), DEFAULT_QUEUE_CAPACITY);
    let state = GatewayState::new(SharedConfig::new(config), log, writer).unwrap();
    Harness {
        app: build_router(state.clone()),
        state,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

async fn send_get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn anthropic_body(text: &str) -> Value {
    json!({
        "model": "claude-3-haiku-20240307",
        "max_tokens": 256,
        "messages": [{"role": "user", "content": text}]
    })
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

/// The writer is asynchronous; wait for the row to land.
async fn logged(state: &GatewayState, request_id: &str) -> LogEntry {
    for _ in 0..100 {
        if let Some(entry) = state.log.find(request_id).await.unwrap() {
            return entry;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("no routing log entry for {request_id}");
}

async fn mount_anthropic(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_upstream", "type": "message", "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "model": "claude-opus-4-1", "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 4}
        })))
        .mount(server)
        .await;
}

async fn mount_gemini(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/v1beta/models/[^/]+:generateContent$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello from Gemini"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 3}
        })))
        .mount(server)
        .await;
}

const GEMINI_STREAM: &str = concat!(
    "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hel\"}],\"role\":\"model\"}}],",
    "\"usageMetadata\":{\"promptTokenCount\":5,\"candidatesTokenCount\":1}}\n\n",
    "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"lo\"}],\"role\":\"model\"},",
    "\"finishReason\":\"STOP\"}],",
    "\"usageMetadata\":{\"promptTokenCount\":5,\"candidatesTokenCount\":2}}\n\n",
);

async fn mount_gemini_stream(server: &MockServer, body: &str) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/v1beta/models/[^/]+:streamGenerateContent$"))
        .and(query_param("alt", "sse"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn forced_alias_overrides_classification() {
    let anthropic = MockServer::start().await;
    let google = MockServer::start().await;
    mount_anthropic(&anthropic, "Forced hello").await;
    mount_gemini(&google).await;
    let h = harness(
        &[(ProviderId::Anthropic, &anthropic), (ProviderId::Google, &google)],
        |_| {},
    )
    .await;

    let mut request = post("/v1/messages", anthropic_body("hi"));
    request
        .headers_mut()
        .insert("x-throttle-force-model", "opus".parse().unwrap());
    let (status, headers, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "x-throttle-model"), "claude-opus-4-1");
    assert_eq!(header(&headers, "x-throttle-tier"), "simple");
    assert_eq!(header(&headers, "x-throttle-mode"), "standard");
    let score = header(&headers, "x-throttle-score");
    assert_eq!(score.split('.').nth(1).map(str::len), Some(3), "score {score}");

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["type"], "message");
    assert_eq!(body["model"], "claude-opus-4-1");
    assert_eq!(body["content"][0]["text"], "Forced hello");
    assert_eq!(body["stop_reason"], "end_turn");
    assert_eq!(body["usage"]["output_tokens"], 4);

    let request_id = header(&headers, "x-throttle-request-id");
    let entry = logged(&h.state, request_id).await;
    assert!(entry.is_override);
    assert_eq!(entry.override_kind.as_deref(), Some("forced"));
    assert_eq!(entry.selected_model, "claude-opus-4-1");
    assert_eq!((entry.input_tokens, entry.output_tokens), (12, 4));
    assert_eq!(entry.status, LogStatus::Ok);
    assert!(entry.estimated_cost_usd > 0.0);
}

#[tokio::test]
async fn follow_up_inherits_parent_route() {
    let anthropic = MockServer::start().await;
    let google = MockServer::start().await;
    mount_anthropic(&anthropic, "ok").await;
    mount_gemini(&google).await;
    let h = harness(
        &[(ProviderId::Anthropic, &anthropic), (ProviderId::Google, &google)],
        |_| {},
    )
    .await;

    let mut first = post("/v1/messages", anthropic_body("hi"));
    first
        .headers_mut()
        .insert("x-throttle-force-model", "opus".parse().unwrap());
    let (_, headers, _) = send(&h.app, first).await;
    let parent_id = header(&headers, "x-throttle-request-id").to_string();
    logged(&h.state, &parent_id).await;

    let mut second = post("/v1/messages", anthropic_body("thanks"));
    second
        .headers_mut()
        .insert("x-throttle-parent-request-id", parent_id.parse().unwrap());
    let (status, headers, _) = send(&h.app, second).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "x-throttle-model"), "claude-opus-4-1");

    let child = logged(&h.state, header(&headers, "x-throttle-request-id")).await;
    assert_eq!(child.override_kind.as_deref(), Some("inherited"));
    assert_eq!(child.parent_request_id.as_deref(), Some(parent_id.as_str()));
}

#[tokio::test]
async fn openai_client_is_served_by_gemini() {
    let google = MockServer::start().await;
    mount_gemini(&google).await;
    let h = harness(&[(ProviderId::Google, &google)], |_| {}).await;

    let request = post(
        "/v1/chat/completions",
        json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "hello"}
            ]
        }),
    );
    let (status, headers, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "x-throttle-model"), "gemini-2.5-flash");

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "Hello from Gemini");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["prompt_tokens"], 7);
    assert_eq!(body["usage"]["total_tokens"], 10);

    let entry = logged(&h.state, header(&headers, "x-throttle-request-id")).await;
    assert_eq!(entry.dialect, ClientDialect::OpenAi);
    assert_eq!(entry.provider, ProviderId::Google);
    assert!(!entry.is_override);
}

#[tokio::test]
async fn malformed_json_is_rejected_in_each_dialect() {
    let google = MockServer::start().await;
    let h = harness(&[(ProviderId::Google, &google)], |_| {}).await;

    let bad = |uri: &str| {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap()
    };

    let (status, _, body) = send(&h.app, bad("/v1/messages")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["type"], "error");
    assert_eq!(body["error"]["type"], "invalid_request_error");

    let (status, _, body) = send(&h.app, bad("/v1/chat/completions")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert!(body["error"]["code"].is_null());
}

#[tokio::test]
async fn empty_messages_are_rejected() {
    let google = MockServer::start().await;
    let h = harness(&[(ProviderId::Google, &google)], |_| {}).await;
    let (status, _, _) = send(
        &h.app,
        post("/v1/messages", json!({"max_tokens": 10, "messages": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let google = MockServer::start().await;
    let h = harness(&[(ProviderId::Google, &google)], |c| {
        c.server.max_body_bytes = 256;
    })
    .await;

    let request = post("/v1/messages", anthropic_body(&"x".repeat(1024)));
    let (status, _, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["type"], "request_too_large");
}

#[tokio::test]
async fn no_configured_provider_is_a_server_error() {
    let h = harness(&[], |_| {}).await;
    let request = post("/v1/messages", anthropic_body("hi"));
    let (status, headers, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(headers.get("x-throttle-model").is_none());
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["type"], "configuration_error");
}

#[tokio::test]
async fn upstream_failure_is_bad_gateway_and_logged() {
    let google = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"error": {"message": "backend exploded"}})),
        )
        .mount(&google)
        .await;
    let h = harness(&[(ProviderId::Google, &google)], |_| {}).await;

    let request = post("/v1/messages", anthropic_body("hi"));
    let (status, headers, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(header(&headers, "x-throttle-model"), "gemini-2.5-flash");
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["type"], "upstream_error");
    assert!(body["error"]["message"].as_str().unwrap().contains("backend exploded"));

    let entry = logged(&h.state, header(&headers, "x-throttle-request-id")).await;
    assert_eq!(entry.status, LogStatus::Error);
    assert_eq!(entry.output_tokens, 0);
}

#[tokio::test]
async fn gemini_stream_is_translated_for_anthropic_clients() {
    let google = MockServer::start().await;
    mount_gemini_stream(&google, GEMINI_STREAM).await;
    let h = harness(&[(ProviderId::Google, &google)], |_| {}).await;

    let mut body = anthropic_body("hi");
    body["stream"] = json!(true);
    let (status, headers, body) = send(&h.app, post("/v1/messages", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "content-type"), "text/event-stream");
    assert_eq!(header(&headers, "x-throttle-model"), "gemini-2.5-flash");

    let text = String::from_utf8(body.to_vec()).unwrap();
    let events: Vec<&str> = text
        .lines()
        .filter_map(|l| l.strip_prefix("event: "))
        .collect();
    assert_eq!(
        events,
        vec![
            "message_start",
            "content_block_start",
            "content_block_delta",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop",
        ]
    );
    assert!(text.contains("\"output_tokens\":2"));

    let entry = logged(&h.state, header(&headers, "x-throttle-request-id")).await;
    assert!(entry.stream);
    assert_eq!(entry.status, LogStatus::Ok);
    assert_eq!((entry.input_tokens, entry.output_tokens), (5, 2));
}

#[tokio::test]
async fn gemini_stream_is_translated_for_openai_clients() {
    let google = MockServer::start().await;
    mount_gemini_stream(&google, GEMINI_STREAM).await;
    let h = harness(&[(ProviderId::Google, &google)], |_| {}).await;

    let request = post(
        "/v1/chat/completions",
        json!({"messages": [{"role": "user", "content": "hi"}], "stream": true}),
    );
    let (status, _, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("chat.completion.chunk"));
    assert!(text.contains("\"finish_reason\":\"stop\""));
    assert!(text.trim_end().ends_with("data: [DONE]"));
}

#[tokio::test]
async fn truncated_stream_is_logged_as_aborted_with_partial_usage() {
    let google = MockServer::start().await;
    let truncated = concat!(
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hel\"}],\"role\":\"model\"}}],",
        "\"usageMetadata\":{\"promptTokenCount\":5,\"candidatesTokenCount\":1}}\n\n",
    );
    mount_gemini_stream(&google, truncated).await;
    let h = harness(&[(ProviderId::Google, &google)], |_| {}).await;

    let mut body = anthropic_body("hi");
    body["stream"] = json!(true);
    let (status, headers, body) = send(&h.app, post("/v1/messages", body)).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(!text.contains("message_stop"));

    let entry = logged(&h.state, header(&headers, "x-throttle-request-id")).await;
    assert_eq!(entry.status, LogStatus::Aborted);
    assert_eq!((entry.input_tokens, entry.output_tokens), (5, 1));
}

#[tokio::test]
async fn openai_compatible_stream_ending_after_finish_reason_is_closed() {
    let deepseek = MockServer::start().await;
    let body = concat!(
        "data: {\"id\":\"c\",\"object\":\"chat.completion.chunk\",",
        "\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"},\"finish_reason\":null}]}\n\n",
        "data: {\"id\":\"c\",\"object\":\"chat.completion.chunk\",",
        "\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&deepseek)
        .await;
    let h = harness(&[(ProviderId::DeepSeek, &deepseek)], |_| {}).await;

    let mut request = anthropic_body("hi");
    request["stream"] = json!(true);
    let (status, headers, body) = send(&h.app, post("/v1/messages", request)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(header(&headers, "x-throttle-model").starts_with("deepseek-"));

    let text = String::from_utf8(body.to_vec()).unwrap();
    let events: Vec<&str> = text
        .lines()
        .filter_map(|l| l.strip_prefix("event: "))
        .collect();
    assert_eq!(
        events,
        vec![
            "message_start",
            "content_block_start",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop",
        ]
    );
    assert!(text.contains("\"stop_reason\":\"end_turn\""));

    let entry = logged(&h.state, header(&headers, "x-throttle-request-id")).await;
    assert_eq!(entry.status, LogStatus::Ok);
}

#[tokio::test]
async fn client_disconnect_mid_stream_is_logged_as_aborted() {
    let google = MockServer::start().await;
    mount_gemini_stream(&google, GEMINI_STREAM).await;
    let h = harness(&[(ProviderId::Google, &google)], |_| {}).await;

    let mut request = anthropic_body("hi");
    request["stream"] = json!(true);
    let response = h
        .app
        .clone()
        .oneshot(post("/v1/messages", request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let request_id = header(response.headers(), "x-throttle-request-id").to_string();

    let mut frames = response.into_body().into_data_stream();
    let first = frames.next().await.unwrap().unwrap();
    let first = String::from_utf8(first.to_vec()).unwrap();
    assert!(first.contains("message_start"));
    assert!(!first.contains("message_stop"));
    drop(frames);

    let entry = logged(&h.state, &request_id).await;
    assert_eq!(entry.status, LogStatus::Aborted);
    assert_eq!((entry.input_tokens, entry.output_tokens), (5, 1));
}

#[tokio::test]
async fn control_routes_report_and_switch_mode() {
    let google = MockServer::start().await;
    mount_gemini(&google).await;
    let h = harness(&[(ProviderId::Google, &google)], |_| {}).await;

    let (status, _, body) = send_get(&h.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["mode"], "standard");
    assert_eq!(health["providers"], json!(["google"]));

    let (status, _, body) = send(&h.app, post("/mode", json!({"mode": "eco"}))).await;
    assert_eq!(status, StatusCode::OK);
    let change: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(change, json!({"previous": "standard", "current": "eco"}));
    assert_eq!(h.state.config.mode(), RoutingMode::Eco);

    let (status, _, _) = send(&h.app, post("/mode", json!({"mode": "turbo"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, headers, _) = send(&h.app, post("/v1/messages", anthropic_body("hi"))).await;
    assert_eq!(header(&headers, "x-throttle-mode"), "eco");
    assert_eq!(header(&headers, "x-throttle-model"), "gemini-2.5-flash-lite");
    logged(&h.state, header(&headers, "x-throttle-request-id")).await;

    let (status, _, body) = send_get(&h.app, "/config").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(!text.contains("test-key"));
    assert!(text.contains("\"eco\""));

    let (status, _, body) = send_get(&h.app, "/stats?days=1").await;
    assert_eq!(status, StatusCode::OK);
    let stats: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats["total_requests"], 1);
    assert_eq!(stats["baseline_model"], "gemini-2.5-pro");

    let (status, _, body) = send_get(&h.app, "/log?tail=5").await;
    assert_eq!(status, StatusCode::OK);
    let rows: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(rows.as_array().map(Vec::len), Some(1));
    assert_eq!(rows[0]["selected_model"], "gemini-2.5-flash-lite");
    assert_eq!(rows[0]["mode"], "eco");
}
