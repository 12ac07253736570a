use agent_relay::adapters::metrics_handler::MetricsCollector;
use agent_relay::adapters::scripted_runtime::{ScriptStep, ScriptedRuntime};
use agent_relay::config::Settings;
use agent_relay::domain::UpstreamEvent;
use agent_relay::relay::error::RelayError;
use agent_relay::AppState;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

fn app_with(runtime: Arc<ScriptedRuntime>, settings: Settings) -> Router {
    let metrics = Arc::new(MetricsCollector::new().unwrap());
    agent_relay::create_app(AppState::new(runtime, settings, metrics))
}

fn stream_request(body: &str) -> Request<Body> {
    Request::builder()
        .uri("/api/agent/stream")
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn ndjson_lines(response: axum::response::Response) -> Vec<Value> {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body_bytes.to_vec()).unwrap();
    assert!(text.ends_with('\n'));
    text.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_stream_relays_chunks_as_ndjson() {
    let runtime = Arc::new(ScriptedRuntime::chunks(&["Machine learning", " is a subset"]));
    let app = app_with(runtime.clone(), Settings::default());

    let body = json!({
        "input_text": "What is ML?",
        "agent_id": "AGENT1",
        "session_id": "session-42"
    });
    let response = app.oneshot(stream_request(&body.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "application/x-ndjson");
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("x-request-id"));

    let events = ndjson_lines(response).await;
    let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(types, ["start", "chunk", "chunk", "completion"]);

    assert_eq!(events[0]["session_id"], "session-42");
    assert_eq!(events[0]["agent_id"], "AGENT1");
    assert_eq!(events[2]["content"], " is a subset");
    assert_eq!(events[2]["accumulated_content"], "Machine learning is a subset");
    assert_eq!(events[3]["final_content"], "Machine learning is a subset");
    assert_eq!(events[3]["done"], true);
    assert!(events[..3].iter().all(|e| e["done"] == false));
    assert!(events.iter().all(|e| e["timestamp"].is_string()));

    let invocations = runtime.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].agent_alias_id, "TSTALIASID");
    assert_eq!(invocations[0].session_id, "session-42");
}

#[tokio::test]
async fn test_rejected_invocation_streams_error_event() {
    let runtime = Arc::new(ScriptedRuntime::rejecting(RelayError::service(
        "AccessDeniedException",
        "User is not authorized to perform: bedrock:InvokeAgent",
    )));
    let app = app_with(runtime, Settings::default());

    let body = json!({"input_text": "hi", "agent_id": "AGENT1"});
    let response = app.oneshot(stream_request(&body.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let events = ndjson_lines(response).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "start");
    assert_eq!(events[1]["type"], "error");
    assert_eq!(events[1]["error_code"], "AccessDeniedException");
    assert!(events[1]["error"].as_str().unwrap().contains("AccessDenied"));
    assert_eq!(events[1]["done"], true);
}

#[tokio::test]
async fn test_trace_only_relayed_in_debug_mode() {
    let steps = vec![
        ScriptStep::Record(UpstreamEvent::Trace(json!({"agent_id": "AGENT1"}))),
        ScriptStep::Record(UpstreamEvent::ReturnControl(json!({"invocation_id": "inv-1"}))),
    ];
    let body = json!({"input_text": "hi", "agent_id": "AGENT1"}).to_string();

    let quiet = app_with(Arc::new(ScriptedRuntime::new(steps.clone())), Settings::default());
    let events = ndjson_lines(quiet.oneshot(stream_request(&body)).await.unwrap()).await;
    let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(types, ["start", "return_control", "completion"]);
    assert_eq!(events[1]["return_control_data"]["invocation_id"], "inv-1");

    let mut settings = Settings::default();
    settings.relay.debug_trace = true;
    let verbose = app_with(Arc::new(ScriptedRuntime::new(steps)), settings);
    let events = ndjson_lines(verbose.oneshot(stream_request(&body)).await.unwrap()).await;
    let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(types, ["start", "trace", "return_control", "completion"]);
    assert_eq!(events[1]["trace_data"]["agent_id"], "AGENT1");
}

#[tokio::test]
async fn test_missing_agent_id_is_rejected_before_streaming() {
    let runtime = Arc::new(ScriptedRuntime::chunks(&["never"]));
    let app = app_with(runtime.clone(), Settings::default());

    let response = app
        .oneshot(stream_request(&json!({"input_text": "hi"}).to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json: Value = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(body_json["success"], false);
    assert!(body_json["error"].as_str().unwrap().contains("agent_id"));
    assert!(runtime.invocations().is_empty());
}

#[tokio::test]
async fn test_invalid_json_is_rejected() {
    let app = app_with(Arc::new(ScriptedRuntime::chunks(&[])), Settings::default());

    let response = app.oneshot(stream_request("{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json: Value = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(body_json["error"], "Invalid JSON in request body");
}

#[tokio::test]
async fn test_root_describes_api() {
    let app = app_with(Arc::new(ScriptedRuntime::chunks(&[])), Settings::default());

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json: Value = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(body_json["endpoints"]["stream"], "POST /api/agent/stream");
}

#[tokio::test]
async fn test_health_reports_credential_failure() {
    let runtime = Arc::new(ScriptedRuntime::chunks(&[]).without_credentials());
    let app = app_with(runtime, Settings::default());

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
