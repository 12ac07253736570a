//! HTTP handlers for the agent streaming API

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::adapters::request_log::RequestId;
use crate::domain::{RequestError, StreamRequest};
use crate::relay::RelaySession;
use crate::AppState;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

// ============================================================================
// Response Types
// ============================================================================

/// JSON body of a rejected request
#[derive(Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub error: String,
}

impl ApiResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

fn bad_request(err: RequestError, request_id: &str) -> Response {
    warn!(request_id = %request_id, "Rejected stream request: {}", err);
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error(err.to_string())),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / - describe the service
pub async fn api_info() -> impl IntoResponse {
    Json(json!({
        "message": "Bedrock Agent Streaming API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "stream": "POST /api/agent/stream",
            "health": "GET /health",
            "metrics": "GET /metrics"
        },
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// POST /api/agent/stream - relay one agent turn as NDJSON
///
/// The body is validated before any event is written; a bad request gets a
/// 400 and no stream.
pub async fn stream_agent_response(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    body: Bytes,
) -> Response {
    let request_id = request_id
        .map(|Extension(id)| id.0)
        .unwrap_or_else(|| "unknown".to_string());

    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return bad_request(RequestError::InvalidJson, &request_id),
    };
    let request = match StreamRequest::from_json(&value) {
        Ok(request) => request,
        Err(e) => return bad_request(e, &request_id),
    };

    let session = RelaySession::new(
        state.runtime.clone(),
        request,
        state.settings.relay.debug_trace,
    )
    .with_metrics(state.metrics.clone());

    info!(
        request_id = %request_id,
        session_id = %session.session_id(),
        "Starting agent stream request"
    );

    let frames = session.into_stream().map(|event| event.to_ndjson());

    (
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        [("x-accel-buffering", "no")],
        Body::from_stream(frames),
    )
        .into_response()
}
