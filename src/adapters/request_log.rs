use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::adapters::metrics_handler::MetricsCollector;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const KNOWN_PATHS: [&str; 5] = ["/", "/health", "/health/live", "/metrics", "/api/agent/stream"];

/// Identifier assigned to each inbound request
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Assigns a request id, logs start and completion, and records request metrics
///
/// Completion is logged once response headers are ready; a streamed body keeps
/// flowing after that.
pub async fn log_requests(
    State(metrics): State<Arc<MetricsCollector>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().to_string();
    let path = path_label(request.uri().path());
    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    request.extensions_mut().insert(RequestId(request_id.clone()));

    info!(
        request_id = %request_id,
        method = %method,
        uri = %request.uri(),
        user_agent = %user_agent,
        "Request started"
    );

    let started = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = started.elapsed();
    let status = response.status();

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status.as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Request completed"
    );

    metrics
        .requests_total
        .with_label_values(&[method.as_str(), path, status.as_str()])
        .inc();
    metrics
        .request_duration
        .with_label_values(&[method.as_str(), path])
        .observe(elapsed.as_secs_f64());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Keep metric label cardinality bounded
fn path_label(path: &str) -> &'static str {
    KNOWN_PATHS
        .iter()
        .find(|known| **known == path)
        .copied()
        .unwrap_or("unmatched")
}
