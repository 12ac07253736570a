use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::Settings;
use crate::domain::AgentRuntimePort;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
    pub details: HealthDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthDetails {
    pub agent_client: String,
    pub aws_region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_error: Option<String>,
}

pub struct HealthHandler {
    runtime: Arc<dyn AgentRuntimePort>,
    settings: Arc<Settings>,
    start_time: std::time::Instant,
}

impl HealthHandler {
    pub fn new(runtime: Arc<dyn AgentRuntimePort>, settings: Arc<Settings>) -> Self {
        Self {
            runtime,
            settings,
            start_time: std::time::Instant::now(),
        }
    }

    /// Health check - 200 when credentials resolve, 503 otherwise
    pub async fn health(&self) -> impl IntoResponse {
        let probe = tokio::time::timeout(PROBE_TIMEOUT, self.runtime.probe()).await;

        let (healthy, aws_account, credential_error) = match probe {
            Ok(Ok(identity)) => (true, Some(identity.account), None),
            Ok(Err(e)) => {
                warn!("Health check credential probe failed: {}", e);
                (false, None, Some(e.to_string()))
            }
            Err(_) => {
                warn!("Health check credential probe timed out");
                (false, None, Some("Credential check timed out".to_string()))
            }
        };

        let status = HealthStatus {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            details: HealthDetails {
                agent_client: "initialized".to_string(),
                aws_region: self.settings.aws.region.clone(),
                aws_account,
                credential_error,
            },
        };

        let code = if healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (code, Json(status))
    }

    /// Liveness check - returns 200 if server is alive
    /// This does not touch the remote service
    pub async fn live(&self) -> impl IntoResponse {
        (StatusCode::OK, Json(serde_json::json!({
            "status": "alive",
            "message": "Server is alive"
        })))
    }
}
