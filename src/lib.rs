//! # Agent Relay - Bedrock agent streaming over HTTP
//!
//! Agent Relay accepts a question for a remote Bedrock agent, opens one
//! streaming invocation, and relays the agent's output to the HTTP client as
//! newline-delimited JSON events while it is produced.
//!
//! ## Features
//!
//! - **Streaming**: `start`, `chunk`, `trace`, `return_control`, then one
//!   `completion` or `error` per request
//! - **Cancellation**: a client disconnect releases the upstream stream
//! - **Metrics**: Prometheus metrics for monitoring
//! - **Health Checks**: credential probe for load balancers
//! - **Validation**: request and configuration validation up front
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent_relay::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let settings = Settings::new()?;
//!
//!     // Server will start on configured host:port
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Agent Relay follows Hexagonal Architecture:
//! - **Domain**: Event contract, request validation and the runtime port
//! - **Relay**: The per-request stream state machine
//! - **Adapters**: HTTP handlers, middleware and the AWS SDK runtime
//! - **Config**: Configuration management

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod relay;
pub mod telemetry;

use crate::adapters::api_handler;
use crate::adapters::cors::cors_layer;
use crate::adapters::health_handler::HealthHandler;
use crate::adapters::metrics_handler::{MetricsCollector, MetricsHandler};
use crate::adapters::request_log::log_requests;
use crate::config::Settings;
use crate::domain::AgentRuntimePort;
use axum::{routing::{get, post}, Router};
use std::sync::Arc;

/// Shared state for request handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<dyn AgentRuntimePort>,
    pub settings: Arc<Settings>,
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    pub fn new(
        runtime: Arc<dyn AgentRuntimePort>,
        settings: Settings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            runtime,
            settings: Arc::new(settings),
            metrics,
        }
    }
}

/// Creates the Axum application router with all endpoints configured.
///
/// # Arguments
///
/// * `state` - Agent runtime, settings and metrics shared by all handlers
///
/// # Returns
///
/// Configured Axum Router
pub fn create_app(state: AppState) -> Router {
    let health_handler = Arc::new(HealthHandler::new(
        state.runtime.clone(),
        state.settings.clone(),
    ));
    let metrics_handler = Arc::new(MetricsHandler::new(state.metrics.clone()));

    let router = Router::new()
        .route("/", get(api_handler::api_info))
        // Health check endpoints
        .route("/health", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.health().await }
            }
        }))
        .route("/health/live", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.live().await }
            }
        }))
        // Metrics endpoint
        .route("/metrics", get({
            let handler = metrics_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.metrics().await }
            }
        }))
        // Agent streaming endpoint
        .route("/api/agent/stream", post(api_handler::stream_agent_response))
        .with_state(state.clone());

    router
        .layer(axum::middleware::from_fn_with_state(
            state.metrics.clone(),
            log_requests,
        ))
        .layer(cors_layer(&state.settings.cors))
}
