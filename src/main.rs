use agent_relay::adapters::bedrock_runtime::BedrockAgentRuntime;
use agent_relay::adapters::metrics_handler::MetricsCollector;
use agent_relay::cli::Cli;
use agent_relay::config::Settings;
use agent_relay::domain::AgentRuntimePort;
use agent_relay::telemetry::init_tracing;
use agent_relay::AppState;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments (env vars are read by clap)
    let cli = Cli::parse();

    // Load configuration (file, then CLI/env overrides)
    let settings = Settings::new_with_cli(&cli)?;

    // Initialize tracing
    init_tracing(&settings.logging, settings.relay.debug_trace);

    let host = settings.server.host.clone();
    let port = settings.server.port;

    info!("Starting Agent Relay on {}:{}", host, port);
    info!(
        region = %settings.aws.region,
        debug_trace = settings.relay.debug_trace,
        allowed_origins = ?settings.cors.allowed_origins,
        "Relay configuration loaded"
    );

    let runtime = BedrockAgentRuntime::from_settings(&settings.aws)
        .await?
        .with_trace(settings.relay.debug_trace);
    let runtime: Arc<dyn AgentRuntimePort> = Arc::new(runtime);
    info!("Bedrock Agent Runtime client initialized");

    // Credential check; failures are reported by /health instead
    match runtime.probe().await {
        Ok(identity) => info!(
            "AWS credentials valid - Account: {}, ARN: {}",
            identity.account, identity.arn
        ),
        Err(e) => error!("AWS credential validation failed: {}", e),
    }

    let metrics = Arc::new(MetricsCollector::new()?);
    let app = agent_relay::create_app(AppState::new(runtime, settings, metrics));

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Received shutdown signal");
        })
        .await?;

    info!("Agent Relay stopped");
    Ok(())
}
