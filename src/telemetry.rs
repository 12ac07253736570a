//! Tracing subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingSettings;

/// Filter used when neither `RUST_LOG` nor `logging.filter` is set
pub fn default_filter(settings: &LoggingSettings, debug: bool) -> String {
    match &settings.filter {
        Some(filter) => filter.clone(),
        None if debug => "agent_relay=debug,tower_http=debug".to_string(),
        None => "agent_relay=info,tower_http=info".to_string(),
    }
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter. With `logging.json` set, log
/// lines are emitted as structured JSON.
pub fn init_tracing(settings: &LoggingSettings, debug: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(settings, debug)),
    );
    if settings.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
