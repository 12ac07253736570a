use clap::builder::BoolishValueParser;
use clap::Parser;
use std::path::PathBuf;

/// Agent Relay - streams Bedrock agent responses to HTTP clients as NDJSON
#[derive(Parser, Debug, Clone)]
#[command(name = "agent-relay", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "RELAY_CONFIG", default_value = "agent-relay.toml")]
    pub config: PathBuf,

    /// Server host address
    #[arg(long, env = "RELAY_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// AWS region of the agent runtime
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Agent runtime endpoint URL (for VPC endpoints or local stubs)
    #[arg(long, env = "BEDROCK_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Relay agent trace records to clients and log at debug level
    ///
    /// Accepts `true`/`false` in any case as well as `1`/`0`, `yes`/`no` and `on`/`off`.
    #[arg(
        long,
        env = "DEBUG_MODE",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub debug_mode: Option<bool>,

    /// Comma-separated list of allowed CORS origins ("*" allows any)
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Option<Vec<String>>,

    /// Emit logs as JSON lines
    #[arg(
        long,
        env = "LOG_JSON",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}
