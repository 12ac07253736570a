pub mod api_handler;
pub mod bedrock_runtime;
pub mod cors;
pub mod health_handler;
pub mod metrics_handler;
pub mod request_log;
pub mod scripted_runtime;
