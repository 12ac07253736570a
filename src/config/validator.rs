use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::{AwsSettings, CorsSettings, ServerSettings, Settings};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Conflicting values: {0}")]
    Conflict(String),
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        Self::validate_server(&settings.server, &mut errors);
        Self::validate_aws(&settings.aws, &mut errors);
        Self::validate_cors(&settings.cors, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(server: &ServerSettings, errors: &mut Vec<ValidationError>) {
        if server.host.is_empty() {
            errors.push(ValidationError::MissingField("server.host".to_string()));
        }

        if server.port == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }
    }

    fn validate_aws(aws: &AwsSettings, errors: &mut Vec<ValidationError>) {
        if aws.region.trim().is_empty() {
            errors.push(ValidationError::MissingField("aws.region".to_string()));
        }

        if let Some(endpoint) = &aws.endpoint_url {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                errors.push(ValidationError::InvalidValue {
                    field: "aws.endpoint_url".to_string(),
                    reason: format!("'{}' must start with http:// or https://", endpoint),
                });
            }
        }

        if aws.connect_timeout_secs == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "aws.connect_timeout_secs".to_string(),
                reason: "Timeout must be greater than 0".to_string(),
            });
        }

        if aws.read_timeout_secs == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "aws.read_timeout_secs".to_string(),
                reason: "Timeout must be greater than 0".to_string(),
            });
        }
    }

    fn validate_cors(cors: &CorsSettings, errors: &mut Vec<ValidationError>) {
        if cors.allowed_origins.is_empty() {
            errors.push(ValidationError::MissingField("cors.allowed_origins".to_string()));
            return;
        }

        if cors.allows_any_origin() && cors.allowed_origins.len() > 1 {
            errors.push(ValidationError::Conflict(
                "cors.allowed_origins cannot mix '*' with explicit origins".to_string(),
            ));
        }

        for origin in cors.allowed_origins.iter().filter(|o| o.trim() != "*") {
            if HeaderValue::from_str(origin.trim()).is_err() {
                errors.push(ValidationError::InvalidValue {
                    field: "cors.allowed_origins".to_string(),
                    reason: format!("'{}' is not a valid origin", origin),
                });
            }
        }
    }
}
