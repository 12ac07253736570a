//! Inbound stream request and its validation

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Alias the remote service resolves to the agent's working draft
pub const DEFAULT_AGENT_ALIAS_ID: &str = "TSTALIASID";

/// Pre-flight validation failures, reported as HTTP 400 before any event
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("Invalid JSON in request body")]
    InvalidJson,

    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// A validated request to stream one agent turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub input_text: String,
    pub agent_id: String,
    pub agent_alias_id: String,
    pub session_id: Option<String>,
    #[serde(default)]
    pub session_attributes: HashMap<String, String>,
    #[serde(default)]
    pub prompt_session_attributes: HashMap<String, String>,
}

impl StreamRequest {
    pub fn new(input_text: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            input_text: input_text.into(),
            agent_id: agent_id.into(),
            agent_alias_id: DEFAULT_AGENT_ALIAS_ID.to_string(),
            session_id: None,
            session_attributes: HashMap::new(),
            prompt_session_attributes: HashMap::new(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Validate a decoded request body
    ///
    /// All problems are collected so the client sees them in one response.
    pub fn from_json(body: &Value) -> Result<Self, RequestError> {
        let object = body.as_object().ok_or(RequestError::NotAnObject)?;
        let mut errors = Vec::new();

        let input_text = required_text(object, "input_text", &mut errors);
        let agent_id = required_text(object, "agent_id", &mut errors);

        let agent_alias_id = match object.get("agent_alias_id") {
            None | Some(Value::Null) => DEFAULT_AGENT_ALIAS_ID.to_string(),
            Some(Value::String(s)) if s.trim().is_empty() => DEFAULT_AGENT_ALIAS_ID.to_string(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(_) => {
                errors.push("agent_alias_id must be a string".to_string());
                String::new()
            }
        };

        let session_id = match object.get("session_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(_) => {
                errors.push("session_id must be a string".to_string());
                None
            }
        };

        let session_attributes = string_map(object, "session_attributes", &mut errors);
        let prompt_session_attributes = string_map(object, "prompt_session_attributes", &mut errors);

        if !errors.is_empty() {
            return Err(RequestError::Invalid(errors));
        }

        Ok(Self {
            input_text,
            agent_id,
            agent_alias_id,
            session_id,
            session_attributes,
            prompt_session_attributes,
        })
    }

    /// Echo the caller's session id, or allocate a fresh one
    pub fn resolve_session_id(&self) -> String {
        match &self.session_id {
            Some(id) => id.clone(),
            None => {
                let suffix = Uuid::new_v4().simple().to_string();
                format!("session-{}-{}", Utc::now().timestamp(), &suffix[..8])
            }
        }
    }
}

fn required_text(object: &Map<String, Value>, field: &str, errors: &mut Vec<String>) -> String {
    match object.get(field).and_then(Value::as_str).map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            errors.push(format!("{} is required and must be a non-empty string", field));
            String::new()
        }
    }
}

fn string_map(
    object: &Map<String, Value>,
    field: &str,
    errors: &mut Vec<String>,
) -> HashMap<String, String> {
    match object.get(field) {
        None | Some(Value::Null) => HashMap::new(),
        Some(Value::Object(entries)) => {
            let mut map = HashMap::with_capacity(entries.len());
            for (key, value) in entries {
                match value {
                    Value::String(s) => {
                        map.insert(key.clone(), s.clone());
                    }
                    _ => errors.push(format!("{}.{} must be a string", field, key)),
                }
            }
            map
        }
        Some(_) => {
            errors.push(format!("{} must be an object", field));
            HashMap::new()
        }
    }
}

/// Parameters of a single remote invocation
#[derive(Debug, Clone, PartialEq)]
pub struct AgentInvocation {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub session_id: String,
    pub input_text: String,
    pub session_attributes: HashMap<String, String>,
    pub prompt_session_attributes: HashMap<String, String>,
}

impl AgentInvocation {
    pub fn new(request: &StreamRequest, session_id: impl Into<String>) -> Self {
        Self {
            agent_id: request.agent_id.clone(),
            agent_alias_id: request.agent_alias_id.clone(),
            session_id: session_id.into(),
            input_text: request.input_text.clone(),
            session_attributes: request.session_attributes.clone(),
            prompt_session_attributes: request.prompt_session_attributes.clone(),
        }
    }
}
