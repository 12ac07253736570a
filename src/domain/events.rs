//! Outbound stream events
//!
//! Every event is written to the client as one JSON object followed by `\n`.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single line of the outbound event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    /// True only for the terminal `completion` and `error` events
    pub done: bool,
    pub timestamp: DateTime<Utc>,
}

/// Event payload, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Sent before the upstream call is made
    Start { session_id: String, agent_id: String },
    /// Text delta plus the running total for this stream
    Chunk {
        content: String,
        accumulated_content: String,
    },
    /// Agent trace, only relayed in debug mode
    Trace { trace_data: Value },
    /// Function-call request from the agent, relayed verbatim
    ReturnControl { return_control_data: Value },
    /// Successful end of stream
    Completion {
        final_content: String,
        session_id: String,
    },
    /// Failed end of stream
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
    },
}

impl EventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion { .. } | Self::Error { .. })
    }

    /// Wire name of the `type` discriminant
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Chunk { .. } => "chunk",
            Self::Trace { .. } => "trace",
            Self::ReturnControl { .. } => "return_control",
            Self::Completion { .. } => "completion",
            Self::Error { .. } => "error",
        }
    }
}

impl StreamEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            done: kind.is_terminal(),
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn start(session_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self::new(EventKind::Start {
            session_id: session_id.into(),
            agent_id: agent_id.into(),
        })
    }

    pub fn chunk(content: impl Into<String>, accumulated_content: impl Into<String>) -> Self {
        Self::new(EventKind::Chunk {
            content: content.into(),
            accumulated_content: accumulated_content.into(),
        })
    }

    pub fn trace(trace_data: Value) -> Self {
        Self::new(EventKind::Trace { trace_data })
    }

    pub fn return_control(return_control_data: Value) -> Self {
        Self::new(EventKind::ReturnControl { return_control_data })
    }

    pub fn completion(final_content: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::new(EventKind::Completion {
            final_content: final_content.into(),
            session_id: session_id.into(),
        })
    }

    pub fn error(error: impl Into<String>, error_code: Option<String>) -> Self {
        Self::new(EventKind::Error {
            error: error.into(),
            error_code,
        })
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.name()
    }

    /// Encode as one newline-terminated JSON line
    pub fn to_ndjson(&self) -> Result<Bytes, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(Bytes::from(line))
    }
}
