//! Domain types for the relay
//!
//! The outbound event contract, the validated inbound request, and the port the
//! relay uses to reach the remote agent runtime.

pub mod events;
pub mod request;

pub use events::{EventKind, StreamEvent};
pub use request::{AgentInvocation, RequestError, StreamRequest, DEFAULT_AGENT_ALIAS_ID};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::relay::error::RelayResult;

/// A record received from the remote agent's response stream
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// Raw payload of a completion chunk (UTF-8 text on the wire)
    Chunk(Bytes),
    /// Diagnostic trace of the agent's internal steps
    Trace(Value),
    /// The agent asks the caller to run a function and report back
    ReturnControl(Value),
    /// Any record shape the relay does not understand, named for logging
    Other(String),
}

/// Lazy, single-pass sequence of upstream records
///
/// A transport or service failure partway through is yielded as an `Err` item.
pub type UpstreamStream = BoxStream<'static, RelayResult<UpstreamEvent>>;

/// Identity resolved by the connectivity probe
#[derive(Debug, Clone, PartialEq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

/// Port for the remote agent runtime
#[async_trait]
pub trait AgentRuntimePort: Send + Sync {
    /// Open exactly one invocation and return its record stream
    async fn invoke(&self, invocation: AgentInvocation) -> RelayResult<UpstreamStream>;

    /// Verify that credentials resolve and report who we are
    async fn probe(&self) -> anyhow::Result<CallerIdentity>;
}
