//! In-memory agent runtime that replays a fixed script
//!
//! Used by the relay, router and live-server tests and by the benchmarks in
//! place of the AWS runtime.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::{AgentInvocation, AgentRuntimePort, CallerIdentity, UpstreamEvent, UpstreamStream};
use crate::relay::error::{RelayError, RelayResult};

/// One step of a replayed upstream stream
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Record(UpstreamEvent),
    Fail(RelayError),
    /// Wait before the next step
    Pause(Duration),
    /// Go silent without ending the stream
    Stall,
}

pub struct ScriptedRuntime {
    steps: Vec<ScriptStep>,
    rejection: Option<RelayError>,
    hang_on_invoke: bool,
    identity: Option<CallerIdentity>,
    invocations: Mutex<Vec<AgentInvocation>>,
    // One clone lives inside every stream handed out
    stream_token: Arc<()>,
}

impl ScriptedRuntime {
    /// Every invocation replays `steps` from the beginning
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            rejection: None,
            hang_on_invoke: false,
            identity: Some(CallerIdentity {
                account: "123456789012".to_string(),
                arn: "arn:aws:iam::123456789012:role/agent-relay".to_string(),
            }),
            invocations: Mutex::new(Vec::new()),
            stream_token: Arc::new(()),
        }
    }

    /// A stream of text chunks that ends normally
    pub fn chunks(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|text| chunk_step(text)).collect())
    }

    /// Every invocation is refused before any record
    pub fn rejecting(err: RelayError) -> Self {
        let mut runtime = Self::new(Vec::new());
        runtime.rejection = Some(err);
        runtime
    }

    /// The upstream call is accepted but never answers
    pub fn hanging() -> Self {
        let mut runtime = Self::new(Vec::new());
        runtime.hang_on_invoke = true;
        runtime
    }

    /// The credential probe fails
    pub fn without_credentials(mut self) -> Self {
        self.identity = None;
        self
    }

    /// Invocations received so far
    pub fn invocations(&self) -> Vec<AgentInvocation> {
        self.invocations
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Upstream streams handed out and not yet dropped
    pub fn open_streams(&self) -> usize {
        Arc::strong_count(&self.stream_token) - 1
    }
}

/// A single text chunk step
pub fn chunk_step(text: &str) -> ScriptStep {
    ScriptStep::Record(UpstreamEvent::Chunk(Bytes::copy_from_slice(text.as_bytes())))
}

#[async_trait]
impl AgentRuntimePort for ScriptedRuntime {
    async fn invoke(&self, invocation: AgentInvocation) -> RelayResult<UpstreamStream> {
        if let Ok(mut calls) = self.invocations.lock() {
            calls.push(invocation);
        }
        if let Some(err) = &self.rejection {
            return Err(err.clone());
        }
        if self.hang_on_invoke {
            futures::future::pending::<()>().await;
        }

        let token = self.stream_token.clone();
        let records = futures::stream::unfold(self.steps.clone().into_iter(), |mut steps| async move {
            loop {
                match steps.next()? {
                    ScriptStep::Record(record) => return Some((Ok(record), steps)),
                    ScriptStep::Fail(err) => return Some((Err(err), steps)),
                    ScriptStep::Pause(delay) => tokio::time::sleep(delay).await,
                    ScriptStep::Stall => futures::future::pending::<()>().await,
                }
            }
        })
        .map(move |record| {
            let _held = &token;
            record
        });
        Ok(records.boxed())
    }

    async fn probe(&self) -> anyhow::Result<CallerIdentity> {
        self.identity
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Unable to locate credentials"))
    }
}
