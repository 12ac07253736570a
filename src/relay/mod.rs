//! Per-request stream relay
//!
//! Drives one upstream invocation and turns its records into the outbound event
//! protocol. The relay moves through `Init -> Streaming -> Completed | Failed`:
//!
//! - `start` is emitted before the upstream call is opened
//! - each content chunk is appended to a private buffer and emitted with the
//!   delta and the running total
//! - traces are emitted only in debug mode, return-control requests always
//! - exactly one `completion` or `error` ends the stream
//!
//! The relay is pulled by the HTTP body; it spawns no tasks. Dropping it drops
//! the upstream receiver, which releases the remote connection.

pub mod error;
pub mod sanitize;

use std::sync::Arc;
use std::time::Instant;

use futures::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::adapters::metrics_handler::MetricsCollector;
use crate::domain::{
    AgentInvocation, AgentRuntimePort, StreamEvent, StreamRequest, UpstreamEvent, UpstreamStream,
};
use error::RelayError;

enum Phase {
    Init,
    Connecting,
    Streaming(UpstreamStream),
    Finished,
}

/// State of one relayed stream
pub struct RelaySession {
    runtime: Arc<dyn AgentRuntimePort>,
    request: StreamRequest,
    session_id: String,
    debug_trace: bool,
    phase: Phase,
    accumulated: String,
    chunk_count: usize,
    record_count: usize,
    started: bool,
    terminated: bool,
    started_at: Instant,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RelaySession {
    /// Create a relay for one request; `debug_trace` enables `trace` events
    pub fn new(runtime: Arc<dyn AgentRuntimePort>, request: StreamRequest, debug_trace: bool) -> Self {
        let session_id = request.resolve_session_id();
        Self {
            runtime,
            request,
            session_id,
            debug_trace,
            phase: Phase::Init,
            accumulated: String::new(),
            chunk_count: 0,
            record_count: 0,
            started: false,
            terminated: false,
            started_at: Instant::now(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    // Not cancel-safe: a dropped future loses the phase it took. Only the
    // unfold in `into_stream` drives it, and that keeps the future alive.
    async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Init => {
                    self.phase = Phase::Connecting;
                    self.started = true;
                    self.started_at = Instant::now();
                    if let Some(metrics) = &self.metrics {
                        metrics.streams_in_flight.inc();
                    }
                    info!(
                        agent_id = %self.request.agent_id,
                        agent_alias_id = %self.request.agent_alias_id,
                        session_id = %self.session_id,
                        input_length = self.request.input_text.len(),
                        "Starting agent invocation"
                    );
                    let event = StreamEvent::start(&self.session_id, &self.request.agent_id);
                    return Some(self.emit(event));
                }
                Phase::Connecting => {
                    let invocation = AgentInvocation::new(&self.request, &self.session_id);
                    match self.runtime.invoke(invocation).await {
                        Ok(upstream) => self.phase = Phase::Streaming(upstream),
                        Err(e) => return Some(self.fail(e)),
                    }
                }
                Phase::Streaming(mut upstream) => match upstream.next().await {
                    Some(Ok(record)) => {
                        self.phase = Phase::Streaming(upstream);
                        self.record_count += 1;
                        if let Some(event) = self.translate(record) {
                            return Some(self.emit(event));
                        }
                    }
                    Some(Err(e)) => return Some(self.fail(e)),
                    None => return Some(self.complete()),
                },
                Phase::Finished => return None,
            }
        }
    }

    /// Turn the relay into the outbound event stream
    ///
    /// The stream is cancel-safe: a `next()` that is dropped before it resolves
    /// does not lose the pending upstream read.
    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        futures::stream::unfold(self, |mut session| async move {
            let event = session.next_event().await?;
            Some((event, session))
        })
    }

    fn translate(&mut self, record: UpstreamEvent) -> Option<StreamEvent> {
        match record {
            UpstreamEvent::Chunk(bytes) => match std::str::from_utf8(&bytes) {
                Ok(delta) => {
                    self.accumulated.push_str(delta);
                    self.chunk_count += 1;
                    Some(StreamEvent::chunk(delta, self.accumulated.as_str()))
                }
                Err(e) => {
                    warn!(session_id = %self.session_id, "Failed to decode chunk: {}", e);
                    self.record_drop("undecodable_chunk");
                    None
                }
            },
            UpstreamEvent::Trace(trace) => {
                debug!(session_id = %self.session_id, "Trace event: {}", trace);
                self.debug_trace.then(|| StreamEvent::trace(trace))
            }
            UpstreamEvent::ReturnControl(payload) => {
                info!(session_id = %self.session_id, "Return control event: {}", payload);
                Some(StreamEvent::return_control(payload))
            }
            UpstreamEvent::Other(kind) => {
                warn!(session_id = %self.session_id, kind = %kind, "Ignoring unrecognised upstream record");
                self.record_drop(&kind);
                None
            }
        }
    }

    fn complete(&mut self) -> StreamEvent {
        info!(
            session_id = %self.session_id,
            records = self.record_count,
            chunks = self.chunk_count,
            content_length = self.accumulated.len(),
            "Agent invocation completed"
        );
        self.finish("completed");
        let final_content = std::mem::take(&mut self.accumulated);
        self.emit(StreamEvent::completion(final_content, &self.session_id))
    }

    fn fail(&mut self, err: RelayError) -> StreamEvent {
        error!(
            session_id = %self.session_id,
            agent_id = %self.request.agent_id,
            chunks = self.chunk_count,
            "Agent invocation failed: {}",
            err
        );
        self.finish("failed");
        let event = StreamEvent::error(err.client_message(), err.code().map(str::to_string));
        self.emit(event)
    }

    fn finish(&mut self, outcome: &str) {
        self.terminated = true;
        if let Some(metrics) = &self.metrics {
            metrics.streams_in_flight.dec();
            metrics.streams_total.with_label_values(&[outcome]).inc();
            metrics
                .stream_duration
                .observe(self.started_at.elapsed().as_secs_f64());
        }
    }

    fn emit(&self, event: StreamEvent) -> StreamEvent {
        if let Some(metrics) = &self.metrics {
            metrics
                .events_total
                .with_label_values(&[event.event_type()])
                .inc();
        }
        event
    }

    fn record_drop(&self, kind: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.upstream_dropped_total.with_label_values(&[kind]).inc();
        }
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        if self.started && !self.terminated {
            info!(
                session_id = %self.session_id,
                chunks = self.chunk_count,
                "Client went away, cancelling agent stream"
            );
            self.finish("cancelled");
        }
    }
}
