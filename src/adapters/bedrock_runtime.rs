//! Agent runtime backed by the AWS SDK
//!
//! Opens `InvokeAgent` calls and converts the SDK's response stream into
//! [`UpstreamEvent`] records. Credentials come from the default provider chain.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_bedrockagentruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockagentruntime::primitives::event_stream::EventReceiver;
use aws_sdk_bedrockagentruntime::types::error::ResponseStreamError;
use aws_sdk_bedrockagentruntime::types::{
    ApiRequestBody, InvocationInputMember, Parameter, ResponseStream, ReturnControlPayload,
    SessionState, Trace, TracePart,
};
use aws_sdk_bedrockagentruntime::Client as AgentClient;
use aws_sdk_sts::Client as StsClient;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::AwsSettings;
use crate::domain::{AgentInvocation, AgentRuntimePort, CallerIdentity, UpstreamEvent, UpstreamStream};
use crate::relay::error::{RelayError, RelayResult};
use crate::relay::sanitize::sanitize_message;

/// Remote agent runtime reached through `bedrock-agent-runtime`
#[derive(Clone)]
pub struct BedrockAgentRuntime {
    agent: AgentClient,
    sts: StsClient,
    enable_trace: bool,
    read_timeout: Duration,
}

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(300);

impl BedrockAgentRuntime {
    /// Build clients from settings using the default credential chain
    pub async fn from_settings(settings: &AwsSettings) -> anyhow::Result<Self> {
        let sdk_config = Self::build_aws_config(settings).await;
        Ok(Self::from_sdk_config(&sdk_config, settings.endpoint_url.as_deref())
            .with_read_timeout(Duration::from_secs(settings.read_timeout_secs)))
    }

    /// Build clients from an already loaded SDK config
    ///
    /// The endpoint override applies to the agent runtime only; STS keeps its
    /// regional endpoint.
    pub fn from_sdk_config(sdk_config: &SdkConfig, endpoint_url: Option<&str>) -> Self {
        let mut builder = aws_sdk_bedrockagentruntime::config::Builder::from(sdk_config);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            agent: AgentClient::from_conf(builder.build()),
            sts: StsClient::new(sdk_config),
            enable_trace: false,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Ask the service to include trace records in the response stream
    pub fn with_trace(mut self, enable_trace: bool) -> Self {
        self.enable_trace = enable_trace;
        self
    }

    /// Longest silence tolerated between two records of one response stream
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    async fn build_aws_config(settings: &AwsSettings) -> SdkConfig {
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .read_timeout(Duration::from_secs(settings.read_timeout_secs))
            .build();

        // A retried InvokeAgent would start a second agent turn.
        let loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .timeout_config(timeouts)
            .retry_config(RetryConfig::disabled());

        debug!(region = %settings.region, "Loading AWS config from default credential chain");
        loader.load().await
    }
}

#[async_trait]
impl AgentRuntimePort for BedrockAgentRuntime {
    async fn invoke(&self, invocation: AgentInvocation) -> RelayResult<UpstreamStream> {
        let mut request = self
            .agent
            .invoke_agent()
            .agent_id(invocation.agent_id)
            .agent_alias_id(invocation.agent_alias_id)
            .session_id(invocation.session_id)
            .input_text(invocation.input_text)
            .enable_trace(self.enable_trace);

        if !invocation.session_attributes.is_empty()
            || !invocation.prompt_session_attributes.is_empty()
        {
            let mut state = SessionState::builder();
            if !invocation.session_attributes.is_empty() {
                state = state.set_session_attributes(Some(invocation.session_attributes));
            }
            if !invocation.prompt_session_attributes.is_empty() {
                state = state.set_prompt_session_attributes(Some(invocation.prompt_session_attributes));
            }
            request = request.session_state(state.build());
        }

        let output = request.send().await.map_err(relay_error)?;
        Ok(records(output.completion, self.read_timeout))
    }

    async fn probe(&self) -> anyhow::Result<CallerIdentity> {
        let identity = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(sanitize_message(&DisplayErrorContext(&e).to_string())))?;

        Ok(CallerIdentity {
            account: identity.account().unwrap_or_default().to_string(),
            arn: identity.arn().unwrap_or_default().to_string(),
        })
    }
}

/// Pull records off the SDK receiver until it ends, fails or goes silent
fn records(
    receiver: EventReceiver<ResponseStream, ResponseStreamError>,
    read_timeout: Duration,
) -> UpstreamStream {
    let upstream = futures::stream::unfold(Some(receiver), |state| async move {
        let mut receiver = state?;
        match receiver.recv().await {
            Ok(Some(record)) => Some((Ok(upstream_event(record)), Some(receiver))),
            Ok(None) => None,
            Err(e) => Some((Err(relay_error(e)), None)),
        }
    });
    idle_timeout(upstream.boxed(), read_timeout)
}

/// End `upstream` with a transport error once no record arrives within `limit`
///
/// The SDK read timeout does not cover the gaps between event stream frames.
pub(crate) fn idle_timeout(upstream: UpstreamStream, limit: Duration) -> UpstreamStream {
    futures::stream::unfold(Some(upstream), move |state| async move {
        let mut upstream = state?;
        match tokio::time::timeout(limit, upstream.next()).await {
            Ok(Some(Ok(record))) => Some((Ok(record), Some(upstream))),
            Ok(Some(Err(e))) => Some((Err(e), None)),
            Ok(None) => None,
            Err(_) => {
                warn!(timeout = ?limit, "Upstream went silent, closing stream");
                let err = RelayError::Transport(format!("upstream read timed out after {:?}", limit));
                Some((Err(err), None))
            }
        }
    })
    .boxed()
}

fn upstream_event(record: ResponseStream) -> UpstreamEvent {
    match record {
        ResponseStream::Chunk(part) => match part.bytes {
            Some(blob) => UpstreamEvent::Chunk(Bytes::from(blob.into_inner())),
            None => UpstreamEvent::Other("empty_chunk".to_string()),
        },
        ResponseStream::Trace(part) => UpstreamEvent::Trace(trace_value(&part)),
        ResponseStream::ReturnControl(payload) => {
            UpstreamEvent::ReturnControl(return_control_value(&payload))
        }
        other => UpstreamEvent::Other(snake_case(&variant_name(&format!("{:?}", other)))),
    }
}

fn trace_value(part: &TracePart) -> Value {
    json!({
        "session_id": part.session_id,
        "agent_id": part.agent_id,
        "agent_alias_id": part.agent_alias_id,
        "agent_version": part.agent_version,
        "trace": part.trace.as_ref().map(trace_detail),
    })
}

// The nested trace shapes have no serde support. Failure traces are mapped
// field by field; the rest keep their kind plus the SDK's text rendering.
fn trace_detail(trace: &Trace) -> Value {
    let kind = match trace {
        Trace::OrchestrationTrace(_) => "orchestration_trace",
        Trace::PreProcessingTrace(_) => "pre_processing_trace",
        Trace::PostProcessingTrace(_) => "post_processing_trace",
        Trace::GuardrailTrace(_) => "guardrail_trace",
        Trace::FailureTrace(failure) => {
            return json!({
                "type": "failure_trace",
                "trace_id": failure.trace_id,
                "failure_reason": failure.failure_reason,
            })
        }
        _ => "unknown",
    };
    json!({ "type": kind, "detail": format!("{:?}", trace) })
}

fn return_control_value(payload: &ReturnControlPayload) -> Value {
    let inputs: Vec<Value> = payload
        .invocation_inputs
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(invocation_input_value)
        .collect();

    json!({
        "invocation_id": payload.invocation_id,
        "invocation_inputs": inputs,
    })
}

fn invocation_input_value(input: &InvocationInputMember) -> Value {
    match input {
        InvocationInputMember::FunctionInvocationInput(function) => {
            let parameters: Vec<Value> = function
                .parameters
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|p| json!({ "name": p.name, "type": p.r#type, "value": p.value }))
                .collect();
            json!({
                "function_invocation_input": {
                    "action_group": function.action_group,
                    "function": function.function,
                    "parameters": parameters,
                }
            })
        }
        InvocationInputMember::ApiInvocationInput(api) => {
            let parameters: Vec<Value> = api
                .parameters
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|p| json!({ "name": p.name, "type": p.r#type, "value": p.value }))
                .collect();
            json!({
                "api_invocation_input": {
                    "action_group": api.action_group,
                    "http_method": api.http_method,
                    "api_path": api.api_path,
                    "parameters": parameters,
                    "request_body": api.request_body.as_ref().map(request_body_value),
                }
            })
        }
        other => json!({ "unknown": format!("{:?}", other) }),
    }
}

fn parameter_value(p: &Parameter) -> Value {
    json!({ "name": p.name, "type": p.r#type, "value": p.value })
}

/// `{"content": {<media type>: {"properties": [<parameter>, ..]}}}`
fn request_body_value(body: &ApiRequestBody) -> Value {
    let content: serde_json::Map<String, Value> = body
        .content
        .iter()
        .flatten()
        .map(|(media_type, schema)| {
            let properties: Vec<Value> = schema
                .properties
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(parameter_value)
                .collect();
            (media_type.clone(), json!({ "properties": properties }))
        })
        .collect();
    json!({ "content": content })
}

/// Map an SDK failure to a relay error, keeping the service code when present
fn relay_error<E, R>(err: SdkError<E, R>) -> RelayError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(context) => {
            let service_err = context.err();
            let code = service_err
                .code()
                .map(str::to_string)
                .unwrap_or_else(|| variant_name(&format!("{:?}", service_err)));
            let message = service_err
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| service_err.to_string());
            RelayError::service(code, message)
        }
        _ => RelayError::Transport(DisplayErrorContext(&err).to_string()),
    }
}

/// Leading identifier of a `Debug` rendering, e.g. `Files` for `Files(FilePart { .. })`
fn variant_name(debug: &str) -> String {
    let name: String = debug
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        "Unknown".to_string()
    } else {
        name
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
