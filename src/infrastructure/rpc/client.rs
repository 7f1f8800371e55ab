//! HTTP client side of the A2A protocol.
//!
//! One shared `reqwest::Client` (keep-alive connection pool) serves
//! every outbound call. Responses are validated against JSON-RPC 2.0
//! framing before their payload is interpreted.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use crate::domain::errors::TransportError;
use crate::domain::models::{AgentCard, HealthReport, Message, SendOutcome, Task, TaskUpdate};
use crate::domain::ports::{AgentTransport, UpdateStream};
use crate::infrastructure::rpc::{JsonRpcRequest, JsonRpcResponse};

/// HTTP implementation of [`AgentTransport`].
pub struct HttpAgentTransport {
    client: reqwest::Client,
    call_timeout: Duration,
    discovery_timeout: Duration,
    bearer_token: Option<String>,
}

impl HttpAgentTransport {
    pub fn new(call_timeout: Duration, discovery_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, call_timeout, discovery_timeout, bearer_token: None }
    }

    /// Attach a bearer token to every outbound request.
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    fn map_request_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout { seconds: self.call_timeout.as_secs() }
        } else if err.is_decode() {
            TransportError::Protocol(format!("undecodable response: {err}"))
        } else {
            TransportError::Unreachable(err.to_string())
        }
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// POST a JSON-RPC request and return the validated `result` value.
    async fn rpc_call(
        &self,
        base_url: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, TransportError> {
        let request = JsonRpcRequest::new(method, params);
        let response = self
            .apply_auth(self.client.post(base_url))
            .timeout(self.call_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Protocol(format!("unexpected HTTP status {status}")));
        }

        let body: Value = response.json().await.map_err(|e| self.map_request_error(e))?;
        validate_envelope(body)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        let response = self
            .apply_auth(self.client.get(url))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Protocol(format!("unexpected HTTP status {status}")));
        }

        let body: Value = response.json().await.map_err(|e| self.map_request_error(e))?;
        serde_json::from_value(body)
            .map_err(|e| TransportError::Protocol(format!("invalid payload: {e}")))
    }
}

/// Enforce JSON-RPC 2.0 framing: version "2.0", `result` xor `error`.
fn validate_envelope(body: Value) -> Result<Value, TransportError> {
    let response: JsonRpcResponse = serde_json::from_value(body)
        .map_err(|e| TransportError::Protocol(format!("not a JSON-RPC response: {e}")))?;

    if response.jsonrpc != "2.0" {
        return Err(TransportError::Protocol(format!(
            "unsupported jsonrpc version: {:?}",
            response.jsonrpc
        )));
    }
    match (response.result, response.error) {
        (Some(_), Some(_)) => {
            Err(TransportError::Protocol("response carries both result and error".into()))
        }
        (None, None) => {
            Err(TransportError::Protocol("response carries neither result nor error".into()))
        }
        (None, Some(error)) => {
            Err(TransportError::Agent { code: error.code, message: error.message })
        }
        (Some(result), None) => Ok(result),
    }
}

/// Incremental server-sent-events parser. Feeds chunks into `buffer`
/// and drains complete events, returning their joined `data` payloads.
fn drain_sse_events(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(boundary) = buffer.find("\n\n") {
        let event: String = buffer.drain(..boundary + 2).collect();
        let data: Vec<&str> = event
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim_start)
            .collect();
        if !data.is_empty() {
            payloads.push(data.join("\n"));
        }
    }
    payloads
}

/// Decode one SSE data payload into a task update.
fn decode_update(payload: &str) -> Result<TaskUpdate, TransportError> {
    let body: Value = serde_json::from_str(payload)
        .map_err(|e| TransportError::Protocol(format!("undecodable stream event: {e}")))?;
    let result = validate_envelope(body)?;
    serde_json::from_value(result)
        .map_err(|e| TransportError::Protocol(format!("invalid task update: {e}")))
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    async fn send_message(
        &self,
        base_url: &str,
        message: Message,
    ) -> Result<SendOutcome, TransportError> {
        let result = self.rpc_call(base_url, "send_message", json!({ "message": message })).await?;
        serde_json::from_value(result)
            .map_err(|e| TransportError::Protocol(format!("invalid send_message result: {e}")))
    }

    async fn stream_message(
        &self,
        base_url: &str,
        message: Message,
    ) -> Result<UpdateStream, TransportError> {
        let url = format!("{}/stream", base_url.trim_end_matches('/'));
        let request = JsonRpcRequest::new("send_message", json!({ "message": message }));
        let response = self
            .apply_auth(self.client.post(&url))
            .header("accept", "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Protocol(format!("unexpected HTTP status {status}")));
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut buffer = String::new();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = chunk
                    .map_err(|e| TransportError::Unreachable(format!("stream interrupted: {e}")))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                for payload in drain_sse_events(&mut buffer) {
                    let update = decode_update(&payload)?;
                    let done = update.is_final();
                    yield update;
                    if done {
                        break 'outer;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn get_task(&self, base_url: &str, task_id: &str) -> Result<Task, TransportError> {
        let result = self.rpc_call(base_url, "get_task", json!({ "taskId": task_id })).await?;
        serde_json::from_value(result)
            .map_err(|e| TransportError::Protocol(format!("invalid task payload: {e}")))
    }

    async fn cancel_task(&self, base_url: &str, task_id: &str) -> Result<Task, TransportError> {
        let result = self.rpc_call(base_url, "cancel_task", json!({ "taskId": task_id })).await?;
        serde_json::from_value(result)
            .map_err(|e| TransportError::Protocol(format!("invalid task payload: {e}")))
    }

    async fn fetch_card(&self, base_url: &str) -> Result<AgentCard, TransportError> {
        let url = format!("{}/.well-known/agent-card.json", base_url.trim_end_matches('/'));
        self.get_json(&url, self.discovery_timeout).await
    }

    async fn health(&self, base_url: &str) -> Result<HealthReport, TransportError> {
        let url = format!("{}/health", base_url.trim_end_matches('/'));
        self.get_json(&url, self.discovery_timeout).await
    }
}
