//! Ports: the traits the service layer programs against.
//!
//! Production wiring injects the HTTP implementations from
//! `infrastructure`; tests inject in-memory fakes.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::errors::{LlmError, TransportError};
use crate::domain::models::{AgentCard, HealthReport, Message, SendOutcome, Task, TaskUpdate};

/// A live stream of task updates, ordered by arrival, ending with a
/// terminal status update.
pub type UpdateStream = BoxStream<'static, Result<TaskUpdate, TransportError>>;

/// Client side of the A2A protocol.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Submit a message and wait for the terminal task or a bare reply.
    async fn send_message(
        &self,
        base_url: &str,
        message: Message,
    ) -> Result<SendOutcome, TransportError>;

    /// Submit a message and stream task updates until a terminal state.
    async fn stream_message(
        &self,
        base_url: &str,
        message: Message,
    ) -> Result<UpdateStream, TransportError>;

    /// Fetch a task snapshot.
    async fn get_task(&self, base_url: &str, task_id: &str) -> Result<Task, TransportError>;

    /// Request cancellation of an in-flight task.
    async fn cancel_task(&self, base_url: &str, task_id: &str) -> Result<Task, TransportError>;

    /// Fetch the agent card from `/.well-known/agent-card.json`.
    async fn fetch_card(&self, base_url: &str) -> Result<AgentCard, TransportError>;

    /// Probe `/health`.
    async fn health(&self, base_url: &str) -> Result<HealthReport, TransportError>;
}

/// Minimal LLM completion interface used by the planner and the
/// synthesizer. Both have deterministic fallbacks, so the system is
/// operable without any implementation of this trait.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}
