//! Domain error types for the orchestration runtime.
//!
//! Each enum covers one failure domain: transport framing, plan
//! validation, task lifecycle, LLM access, and step dispatch. The
//! orchestrator never panics on a remote failure; everything a remote
//! agent can do wrong is representable here.

use thiserror::Error;

/// Errors from the network / JSON-RPC framing layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// TCP/TLS connect failed or the peer vanished.
    #[error("agent unreachable: {0}")]
    Unreachable(String),

    /// The call exceeded its per-call deadline.
    #[error("transport timeout after {seconds}s")]
    Timeout { seconds: u64 },

    /// The response violated JSON-RPC 2.0 framing.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The agent returned a JSON-RPC error object.
    #[error("agent error {code}: {message}")]
    Agent { code: i64, message: String },
}

impl TransportError {
    /// Stable label for the `a2a_errors_total{error_type}` metric.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "transport_unreachable",
            Self::Timeout { .. } => "transport_timeout",
            Self::Protocol(_) => "protocol_violation",
            Self::Agent { .. } => "agent_error",
        }
    }

    /// Returns true if this error could succeed on a later attempt.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout { .. })
    }
}

/// Errors rejecting a planner output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The validated plan had zero steps.
    #[error("plan has no steps")]
    Empty,

    /// A step targets an agent that is not in the catalog.
    #[error("plan references unknown agent: {0}")]
    UnknownAgent(String),

    /// A step depends on itself or on a later step.
    #[error("step {step} depends on step {dependency}, which is not an earlier step")]
    ForwardDependency { step: usize, dependency: usize },

    /// The dependency graph contains a cycle.
    #[error("cycle detected in step dependencies")]
    CycleDetected,

    /// The plan payload could not be interpreted.
    #[error("malformed plan: {0}")]
    Malformed(String),
}

/// Errors from the task lifecycle state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task with the given ID was not found.
    #[error("task not found: {0}")]
    NotFound(String),

    /// The task is in a terminal state and cannot be canceled.
    #[error("task {task_id} cannot be canceled in state {state}")]
    NotCancelable { task_id: String, state: String },

    /// Invalid lifecycle transition attempted.
    #[error("invalid task transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A task completed without any artifact.
    #[error("completed task must carry at least one artifact")]
    MissingArtifact,

    /// A task failed without an error message in its final status.
    #[error("failed task must carry an error message")]
    MissingErrorMessage,
}

/// Errors from the LLM backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// No LLM endpoint is configured.
    #[error("LLM backend not configured")]
    NotConfigured,

    /// The HTTP request itself failed.
    #[error("LLM request failed: {0}")]
    Request(String),

    /// The API returned a non-success status.
    #[error("LLM API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The API returned no usable text.
    #[error("LLM returned no text content")]
    EmptyResponse,

    /// The reply could not be parsed into the expected shape.
    #[error("malformed LLM response: {0}")]
    Malformed(String),
}

impl LlmError {
    /// Returns true if this error could succeed on a later attempt.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Why a single step did not produce a successful result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// The outbound call failed at the transport layer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The circuit breaker for this agent refused the call.
    #[error("circuit open for {scope}")]
    CircuitOpen { scope: String },

    /// An upstream dependency failed, so this step was skipped.
    #[error("dependency_failed")]
    DependencyFailed { dependency: usize },

    /// The run was canceled before or during this step.
    #[error("canceled")]
    Canceled,

    /// The target agent is unknown or was marked unavailable at discovery.
    #[error("agent unavailable: {0}")]
    AgentUnavailable(String),

    /// The agent ended the task asking for user input mid-plan.
    #[error("input_required")]
    InputRequired,

    /// The agent reached a terminal state without a usable result.
    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl StepError {
    /// Stable label for the `a2a_errors_total{error_type}` metric.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(t) => t.kind(),
            Self::CircuitOpen { .. } => "circuit_open",
            Self::DependencyFailed { .. } => "dependency_failed",
            Self::Canceled => "canceled",
            Self::AgentUnavailable(_) => "agent_unavailable",
            Self::InputRequired => "input_required",
            Self::TaskFailed(_) => "task_failed",
        }
    }

    /// Whether this failure counts toward the circuit breaker.
    ///
    /// Timeouts and transport errors count; agent-level task failures,
    /// planned cancellations, and breaker rejections themselves do not.
    pub const fn counts_as_breaker_failure(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Top-level failures of a `Run`.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The planner output was rejected; no steps executed.
    #[error("invalid plan: {0}")]
    Plan(#[from] PlanError),

    /// The run was canceled before any step was scheduled.
    #[error("run canceled")]
    Canceled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_kinds() {
        assert_eq!(
            TransportError::Unreachable("refused".into()).kind(),
            "transport_unreachable"
        );
        assert_eq!(TransportError::Timeout { seconds: 30 }.kind(), "transport_timeout");
        assert_eq!(
            TransportError::Protocol("bad frame".into()).kind(),
            "protocol_violation"
        );
        assert_eq!(
            TransportError::Agent { code: -32601, message: "nope".into() }.kind(),
            "agent_error"
        );
    }

    #[test]
    fn transport_transience() {
        assert!(TransportError::Timeout { seconds: 30 }.is_transient());
        assert!(TransportError::Unreachable("x".into()).is_transient());
        assert!(!TransportError::Protocol("x".into()).is_transient());
        assert!(!TransportError::Agent { code: 1, message: "x".into() }.is_transient());
    }

    #[test]
    fn step_error_display_is_stable() {
        assert_eq!(
            StepError::DependencyFailed { dependency: 0 }.to_string(),
            "dependency_failed"
        );
        assert_eq!(StepError::Canceled.to_string(), "canceled");
        assert_eq!(StepError::InputRequired.to_string(), "input_required");
    }

    #[test]
    fn breaker_failure_accounting() {
        let timeout = StepError::Transport(TransportError::Timeout { seconds: 30 });
        assert!(timeout.counts_as_breaker_failure());
        assert!(!StepError::TaskFailed("agent said no".into()).counts_as_breaker_failure());
        assert!(!StepError::Canceled.counts_as_breaker_failure());
        assert!(!StepError::CircuitOpen { scope: "agent:calc".into() }.counts_as_breaker_failure());
        assert!(!StepError::DependencyFailed { dependency: 2 }.counts_as_breaker_failure());
    }

    #[test]
    fn llm_error_transience() {
        assert!(LlmError::Api { status: 503, message: "busy".into() }.is_transient());
        assert!(LlmError::Api { status: 429, message: "slow down".into() }.is_transient());
        assert!(!LlmError::Api { status: 400, message: "bad".into() }.is_transient());
        assert!(!LlmError::NotConfigured.is_transient());
    }
}
