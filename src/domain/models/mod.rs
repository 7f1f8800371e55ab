//! Domain models: the data the orchestrator and agents agree on.

pub mod agent;
pub mod config;
pub mod health;
pub mod plan;
pub mod step;
pub mod task;

pub use agent::{AgentCapabilities, AgentCard, AgentDescriptor, Skill};
pub use config::{
    AgentEndpoint, BreakerSettings, Config, LlmSettings, LoggingSettings, MetricsSettings,
    PlannerMode, PlannerSettings, SchedulerSettings,
};
pub use health::{HealthReport, HealthStatus};
pub use plan::{ExecutionPlan, ExecutionStep, ExecutionType, StepDraft};
pub use step::{StepOutcome, StepResult};
pub use task::{
    Artifact, Message, MessagePart, MessageRole, SendOutcome, Task, TaskState, TaskStatus,
    TaskUpdate,
};
