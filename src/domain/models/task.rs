//! A2A task lifecycle domain models.
//!
//! Tasks, messages, parts, and artifacts as they appear on the wire,
//! plus the lifecycle state machine both agents and the orchestrator
//! enforce. History and artifacts are append-only; a task reaches
//! exactly one terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::TaskError;

/// Lifecycle state of an A2A task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Working => "working",
            Self::InputRequired => "input-required",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Terminal states end the stream and never transition again.
    ///
    /// `input-required` ends the current stream but is resumable, so it
    /// is not terminal.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Allowed lifecycle transitions.
    pub const fn can_transition_to(&self, next: TaskState) -> bool {
        match self {
            Self::Submitted => matches!(next, Self::Working | Self::Canceled),
            Self::Working => matches!(
                next,
                Self::Working
                    | Self::InputRequired
                    | Self::Completed
                    | Self::Failed
                    | Self::Canceled
            ),
            // Resumed with a follow-up message, or canceled while parked.
            Self::InputRequired => matches!(next, Self::Working | Self::Canceled),
            Self::Completed | Self::Failed | Self::Canceled => false,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Agent,
}

/// One part of a multimodal message or artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePart {
    Text {
        text: String,
    },
    Data {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: Value,
    },
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The textual content of this part, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Data { .. } => None,
        }
    }
}

/// An A2A protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub parts: Vec<MessagePart>,
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "taskId", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(rename = "contextId", skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl Message {
    /// A user message carrying a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            parts: vec![MessagePart::text(text)],
            message_id: Uuid::new_v4().to_string(),
            task_id: None,
            context_id: None,
        }
    }

    /// An agent message carrying a single text part.
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Agent,
            parts: vec![MessagePart::text(text)],
            message_id: Uuid::new_v4().to_string(),
            task_id: None,
            context_id: None,
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(MessagePart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A named, append-only output bundle attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub parts: Vec<MessagePart>,
}

impl Artifact {
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), parts: vec![MessagePart::text(text)] }
    }

    /// Concatenated text of all text parts.
    pub fn as_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(MessagePart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Current status of a task: state plus the most recent agent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TaskStatus {
    pub fn new(state: TaskState) -> Self {
        Self { state, message: None, timestamp: Some(Utc::now().to_rfc3339()) }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }
}

/// One in-flight unit of work inside an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "contextId")]
    pub context_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a submitted task from the caller's opening message.
    ///
    /// The task id is generated by the receiving agent; the context id
    /// comes from the caller (generated when absent).
    pub fn submitted(mut message: Message) -> Self {
        let id = Uuid::new_v4().to_string();
        let context_id = message
            .context_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        message.task_id = Some(id.clone());
        message.context_id = Some(context_id.clone());
        let now = Utc::now();
        Self {
            id,
            context_id,
            status: TaskStatus::new(TaskState::Submitted),
            history: vec![message],
            artifacts: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> TaskState {
        self.status.state
    }

    /// Apply a lifecycle transition, rejecting illegal ones.
    pub fn transition(&mut self, status: TaskStatus) -> Result<(), TaskError> {
        let next = status.state;
        if !self.status.state.can_transition_to(next) {
            return Err(TaskError::InvalidTransition {
                from: self.status.state.to_string(),
                to: next.to_string(),
            });
        }
        if next == TaskState::Completed && self.artifacts.is_empty() {
            return Err(TaskError::MissingArtifact);
        }
        if next == TaskState::Failed && status.message.is_none() {
            return Err(TaskError::MissingErrorMessage);
        }
        if let Some(ref message) = status.message {
            self.history.push(message.clone());
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Append a caller message to the history.
    pub fn append_message(&mut self, mut message: Message) {
        message.task_id = Some(self.id.clone());
        message.context_id = Some(self.context_id.clone());
        self.history.push(message);
        self.updated_at = Utc::now();
    }

    /// Append an artifact. Artifacts are never mutated after addition.
    pub fn add_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
        self.updated_at = Utc::now();
    }

    /// Best textual result: artifact text, falling back to the last
    /// status message.
    pub fn result_text(&self) -> String {
        let artifact_text = self
            .artifacts
            .iter()
            .map(Artifact::as_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if !artifact_text.is_empty() {
            return artifact_text;
        }
        self.status
            .message
            .as_ref()
            .map(Message::text)
            .unwrap_or_default()
    }
}

/// The result of `send_message`: either a full task or a bare reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SendOutcome {
    Task(Task),
    Message(Message),
}

/// One event on a task update stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TaskUpdate {
    StatusUpdate {
        #[serde(rename = "taskId")]
        task_id: String,
        #[serde(rename = "contextId")]
        context_id: String,
        status: TaskStatus,
        #[serde(rename = "final")]
        is_final: bool,
    },
    ArtifactUpdate {
        #[serde(rename = "taskId")]
        task_id: String,
        #[serde(rename = "contextId")]
        context_id: String,
        artifact: Artifact,
    },
}

impl TaskUpdate {
    pub fn task_id(&self) -> &str {
        match self {
            Self::StatusUpdate { task_id, .. } | Self::ArtifactUpdate { task_id, .. } => task_id,
        }
    }

    /// True when this update closes the stream.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::StatusUpdate { is_final: true, .. })
    }
}
