//! Step result domain models.
//!
//! The scheduler records one `StepResult` per planned step, in
//! declaration order, regardless of completion order. Outcomes are a
//! tagged sum so the synthesizer can distinguish a failure it should
//! report from a skip or a cancellation it should elide.

use serde::{Deserialize, Serialize};

use crate::domain::errors::StepError;

/// How a step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The agent produced a usable result.
    Success { text: String },
    /// The dispatch failed (transport, agent error, circuit open, ...).
    Failed { error: String, error_kind: String },
    /// An upstream dependency failed; this step never dispatched.
    Skipped { dependency: usize },
    /// The run was canceled before or during this step.
    Canceled,
}

impl StepOutcome {
    pub fn failed(error: &StepError) -> Self {
        Self::Failed { error: error.to_string(), error_kind: error.kind().to_string() }
    }
}

/// The record the scheduler keeps for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    #[serde(rename = "stepIndex")]
    pub step_index: usize,
    #[serde(rename = "agentId")]
    pub agent_id: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

impl StepResult {
    pub fn success(
        step_index: usize,
        agent_id: impl Into<String>,
        text: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            step_index,
            agent_id: agent_id.into(),
            outcome: StepOutcome::Success { text: text.into() },
            duration_ms,
        }
    }

    pub fn failed(
        step_index: usize,
        agent_id: impl Into<String>,
        error: &StepError,
        duration_ms: u64,
    ) -> Self {
        Self {
            step_index,
            agent_id: agent_id.into(),
            outcome: StepOutcome::failed(error),
            duration_ms,
        }
    }

    pub fn skipped(step_index: usize, agent_id: impl Into<String>, dependency: usize) -> Self {
        Self {
            step_index,
            agent_id: agent_id.into(),
            outcome: StepOutcome::Skipped { dependency },
            duration_ms: 0,
        }
    }

    pub fn canceled(step_index: usize, agent_id: impl Into<String>, duration_ms: u64) -> Self {
        Self { step_index, agent_id: agent_id.into(), outcome: StepOutcome::Canceled, duration_ms }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StepOutcome::Success { .. })
    }

    /// Successful output text, if any.
    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            StepOutcome::Success { text } => Some(text),
            _ => None,
        }
    }

    /// Stable error description for non-success outcomes.
    pub fn error_message(&self) -> Option<String> {
        match &self.outcome {
            StepOutcome::Success { .. } => None,
            StepOutcome::Failed { error, .. } => Some(error.clone()),
            StepOutcome::Skipped { .. } => Some("dependency_failed".into()),
            StepOutcome::Canceled => Some("canceled".into()),
        }
    }
}
