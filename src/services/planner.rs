//! Query planning: natural language in, execution plan out.
//!
//! The primary path prompts the LLM with the query and the agent
//! catalog and validates the returned plan. The deterministic fallback
//! keyword-matches the query against each agent's specialty vocabulary,
//! first match wins, ties broken by catalog declaration order. Both
//! paths produce the same validated [`ExecutionPlan`].

use std::sync::Arc;

use serde::Deserialize;

use crate::domain::errors::{LlmError, PlanError};
use crate::domain::models::{
    AgentDescriptor, ExecutionPlan, ExecutionType, PlannerMode, PlannerSettings, StepDraft,
};
use crate::domain::ports::LlmClient;
use crate::services::circuit_breaker::{BreakerRegistry, BreakerScope};
use crate::services::catalog::AgentCatalog;
use crate::services::extract_json_from_response;

/// Raw plan shape the LLM is asked to produce.
#[derive(Debug, Deserialize)]
struct PlanResponse {
    execution_type: ExecutionType,
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    agent: String,
    task: String,
    #[serde(default)]
    dependencies: Vec<usize>,
}

/// LLM-backed planner with a deterministic fallback.
pub struct Planner {
    catalog: Arc<AgentCatalog>,
    llm: Option<Arc<dyn LlmClient>>,
    breakers: Arc<BreakerRegistry>,
    settings: PlannerSettings,
}

impl Planner {
    pub fn new(
        catalog: Arc<AgentCatalog>,
        llm: Option<Arc<dyn LlmClient>>,
        breakers: Arc<BreakerRegistry>,
        settings: PlannerSettings,
    ) -> Self {
        Self { catalog, llm, breakers, settings }
    }

    /// Decompose a query into a validated execution plan.
    pub async fn plan(&self, query: &str) -> Result<ExecutionPlan, PlanError> {
        let agents = self.catalog.available_agents().await;

        match self.settings.mode {
            PlannerMode::Fallback => self.fallback_plan(query, &agents),
            PlannerMode::Llm => self.llm_plan(query, &agents).await.map_err(|e| match e {
                PlanFailure::Plan(err) => err,
                PlanFailure::Llm(err) => {
                    PlanError::Malformed(format!("LLM planning failed: {err}"))
                }
            }),
            PlannerMode::Auto => match self.llm_plan(query, &agents).await {
                Ok(plan) => Ok(plan),
                Err(err) => {
                    tracing::warn!(error = %err, "LLM planning unavailable; using fallback");
                    self.fallback_plan(query, &agents)
                }
            },
        }
    }

    async fn llm_plan(
        &self,
        query: &str,
        agents: &[AgentDescriptor],
    ) -> Result<ExecutionPlan, PlanFailure> {
        let llm = self.llm.as_ref().ok_or(PlanFailure::Llm(LlmError::NotConfigured))?;
        if agents.is_empty() {
            return Err(PlanFailure::Plan(PlanError::Empty));
        }

        if !self.breakers.try_acquire(&BreakerScope::Llm).await {
            return Err(PlanFailure::Llm(LlmError::Request("llm circuit open".into())));
        }

        let prompt = build_planning_prompt(query, agents);
        let response = match llm.complete(&prompt).await {
            Ok(text) => {
                self.breakers.record_success(&BreakerScope::Llm).await;
                text
            }
            Err(err) => {
                if err.is_transient() {
                    self.breakers.record_failure(&BreakerScope::Llm).await;
                }
                return Err(PlanFailure::Llm(err));
            }
        };

        let plan = parse_plan(&response, agents)?;
        tracing::info!(
            execution_type = %plan.execution_type,
            steps = plan.len(),
            "LLM produced execution plan"
        );
        Ok(plan)
    }

    /// Keyword routing: first specialty match wins; otherwise a single
    /// step targeting the base agent.
    fn fallback_plan(
        &self,
        query: &str,
        agents: &[AgentDescriptor],
    ) -> Result<ExecutionPlan, PlanError> {
        if agents.is_empty() {
            return Err(PlanError::Empty);
        }

        let target = agents
            .iter()
            .find(|agent| agent.matches_query(query))
            .or_else(|| agents.iter().find(|agent| agent.id == self.settings.base_agent))
            .unwrap_or(&agents[0]);

        tracing::info!(agent = %target.id, "fallback planner routed query");
        Ok(ExecutionPlan::single_step(&target.id, query))
    }
}

/// Internal failure type so Auto mode can distinguish "LLM broke" from
/// "LLM answered with an invalid plan" in logs; both fall back.
#[derive(Debug)]
enum PlanFailure {
    Llm(LlmError),
    Plan(PlanError),
}

impl std::fmt::Display for PlanFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Llm(e) => write!(f, "{e}"),
            Self::Plan(e) => write!(f, "{e}"),
        }
    }
}

impl From<PlanError> for PlanFailure {
    fn from(e: PlanError) -> Self {
        Self::Plan(e)
    }
}

fn build_planning_prompt(query: &str, agents: &[AgentDescriptor]) -> String {
    let catalog_text = agents
        .iter()
        .map(|agent| {
            let specialties = agent
                .skills
                .iter()
                .flat_map(|s| s.tags.iter().cloned())
                .collect::<Vec<_>>()
                .join(", ");
            format!("- {}: {} (specialties: {})", agent.id, agent.description, specialties)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a task planner for a multi-agent system.

## Available Agents
{catalog_text}

## User Query
"{query}"

## Instructions
Decompose the query into steps, each handled by one agent. Use parallel
execution when steps are independent, sequential when each step needs the
previous result, hybrid for an arbitrary dependency graph. Dependencies
reference earlier steps by zero-based index.

## Required Output Format (JSON)
{{
  "execution_type": "sequential|parallel|hybrid",
  "steps": [
    {{"agent": "agent_id", "task": "what this agent should do", "dependencies": [0]}}
  ]
}}

IMPORTANT: Output ONLY the JSON object, no other text."#
    )
}

/// Parse and validate an LLM plan reply against the agent catalog.
fn parse_plan(response: &str, agents: &[AgentDescriptor]) -> Result<ExecutionPlan, PlanFailure> {
    let json = extract_json_from_response(response);
    let raw: PlanResponse = serde_json::from_str(&json)
        .map_err(|e| PlanFailure::Plan(PlanError::Malformed(format!("unparseable plan: {e}"))))?;

    if raw.steps.is_empty() {
        return Err(PlanFailure::Plan(PlanError::Empty));
    }
    for step in &raw.steps {
        if !agents.iter().any(|agent| agent.id == step.agent) {
            return Err(PlanFailure::Plan(PlanError::UnknownAgent(step.agent.clone())));
        }
    }

    let drafts = raw
        .steps
        .into_iter()
        .map(|step| StepDraft {
            agent_id: step.agent,
            task_text: step.task,
            dependencies: step.dependencies,
        })
        .collect();

    Ok(ExecutionPlan::new(raw.execution_type, drafts)?)
}
