//! Orchestrator: the plan → run → synthesize pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::OrchestratorError;
use crate::domain::models::{Config, ExecutionPlan, StepResult};
use crate::domain::ports::{AgentTransport, LlmClient};
use crate::infrastructure::llm::AzureChatClient;
use crate::infrastructure::rpc::HttpAgentTransport;
use crate::services::catalog::AgentCatalog;
use crate::services::circuit_breaker::{BreakerConfig, BreakerRegistry};
use crate::services::planner::Planner;
use crate::services::scheduler::{Scheduler, SchedulerConfig};
use crate::services::synthesizer::Synthesizer;

/// Everything a completed run produced, for callers that want more
/// than the response string.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub query: String,
    pub plan: ExecutionPlan,
    pub results: Vec<StepResult>,
    pub response: String,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

/// Owns the plan and step results for each run; remote agents own their
/// tasks.
pub struct Orchestrator {
    catalog: Arc<AgentCatalog>,
    planner: Planner,
    scheduler: Scheduler,
    synthesizer: Synthesizer,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<AgentCatalog>,
        planner: Planner,
        scheduler: Scheduler,
        synthesizer: Synthesizer,
    ) -> Self {
        Self { catalog, planner, scheduler, synthesizer }
    }

    /// Wire an orchestrator from configuration with the production HTTP
    /// transport and, when configured, the LLM backend.
    pub fn from_config(config: &Config) -> Self {
        let transport: Arc<dyn AgentTransport> = Arc::new(
            HttpAgentTransport::new(
                Duration::from_secs(config.call_timeout_s),
                Duration::from_secs(config.discovery_timeout_s),
            )
            .with_bearer_token(config.auth_token.clone()),
        );
        let llm: Option<Arc<dyn LlmClient>> = config
            .llm
            .clone()
            .map(|settings| Arc::new(AzureChatClient::new(settings)) as Arc<dyn LlmClient>);
        Self::with_components(config, transport, llm)
    }

    /// Wire an orchestrator with injected transport and LLM backends.
    pub fn with_components(
        config: &Config,
        transport: Arc<dyn AgentTransport>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        let catalog = Arc::new(AgentCatalog::new(config.agents.clone(), Arc::clone(&transport)));
        let breakers = Arc::new(BreakerRegistry::new(BreakerConfig::from(&config.breaker)));
        let planner = Planner::new(
            Arc::clone(&catalog),
            llm.clone(),
            Arc::clone(&breakers),
            config.planner.clone(),
        );
        let scheduler = Scheduler::new(
            Arc::clone(&catalog),
            transport,
            Arc::clone(&breakers),
            SchedulerConfig {
                max_parallel: config.max_parallel(),
                step_timeout: Duration::from_secs(config.call_timeout_s),
                run_deadline: config.scheduler.run_deadline_s.map(Duration::from_secs),
                call_remote_cancel: true,
            },
        );
        let synthesizer = Synthesizer::new(llm, breakers);
        Self::new(catalog, planner, scheduler, synthesizer)
    }

    pub fn catalog(&self) -> &Arc<AgentCatalog> {
        &self.catalog
    }

    /// Execute a query end to end.
    ///
    /// `PlanInvalid` aborts before any step runs. A run that completes
    /// always yields a response string, failures described per agent
    /// inline; when the caller's cancel handle or the global deadline
    /// fires, `Canceled` is the run's overall error.
    pub async fn execute(
        &self,
        query: &str,
        context_id: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<ExecutionReport, OrchestratorError> {
        let started = Instant::now();

        if cancel.is_cancelled() {
            return Err(OrchestratorError::Canceled);
        }

        let plan = self.planner.plan(query).await?;
        tracing::info!(
            execution_type = %plan.execution_type,
            steps = plan.len(),
            "plan ready"
        );

        let run = self.scheduler.run(&plan, context_id, cancel).await?;
        if run.canceled {
            tracing::warn!(steps = run.results.len(), "run canceled mid-flight");
            return Err(OrchestratorError::Canceled);
        }

        let response = self.synthesizer.synthesize(query, &run.results).await;

        Ok(ExecutionReport {
            query: query.to_string(),
            plan,
            results: run.results,
            response,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}
