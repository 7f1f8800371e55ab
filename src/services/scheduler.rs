//! DAG scheduler: executes an execution plan against remote agents.
//!
//! Levels run in order with a barrier between them; steps inside a
//! level launch concurrently, chunked by the in-flight cap. A step only
//! dispatches after every blocking dependency succeeded; when one
//! failed, the step is recorded as skipped and its dependents skip
//! transitively. The run never aborts on partial failure: it always
//! returns one result per step, in declaration order.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{OrchestratorError, PlanError, StepError, TransportError};
use crate::domain::models::{
    AgentDescriptor, ExecutionPlan, Message, SendOutcome, StepResult, Task, TaskState, TaskUpdate,
};
use crate::domain::ports::AgentTransport;
use crate::infrastructure::metrics;
use crate::services::catalog::AgentCatalog;
use crate::services::circuit_breaker::{BreakerRegistry, BreakerScope};
use crate::services::context::augment_task_text;

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum in-flight steps; levels are chunked beyond it.
    pub max_parallel: usize,
    /// Per-step deadline, inherited from the transport layer.
    pub step_timeout: Duration,
    /// Global deadline per run. Unbounded when absent.
    pub run_deadline: Option<Duration>,
    /// Call the remote cancel endpoint for in-flight tasks on cancel.
    pub call_remote_cancel: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            step_timeout: Duration::from_secs(30),
            run_deadline: None,
            call_remote_cancel: true,
        }
    }
}

/// Result of one run: the complete result vector plus whether the run
/// was cut short by cancellation or the global deadline.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub results: Vec<StepResult>,
    pub canceled: bool,
}

/// Executes execution plans.
pub struct Scheduler {
    dispatcher: Arc<StepDispatcher>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        catalog: Arc<AgentCatalog>,
        transport: Arc<dyn AgentTransport>,
        breakers: Arc<BreakerRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        let dispatcher = Arc::new(StepDispatcher {
            catalog,
            transport,
            breakers,
            step_timeout: config.step_timeout,
            call_remote_cancel: config.call_remote_cancel,
        });
        Self { dispatcher, config }
    }

    /// Run a plan to completion, honoring dependencies, the concurrency
    /// cap, and cooperative cancellation.
    pub async fn run(
        &self,
        plan: &ExecutionPlan,
        context_id: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, OrchestratorError> {
        if plan.is_empty() {
            return Err(OrchestratorError::Plan(PlanError::Empty));
        }
        let levels = plan.execution_levels().map_err(OrchestratorError::Plan)?;

        // Child token so a global deadline cancels this run only.
        let run_cancel = cancel.child_token();
        let deadline_guard = self.config.run_deadline.map(|deadline| {
            let token = run_cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                tracing::warn!(?deadline, "run deadline reached; canceling");
                token.cancel();
            })
        });

        let n = plan.len();
        let mut slots: Vec<Option<StepResult>> = vec![None; n];
        let mut success_text: Vec<Option<String>> = vec![None; n];
        let mut failed: HashSet<usize> = HashSet::new();

        tracing::info!(
            execution_type = %plan.execution_type,
            steps = n,
            levels = levels.len(),
            "run started"
        );

        for level in &levels {
            for chunk in level.chunks(self.config.max_parallel.max(1)) {
                let mut handles = Vec::new();

                for &index in chunk {
                    let step = &plan.steps[index];

                    // Once canceled, no new step launches.
                    if run_cancel.is_cancelled() {
                        slots[index] = Some(StepResult::canceled(index, &step.agent_id, 0));
                        failed.insert(index);
                        continue;
                    }

                    if let Some(&dep) =
                        plan.blocking_dependencies(index).iter().find(|d| failed.contains(*d))
                    {
                        tracing::debug!(step = index, dependency = dep, "skipping step");
                        slots[index] = Some(StepResult::skipped(index, &step.agent_id, dep));
                        failed.insert(index);
                        continue;
                    }

                    // Context is a snapshot of completed predecessors
                    // taken at dispatch time.
                    let sources: Vec<(String, String)> = plan
                        .context_sources(index)
                        .into_iter()
                        .filter_map(|src| {
                            success_text[src]
                                .clone()
                                .map(|text| (plan.steps[src].agent_id.clone(), text))
                        })
                        .collect();
                    let task_text = augment_task_text(&step.task_text, &sources);

                    let dispatcher = Arc::clone(&self.dispatcher);
                    let agent_id = step.agent_id.clone();
                    let context_id = context_id.map(str::to_string);
                    let token = run_cancel.clone();
                    handles.push((
                        index,
                        tokio::spawn(async move {
                            dispatcher.dispatch(index, agent_id, task_text, context_id, token).await
                        }),
                    ));
                }

                // Barrier: join the chunk, recording results in
                // declaration order regardless of completion order.
                for (index, handle) in handles {
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(err) => StepResult::failed(
                            index,
                            &plan.steps[index].agent_id,
                            &StepError::TaskFailed(format!("step task panicked: {err}")),
                            0,
                        ),
                    };
                    if result.is_success() {
                        success_text[index] = result.text().map(str::to_string);
                    } else {
                        failed.insert(index);
                    }
                    slots[index] = Some(result);
                }
            }
        }

        if let Some(guard) = deadline_guard {
            guard.abort();
        }

        let canceled = run_cancel.is_cancelled();
        let results: Vec<StepResult> = slots.into_iter().flatten().collect();
        debug_assert_eq!(results.len(), n);

        tracing::info!(
            succeeded = results.iter().filter(|r| r.is_success()).count(),
            failed = results.iter().filter(|r| !r.is_success()).count(),
            canceled,
            "run finished"
        );

        Ok(RunOutcome { results, canceled })
    }
}

/// Dispatches one step to one agent with reliability guards.
struct StepDispatcher {
    catalog: Arc<AgentCatalog>,
    transport: Arc<dyn AgentTransport>,
    breakers: Arc<BreakerRegistry>,
    step_timeout: Duration,
    call_remote_cancel: bool,
}

impl StepDispatcher {
    async fn dispatch(
        self: Arc<Self>,
        index: usize,
        agent_id: String,
        task_text: String,
        context_id: Option<String>,
        cancel: CancellationToken,
    ) -> StepResult {
        let start = Instant::now();

        let agent = match self.catalog.get(&agent_id).await {
            Some(agent) if agent.available => agent,
            _ => {
                let error = StepError::AgentUnavailable(agent_id.clone());
                metrics::record_request(&agent_id, "send_message", error.kind());
                metrics::record_error(&agent_id, error.kind());
                return StepResult::failed(index, &agent_id, &error, elapsed_ms(start));
            }
        };

        let scope = BreakerScope::agent(&agent_id);
        if !self.breakers.try_acquire(&scope).await {
            let error = StepError::CircuitOpen { scope: scope.to_string() };
            metrics::record_request(&agent_id, "send_message", "circuit_open");
            metrics::record_error(&agent_id, "circuit_open");
            tracing::warn!(step = index, agent = %agent_id, "circuit open; step rejected");
            return StepResult::failed(index, &agent_id, &error, elapsed_ms(start));
        }

        let mut message = Message::user_text(task_text);
        if let Some(context_id) = context_id {
            message = message.with_context_id(context_id);
        }

        // Task id observed on the stream, for the remote cancel path.
        let in_flight: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let outcome = tokio::select! {
            () = cancel.cancelled() => {
                self.signal_remote_cancel(&agent, &in_flight);
                Err(StepError::Canceled)
            }
            outcome = self.call_agent(&agent, message, Arc::clone(&in_flight)) => outcome,
        };

        let duration_ms = elapsed_ms(start);
        match outcome {
            Ok(text) => {
                self.breakers.record_success(&scope).await;
                metrics::record_request(&agent_id, "send_message", "success");
                metrics::observe_request_duration(
                    &agent_id,
                    "send_message",
                    start.elapsed().as_secs_f64(),
                );
                tracing::debug!(step = index, agent = %agent_id, duration_ms, "step succeeded");
                StepResult::success(index, &agent_id, text, duration_ms)
            }
            Err(error) => {
                if error.counts_as_breaker_failure() {
                    self.breakers.record_failure(&scope).await;
                }
                if error != StepError::Canceled {
                    metrics::record_request(&agent_id, "send_message", error.kind());
                    metrics::record_error(&agent_id, error.kind());
                    metrics::observe_request_duration(
                        &agent_id,
                        "send_message",
                        start.elapsed().as_secs_f64(),
                    );
                }
                tracing::warn!(step = index, agent = %agent_id, error = %error, "step failed");
                if error == StepError::Canceled {
                    StepResult::canceled(index, &agent_id, duration_ms)
                } else {
                    StepResult::failed(index, &agent_id, &error, duration_ms)
                }
            }
        }
    }

    /// Best-effort remote cancellation of an observed in-flight task.
    fn signal_remote_cancel(&self, agent: &AgentDescriptor, in_flight: &Arc<Mutex<Option<String>>>) {
        if !self.call_remote_cancel {
            return;
        }
        let task_id = in_flight.lock().ok().and_then(|guard| guard.clone());
        if let Some(task_id) = task_id {
            let transport = Arc::clone(&self.transport);
            let base_url = agent.base_url.clone();
            tokio::spawn(async move {
                if let Err(err) = transport.cancel_task(&base_url, &task_id).await {
                    tracing::debug!(task_id = %task_id, error = %err, "remote cancel failed");
                }
            });
        }
    }

    /// Send the message over the preferred channel and reduce the reply
    /// to a result text.
    async fn call_agent(
        &self,
        agent: &AgentDescriptor,
        message: Message,
        in_flight: Arc<Mutex<Option<String>>>,
    ) -> Result<String, StepError> {
        let fut = async {
            if agent.capabilities.streaming {
                self.stream_task(agent, message, in_flight).await
            } else {
                let outcome = self.transport.send_message(&agent.base_url, message).await?;
                match outcome {
                    SendOutcome::Task(task) => reduce_terminal_task(&task),
                    SendOutcome::Message(reply) => Ok(reply.text()),
                }
            }
        };

        match timeout(self.step_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StepError::Transport(TransportError::Timeout {
                seconds: self.step_timeout.as_secs(),
            })),
        }
    }

    async fn stream_task(
        &self,
        agent: &AgentDescriptor,
        message: Message,
        in_flight: Arc<Mutex<Option<String>>>,
    ) -> Result<String, StepError> {
        let mut stream = self.transport.stream_message(&agent.base_url, message).await?;
        let mut artifact_texts: Vec<String> = Vec::new();

        while let Some(update) = stream.next().await {
            let update = update?;
            if let Ok(mut guard) = in_flight.lock() {
                guard.get_or_insert_with(|| update.task_id().to_string());
            }
            match update {
                TaskUpdate::ArtifactUpdate { artifact, .. } => {
                    let text = artifact.as_text();
                    if !text.is_empty() {
                        artifact_texts.push(text);
                    }
                }
                TaskUpdate::StatusUpdate { status, is_final, .. } => {
                    if !is_final {
                        continue;
                    }
                    let status_text = status.message.as_ref().map(Message::text);
                    return match status.state {
                        TaskState::Completed => {
                            if artifact_texts.is_empty() {
                                Ok(status_text.unwrap_or_default())
                            } else {
                                Ok(artifact_texts.join("\n"))
                            }
                        }
                        TaskState::Failed => Err(StepError::TaskFailed(
                            status_text.unwrap_or_else(|| "task failed".into()),
                        )),
                        TaskState::Canceled => Err(StepError::Canceled),
                        TaskState::InputRequired => Err(StepError::InputRequired),
                        state => Err(StepError::Transport(TransportError::Protocol(format!(
                            "stream ended in non-terminal state {state}"
                        )))),
                    };
                }
            }
        }

        Err(StepError::Transport(TransportError::Protocol(
            "stream closed without terminal status".into(),
        )))
    }
}

/// Reduce a terminal task returned by a synchronous `send_message`.
fn reduce_terminal_task(task: &Task) -> Result<String, StepError> {
    match task.state() {
        TaskState::Completed => Ok(task.result_text()),
        TaskState::Failed => {
            let text = task.status.message.as_ref().map(Message::text);
            Err(StepError::TaskFailed(text.unwrap_or_else(|| "task failed".into())))
        }
        TaskState::Canceled => Err(StepError::Canceled),
        TaskState::InputRequired => Err(StepError::InputRequired),
        state => Err(StepError::Transport(TransportError::Protocol(format!(
            "send_message returned non-terminal task in state {state}"
        )))),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Artifact, TaskStatus};

    #[test]
    fn config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.step_timeout, Duration::from_secs(30));
        assert!(config.run_deadline.is_none());
        assert!(config.call_remote_cancel);
    }

    #[test]
    fn reduce_completed_task_prefers_artifacts() {
        let mut task = Task::submitted(Message::user_text("q"));
        task.transition(TaskStatus::new(TaskState::Working)).unwrap();
        task.add_artifact(Artifact::text("result", "42"));
        task.transition(TaskStatus::new(TaskState::Completed)).unwrap();
        assert_eq!(reduce_terminal_task(&task).unwrap(), "42");
    }

    #[test]
    fn reduce_failed_task_carries_message() {
        let mut task = Task::submitted(Message::user_text("q"));
        task.transition(TaskStatus::new(TaskState::Working)).unwrap();
        task.transition(
            TaskStatus::new(TaskState::Failed).with_message(Message::agent_text("overloaded")),
        )
        .unwrap();
        match reduce_terminal_task(&task).unwrap_err() {
            StepError::TaskFailed(message) => assert_eq!(message, "overloaded"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn reduce_non_terminal_task_is_protocol_violation() {
        let task = Task::submitted(Message::user_text("q"));
        assert!(matches!(
            reduce_terminal_task(&task).unwrap_err(),
            StepError::Transport(TransportError::Protocol(_))
        ));
    }
}
