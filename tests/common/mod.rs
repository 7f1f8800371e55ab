//! Shared helpers for the integration suites: in-process agent
//! servers, scripted executors, a scripted transport, and a scripted
//! LLM.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;

use overture::adapters::agent::{
    AgentExecutor, AgentRegistration, AgentServer, ExecutorStream, ExecutorUpdate,
};
use overture::domain::errors::{LlmError, TransportError};
use overture::domain::models::{
    AgentCapabilities, AgentCard, AgentEndpoint, Artifact, Config, HealthReport, Message,
    SendOutcome, Skill, Task, TaskState, TaskStatus,
};
use overture::domain::ports::{AgentTransport, LlmClient, UpdateStream};

/// Spawn a real agent server on an ephemeral port; returns its base URL.
pub async fn spawn_agent(id: &str, tags: &[&str], executor: Arc<dyn AgentExecutor>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let url = format!("http://{addr}");

    let skill = tags
        .iter()
        .fold(Skill::new(id, id), |skill, tag| skill.with_tag(*tag));
    let registration = AgentRegistration::new(id, format!("{id} agent"))
        .with_description(format!("{id} test agent"))
        .with_url(url.clone())
        .with_skill(skill);

    let router = AgentServer::new(registration, executor).router();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    url
}

/// Orchestrator config pointing at the given live agents.
pub fn config_for(agents: &[(&str, &str)]) -> Config {
    Config {
        agents: agents
            .iter()
            .map(|(id, url)| AgentEndpoint { id: (*id).into(), base_url: (*url).into() })
            .collect(),
        call_timeout_s: 5,
        discovery_timeout_s: 5,
        ..Config::default()
    }
}

/// Executor replying with a fixed completion after one working update.
pub struct FixedExecutor {
    pub reply: String,
}

impl FixedExecutor {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }
}

impl AgentExecutor for FixedExecutor {
    fn stream(&self, _query: String, _context_id: String) -> ExecutorStream {
        let reply = self.reply.clone();
        Box::pin(async_stream::stream! {
            yield ExecutorUpdate::working("processing");
            yield ExecutorUpdate::completed(reply);
        })
    }
}

/// Executor recording each received query before replying.
pub struct RecordingExecutor {
    pub reply: String,
    pub received: Arc<Mutex<Vec<String>>>,
}

impl RecordingExecutor {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), received: Arc::new(Mutex::new(Vec::new())) }
    }
}

impl AgentExecutor for RecordingExecutor {
    fn stream(&self, query: String, _context_id: String) -> ExecutorStream {
        self.received.lock().unwrap().push(query);
        let reply = self.reply.clone();
        Box::pin(async_stream::stream! {
            yield ExecutorUpdate::completed(reply);
        })
    }
}

/// Executor that parks the first request as input-required and
/// completes any follow-up.
pub struct TwoPhaseExecutor {
    asked: AtomicBool,
}

impl TwoPhaseExecutor {
    pub fn new() -> Self {
        Self { asked: AtomicBool::new(false) }
    }
}

impl Default for TwoPhaseExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentExecutor for TwoPhaseExecutor {
    fn stream(&self, query: String, _context_id: String) -> ExecutorStream {
        let first = !self.asked.swap(true, Ordering::SeqCst);
        Box::pin(async_stream::stream! {
            if first {
                yield ExecutorUpdate::input_required("which city do you mean?");
            } else {
                yield ExecutorUpdate::completed(format!("resolved: {query}"));
            }
        })
    }
}

/// Executor sleeping before it completes.
pub struct SlowExecutor {
    pub delay: Duration,
    pub reply: String,
}

impl AgentExecutor for SlowExecutor {
    fn stream(&self, _query: String, _context_id: String) -> ExecutorStream {
        let delay = self.delay;
        let reply = self.reply.clone();
        Box::pin(async_stream::stream! {
            yield ExecutorUpdate::working("starting");
            tokio::time::sleep(delay).await;
            yield ExecutorUpdate::completed(reply);
        })
    }
}

/// How a scripted agent answers `send_message`.
#[derive(Clone)]
pub enum AgentBehavior {
    /// Terminal completed task carrying this artifact text.
    Reply(String),
    /// Completed task whose text is computed from the received text.
    ReplyWith(Arc<dyn Fn(&str) -> String + Send + Sync>),
    /// Sleep, then reply (for completion-order tests).
    DelayedReply(Duration, String),
    /// Transport-level failure.
    Fail(TransportError),
    /// Terminal failed task with this status message.
    FailTask(String),
    /// Never answers (for timeout tests).
    Hang,
}

/// In-memory transport: agents keyed by base URL, no sockets involved.
pub struct ScriptedTransport {
    agents: HashMap<String, (AgentCard, AgentBehavior)>,
    /// Every text dispatched, as `(base_url, text)` pairs.
    pub received: Arc<Mutex<Vec<(String, String)>>>,
    /// Every remote cancel observed, as `(base_url, task_id)` pairs.
    pub cancel_calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedTransport {
    pub fn new(agents: Vec<(&str, AgentBehavior)>) -> (Self, Vec<AgentEndpoint>) {
        let mut map = HashMap::new();
        let mut endpoints = Vec::new();
        for (id, behavior) in agents {
            let base_url = format!("http://{id}.test");
            let card = AgentCard {
                name: id.into(),
                description: format!("{id} agent"),
                url: base_url.clone(),
                version: "1.0.0".into(),
                default_input_modes: vec!["text/plain".into()],
                default_output_modes: vec!["text/plain".into()],
                capabilities: AgentCapabilities::default(),
                skills: vec![Skill::new(id, id)],
            };
            map.insert(base_url.clone(), (card, behavior));
            endpoints.push(AgentEndpoint { id: id.into(), base_url });
        }
        (
            Self {
                agents: map,
                received: Arc::new(Mutex::new(Vec::new())),
                cancel_calls: Arc::new(Mutex::new(Vec::new())),
            },
            endpoints,
        )
    }

    /// Texts received by one agent.
    pub fn received_by(&self, base_url: &str) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url == base_url)
            .map(|(_, text)| text.clone())
            .collect()
    }

    fn completed_task(message: Message, text: &str) -> Task {
        let mut task = Task::submitted(message);
        task.transition(TaskStatus::new(TaskState::Working)).expect("working");
        task.add_artifact(Artifact::text("result", text));
        task.transition(TaskStatus::new(TaskState::Completed)).expect("completed");
        task
    }

    fn failed_task(message: Message, error: &str) -> Task {
        let mut task = Task::submitted(message);
        task.transition(TaskStatus::new(TaskState::Working)).expect("working");
        task.transition(TaskStatus::new(TaskState::Failed).with_message(Message::agent_text(error)))
            .expect("failed");
        task
    }
}

#[async_trait]
impl AgentTransport for ScriptedTransport {
    async fn send_message(
        &self,
        base_url: &str,
        message: Message,
    ) -> Result<SendOutcome, TransportError> {
        let (_, behavior) = self
            .agents
            .get(base_url)
            .ok_or_else(|| TransportError::Unreachable(format!("unknown agent {base_url}")))?;
        let text = message.text();
        self.received.lock().unwrap().push((base_url.to_string(), text.clone()));

        match behavior {
            AgentBehavior::Reply(reply) => {
                Ok(SendOutcome::Task(Self::completed_task(message, reply)))
            }
            AgentBehavior::ReplyWith(f) => {
                let reply = f(&text);
                Ok(SendOutcome::Task(Self::completed_task(message, &reply)))
            }
            AgentBehavior::DelayedReply(delay, reply) => {
                tokio::time::sleep(*delay).await;
                Ok(SendOutcome::Task(Self::completed_task(message, reply)))
            }
            AgentBehavior::Fail(error) => Err(error.clone()),
            AgentBehavior::FailTask(error) => {
                Ok(SendOutcome::Task(Self::failed_task(message, error)))
            }
            AgentBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError::Unreachable("hung".into()))
            }
        }
    }

    async fn stream_message(
        &self,
        _base_url: &str,
        _message: Message,
    ) -> Result<UpdateStream, TransportError> {
        Err(TransportError::Protocol("scripted transport does not stream".into()))
    }

    async fn get_task(&self, _base_url: &str, task_id: &str) -> Result<Task, TransportError> {
        Err(TransportError::Protocol(format!("no stored task {task_id}")))
    }

    async fn cancel_task(&self, base_url: &str, task_id: &str) -> Result<Task, TransportError> {
        self.cancel_calls.lock().unwrap().push((base_url.to_string(), task_id.to_string()));
        Ok(Self::completed_task(Message::user_text("canceled"), "canceled"))
    }

    async fn fetch_card(&self, base_url: &str) -> Result<AgentCard, TransportError> {
        self.agents
            .get(base_url)
            .map(|(card, _)| card.clone())
            .ok_or_else(|| TransportError::Unreachable(format!("unknown agent {base_url}")))
    }

    async fn health(&self, base_url: &str) -> Result<HealthReport, TransportError> {
        Ok(HealthReport::healthy(base_url, "1.0.0"))
    }
}

/// LLM answering from a fixed queue of replies, in order.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self { replies: Mutex::new(replies.into_iter().collect()) }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::Request("script exhausted".into())))
    }
}
