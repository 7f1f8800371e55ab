//! Agent-side A2A HTTP server.
//!
//! Serves JSON-RPC 2.0 at `POST /`, streaming task updates over SSE at
//! `POST /stream`, the agent card at
//! `GET /.well-known/agent-card.json`, and `GET /health`. The streaming
//! adapter translates executor updates into the task lifecycle: working
//! updates, an `input-required` park, or artifact plus completion.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::adapters::agent::executor::AgentExecutor;
use crate::adapters::agent::registry::AgentRegistration;
use crate::adapters::agent::store::TaskStore;
use crate::domain::errors::TaskError;
use crate::domain::models::{
    Artifact, HealthReport, Message, SendOutcome, Task, TaskState, TaskStatus, TaskUpdate,
};
use crate::infrastructure::metrics;
use crate::infrastructure::rpc::{JsonRpcRequest, JsonRpcResponse, RpcErrorCode};
use crate::services::health::HealthChecker;

/// Interval for refreshing the uptime gauge.
const UPTIME_INTERVAL: Duration = Duration::from_secs(15);

/// Shared state behind the router.
pub struct AgentState {
    registration: AgentRegistration,
    executor: Arc<dyn AgentExecutor>,
    store: TaskStore,
    health: HealthChecker,
}

/// One agent process: registration, executor, task store, probes.
pub struct AgentServer {
    state: Arc<AgentState>,
}

impl AgentServer {
    pub fn new(registration: AgentRegistration, executor: Arc<dyn AgentExecutor>) -> Self {
        let health = HealthChecker::new(registration.id.clone());
        Self {
            state: Arc::new(AgentState {
                registration,
                executor,
                store: TaskStore::new(),
                health,
            }),
        }
    }

    pub fn with_health(registration: AgentRegistration, executor: Arc<dyn AgentExecutor>, health: HealthChecker) -> Self {
        Self {
            state: Arc::new(AgentState { registration, executor, store: TaskStore::new(), health }),
        }
    }

    /// Build the router; tests mount this on an ephemeral listener.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(handle_jsonrpc))
            .route("/stream", post(handle_stream))
            .route("/.well-known/agent-card.json", get(handle_card))
            .route("/health", get(handle_health))
            .with_state(Arc::clone(&self.state))
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until the shutdown future resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let agent_id = self.state.registration.id.clone();
        let addr = listener.local_addr()?;
        tracing::info!(agent = %agent_id, %addr, "agent server listening");

        let started = Instant::now();
        let uptime_agent = agent_id.clone();
        let uptime = tokio::spawn(async move {
            loop {
                metrics::set_agent_uptime(&uptime_agent, started.elapsed().as_secs_f64());
                tokio::time::sleep(UPTIME_INTERVAL).await;
            }
        });

        let router = self.router();
        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;
        uptime.abort();
        tracing::info!(agent = %agent_id, "agent server stopped");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SendParams {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct TaskRefParams {
    #[serde(rename = "taskId")]
    task_id: String,
}

async fn handle_jsonrpc(
    State(state): State<Arc<AgentState>>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    if request.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::error(
            request.id,
            RpcErrorCode::ParseError,
            Some(json!({"message": "Invalid JSON-RPC version"})),
        ));
    }

    match request.method.as_str() {
        "send_message" => handle_send_message(state, request).await,
        "get_task" => handle_get_task(state, request).await,
        "cancel_task" => handle_cancel_task(state, request).await,
        _ => Json(JsonRpcResponse::error(
            request.id,
            RpcErrorCode::MethodNotFound,
            Some(json!({"method": request.method})),
        )),
    }
}

async fn handle_send_message(
    state: Arc<AgentState>,
    request: JsonRpcRequest,
) -> Json<JsonRpcResponse> {
    let params: SendParams = match serde_json::from_value(request.params.clone()) {
        Ok(params) => params,
        Err(e) => {
            return Json(JsonRpcResponse::error(
                request.id,
                RpcErrorCode::InvalidParams,
                Some(json!({"message": e.to_string()})),
            ))
        }
    };

    let started = Instant::now();
    let agent_id = state.registration.id.clone();
    let query = params.message.text();

    let task = match open_task(&state, params.message).await {
        Ok(task) => task,
        Err((code, data)) => return Json(JsonRpcResponse::error(request.id, code, data)),
    };

    // Synchronous path: drive the executor to a terminal state, then
    // return the finished task.
    drive_task(&state, task.id.clone(), query, None).await;

    let finished = match state.store.get(&task.id).await {
        Ok(task) => task,
        Err(e) => {
            return Json(JsonRpcResponse::error(
                request.id,
                RpcErrorCode::InternalError,
                Some(json!({"message": e.to_string()})),
            ))
        }
    };

    let status = if finished.state() == TaskState::Completed { "success" } else { "error" };
    metrics::record_request(&agent_id, "send_message", status);
    metrics::observe_request_duration(&agent_id, "send_message", started.elapsed().as_secs_f64());

    match serde_json::to_value(SendOutcome::Task(finished)) {
        Ok(value) => Json(JsonRpcResponse::success(request.id, value)),
        Err(e) => Json(JsonRpcResponse::error(
            request.id,
            RpcErrorCode::InternalError,
            Some(json!({"message": e.to_string()})),
        )),
    }
}

async fn handle_get_task(state: Arc<AgentState>, request: JsonRpcRequest) -> Json<JsonRpcResponse> {
    let params: TaskRefParams = match serde_json::from_value(request.params.clone()) {
        Ok(params) => params,
        Err(e) => {
            return Json(JsonRpcResponse::error(
                request.id,
                RpcErrorCode::InvalidParams,
                Some(json!({"message": e.to_string()})),
            ))
        }
    };

    match state.store.get(&params.task_id).await {
        Ok(task) => Json(JsonRpcResponse::success(
            request.id,
            serde_json::to_value(task).unwrap_or(Value::Null),
        )),
        Err(_) => Json(JsonRpcResponse::error(
            request.id,
            RpcErrorCode::TaskNotFound,
            Some(json!({"taskId": params.task_id})),
        )),
    }
}

async fn handle_cancel_task(
    state: Arc<AgentState>,
    request: JsonRpcRequest,
) -> Json<JsonRpcResponse> {
    let params: TaskRefParams = match serde_json::from_value(request.params.clone()) {
        Ok(params) => params,
        Err(e) => {
            return Json(JsonRpcResponse::error(
                request.id,
                RpcErrorCode::InvalidParams,
                Some(json!({"message": e.to_string()})),
            ))
        }
    };

    let task = match state.store.get(&params.task_id).await {
        Ok(task) => task,
        Err(_) => {
            return Json(JsonRpcResponse::error(
                request.id,
                RpcErrorCode::TaskNotFound,
                Some(json!({"taskId": params.task_id})),
            ))
        }
    };

    if task.state().is_terminal() {
        return Json(JsonRpcResponse::error(
            request.id,
            RpcErrorCode::TaskNotCancelable,
            Some(json!({"taskId": params.task_id, "currentState": task.state().to_string()})),
        ));
    }

    // Signal the driver first, then force the transition for tasks with
    // no driver in flight (e.g. parked input-required).
    if let Some(token) = state.store.cancel_token(&params.task_id).await {
        token.cancel();
    }
    let canceled = state
        .store
        .update(&params.task_id, |t| {
            if t.state().is_terminal() {
                return Ok(());
            }
            t.transition(
                TaskStatus::new(TaskState::Canceled)
                    .with_message(Message::agent_text("Task canceled by request")),
            )
        })
        .await;

    match canceled {
        Ok(task) => Json(JsonRpcResponse::success(
            request.id,
            serde_json::to_value(task).unwrap_or(Value::Null),
        )),
        Err(e) => Json(JsonRpcResponse::error(
            request.id,
            RpcErrorCode::InternalError,
            Some(json!({"message": e.to_string()})),
        )),
    }
}

async fn handle_stream(
    State(state): State<Arc<AgentState>>,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    if request.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::error(
            request.id,
            RpcErrorCode::ParseError,
            Some(json!({"message": "Invalid JSON-RPC version"})),
        ))
        .into_response();
    }
    if request.method != "send_message" {
        return Json(JsonRpcResponse::error(
            request.id,
            RpcErrorCode::MethodNotFound,
            Some(json!({"method": request.method})),
        ))
        .into_response();
    }
    let params: SendParams = match serde_json::from_value(request.params.clone()) {
        Ok(params) => params,
        Err(e) => {
            return Json(JsonRpcResponse::error(
                request.id,
                RpcErrorCode::InvalidParams,
                Some(json!({"message": e.to_string()})),
            ))
            .into_response()
        }
    };

    let query = params.message.text();
    let task = match open_task(&state, params.message).await {
        Ok(task) => task,
        Err((code, data)) => {
            return Json(JsonRpcResponse::error(request.id, code, data)).into_response()
        }
    };

    let (tx, rx) = mpsc::channel::<TaskUpdate>(32);

    // The caller sees the submitted state before any work happens.
    let _ = tx
        .send(TaskUpdate::StatusUpdate {
            task_id: task.id.clone(),
            context_id: task.context_id.clone(),
            status: task.status.clone(),
            is_final: false,
        })
        .await;

    let driver_state = Arc::clone(&state);
    let task_id = task.id.clone();
    tokio::spawn(async move {
        drive_task(&driver_state, task_id, query, Some(tx)).await;
    });

    let request_id = request.id.clone();
    let stream = tokio_stream_from(rx, request_id);
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// Wrap task updates into SSE events carrying JSON-RPC envelopes.
fn tokio_stream_from(
    rx: mpsc::Receiver<TaskUpdate>,
    request_id: Option<Value>,
) -> impl futures::Stream<Item = Result<Event, Infallible>> {
    let updates = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|update| (update, rx))
    });
    updates.map(move |update| {
        let envelope = JsonRpcResponse::success(
            request_id.clone(),
            serde_json::to_value(&update).unwrap_or(Value::Null),
        );
        let data = serde_json::to_string(&envelope).unwrap_or_default();
        Ok(Event::default().data(data))
    })
}

async fn handle_card(State(state): State<Arc<AgentState>>) -> Json<crate::domain::models::AgentCard> {
    Json(state.registration.card())
}

async fn handle_health(State(state): State<Arc<AgentState>>) -> Json<HealthReport> {
    let snapshot = state.health.check_health().await;
    let details = serde_json::to_value(&snapshot.checks).ok();
    Json(HealthReport {
        status: snapshot.status,
        agent: state.registration.id.clone(),
        version: state.registration.version.clone(),
        timestamp: snapshot.timestamp,
        details,
    })
}

/// Create a new task from the message, or resume a parked one when the
/// message references an existing `input-required` task.
async fn open_task(
    state: &Arc<AgentState>,
    message: Message,
) -> Result<Task, (RpcErrorCode, Option<Value>)> {
    if let Some(task_id) = message.task_id.clone() {
        let existing = state
            .store
            .get(&task_id)
            .await
            .map_err(|_| (RpcErrorCode::TaskNotFound, Some(json!({"taskId": task_id}))))?;
        if existing.state() != TaskState::InputRequired {
            return Err((
                RpcErrorCode::InvalidParams,
                Some(json!({
                    "message": "task is not awaiting input",
                    "currentState": existing.state().to_string(),
                })),
            ));
        }
        let resumed = state
            .store
            .update(&existing.id, |t| {
                t.append_message(message.clone());
                Ok(())
            })
            .await
            .map_err(|e| {
                (RpcErrorCode::InternalError, Some(json!({"message": e.to_string()})))
            })?;
        return Ok(resumed);
    }

    let (task, _token) = state.store.create(message).await;
    Ok(task)
}

/// The streaming adapter: drive the executor for one task, translating
/// its updates into lifecycle transitions and stream events.
async fn drive_task(
    state: &Arc<AgentState>,
    task_id: String,
    query: String,
    updates: Option<mpsc::Sender<TaskUpdate>>,
) {
    let agent_id = state.registration.id.clone();
    let Ok(task) = state.store.get(&task_id).await else {
        return;
    };
    let context_id = task.context_id.clone();
    let token = state.store.cancel_token(&task_id).await.unwrap_or_default();

    metrics::adjust_active_tasks(&agent_id, 1.0);

    let working = apply_status(state, &task_id, TaskStatus::new(TaskState::Working), false, &updates)
        .await;
    if working.is_err() {
        metrics::adjust_active_tasks(&agent_id, -1.0);
        return;
    }

    let mut stream = state.executor.stream(query, context_id.clone());
    loop {
        let item = tokio::select! {
            () = token.cancelled() => {
                let status = TaskStatus::new(TaskState::Canceled)
                    .with_message(Message::agent_text("Task canceled"));
                let _ = apply_status(state, &task_id, status, true, &updates).await;
                break;
            }
            item = stream.next() => item,
        };

        match item {
            Some(update) if update.require_user_input => {
                let status = TaskStatus::new(TaskState::InputRequired)
                    .with_message(Message::agent_text(update.content));
                let _ = apply_status(state, &task_id, status, true, &updates).await;
                break;
            }
            Some(update) if update.is_task_complete => {
                let artifact =
                    Artifact::text(format!("{agent_id}_result"), update.content);
                let added = state
                    .store
                    .update(&task_id, |t| {
                        t.add_artifact(artifact.clone());
                        Ok(())
                    })
                    .await;
                if added.is_ok() {
                    if let Some(ref tx) = updates {
                        let _ = tx
                            .send(TaskUpdate::ArtifactUpdate {
                                task_id: task_id.clone(),
                                context_id: context_id.clone(),
                                artifact,
                            })
                            .await;
                    }
                }
                let _ = apply_status(
                    state,
                    &task_id,
                    TaskStatus::new(TaskState::Completed),
                    true,
                    &updates,
                )
                .await;
                break;
            }
            Some(update) => {
                let status = TaskStatus::new(TaskState::Working)
                    .with_message(Message::agent_text(update.content));
                if apply_status(state, &task_id, status, false, &updates).await.is_err() {
                    break;
                }
            }
            None => {
                // Contract violation: the executor must end with a
                // terminal update.
                metrics::record_error(&agent_id, "executor_incomplete");
                let status = TaskStatus::new(TaskState::Failed).with_message(Message::agent_text(
                    "executor ended without a terminal update",
                ));
                let _ = apply_status(state, &task_id, status, true, &updates).await;
                break;
            }
        }
    }

    metrics::adjust_active_tasks(&agent_id, -1.0);
}

/// Apply a status transition and forward it to the stream, if any.
async fn apply_status(
    state: &Arc<AgentState>,
    task_id: &str,
    status: TaskStatus,
    is_final: bool,
    updates: &Option<mpsc::Sender<TaskUpdate>>,
) -> Result<(), TaskError> {
    let status_for_update = status.clone();
    let task = state
        .store
        .update(task_id, move |t| t.transition(status))
        .await
        .map_err(|e| {
            tracing::debug!(task_id, error = %e, "status transition rejected");
            e
        })?;

    if let Some(tx) = updates {
        let _ = tx
            .send(TaskUpdate::StatusUpdate {
                task_id: task_id.to_string(),
                context_id: task.context_id.clone(),
                status: status_for_update,
                is_final,
            })
            .await;
    }
    Ok(())
}
