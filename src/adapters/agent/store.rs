//! In-memory task store.
//!
//! Each agent owns its tasks for the process lifetime; the orchestrator
//! only ever holds task ids and streamed snapshots. All lifecycle
//! mutation goes through [`TaskStore::update`], which enforces the
//! state machine via `Task::transition`.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::TaskError;
use crate::domain::models::{Message, Task};

/// Shared task map plus per-task cancellation tokens.
#[derive(Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<String, Task>>,
    cancel_tokens: RwLock<HashMap<String, CancellationToken>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a submitted task from the opening message and register a
    /// cancellation token for it.
    pub async fn create(&self, message: Message) -> (Task, CancellationToken) {
        let task = Task::submitted(message);
        let token = CancellationToken::new();
        self.tasks.write().await.insert(task.id.clone(), task.clone());
        self.cancel_tokens.write().await.insert(task.id.clone(), token.clone());
        (task, token)
    }

    pub async fn get(&self, task_id: &str) -> Result<Task, TaskError> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
    }

    /// Apply a mutation under the store lock. The closure returns the
    /// usual transition errors, which propagate unchanged.
    pub async fn update<F>(&self, task_id: &str, mutate: F) -> Result<Task, TaskError>
    where
        F: FnOnce(&mut Task) -> Result<(), TaskError>,
    {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
        mutate(task)?;
        Ok(task.clone())
    }

    /// The cancellation token registered for a task.
    pub async fn cancel_token(&self, task_id: &str) -> Option<CancellationToken> {
        self.cancel_tokens.read().await.get(task_id).cloned()
    }

    /// Number of tasks currently in a non-terminal state.
    pub async fn active_count(&self) -> usize {
        self.tasks.read().await.values().filter(|t| !t.state().is_terminal()).count()
    }
}
