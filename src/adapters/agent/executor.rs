//! Agent executor contract.
//!
//! Business logic implements [`AgentExecutor`]: an async stream of
//! `{content, is_task_complete, require_user_input}` tuples. The server
//! translates that internal sequence into the external task lifecycle:
//! non-terminal items become `working` updates, `require_user_input`
//! parks the task as `input-required`, and `is_task_complete` adds the
//! final artifact and completes the task.

use futures::stream::BoxStream;

/// One increment from an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorUpdate {
    pub content: String,
    pub is_task_complete: bool,
    pub require_user_input: bool,
}

impl ExecutorUpdate {
    /// A progress update; the task keeps working.
    pub fn working(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_task_complete: false, require_user_input: false }
    }

    /// The final result; the task completes with this content as its
    /// artifact.
    pub fn completed(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_task_complete: true, require_user_input: false }
    }

    /// The task needs more input from the caller; the stream ends and
    /// the task parks as `input-required`.
    pub fn input_required(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_task_complete: false, require_user_input: true }
    }
}

/// Stream of executor updates for one request.
pub type ExecutorStream = BoxStream<'static, ExecutorUpdate>;

/// The contract agent business logic implements.
pub trait AgentExecutor: Send + Sync {
    /// Process a query, yielding at least one update; the last one must
    /// set `is_task_complete` or `require_user_input`.
    fn stream(&self, query: String, context_id: String) -> ExecutorStream;
}

/// Trivial executor used by the demo `serve` command and tests: one
/// working update, then an echo of the query.
pub struct EchoExecutor {
    name: String,
}

impl EchoExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl AgentExecutor for EchoExecutor {
    fn stream(&self, query: String, _context_id: String) -> ExecutorStream {
        let name = self.name.clone();
        Box::pin(async_stream::stream! {
            yield ExecutorUpdate::working(format!("{name} is processing the request"));
            yield ExecutorUpdate::completed(format!("{name} processed: {query}"));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn update_constructors() {
        let working = ExecutorUpdate::working("thinking");
        assert!(!working.is_task_complete && !working.require_user_input);

        let done = ExecutorUpdate::completed("42");
        assert!(done.is_task_complete && !done.require_user_input);

        let parked = ExecutorUpdate::input_required("which city?");
        assert!(!parked.is_task_complete && parked.require_user_input);
    }

    #[tokio::test]
    async fn echo_executor_ends_with_completion() {
        let executor = EchoExecutor::new("echo");
        let updates: Vec<ExecutorUpdate> =
            executor.stream("hello".into(), "ctx".into()).collect().await;
        assert_eq!(updates.len(), 2);
        assert!(!updates[0].is_task_complete);
        assert!(updates[1].is_task_complete);
        assert!(updates[1].content.contains("hello"));
    }
}
