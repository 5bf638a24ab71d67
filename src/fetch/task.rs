// Best-effort background tasks.
// Fire-and-forget work whose outcome can still be observed as a status.

use std::fmt::Display;
use std::future::Future;

use tokio::task::JoinHandle;
use tracing::debug;

/// Outcome of a best-effort task. Failures never propagate as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Succeeded,
    Failed(String),
}

impl TaskStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Succeeded)
    }
}

/// Handle to a spawned best-effort task.
///
/// Dropping the handle detaches the task; it still runs to completion.
#[derive(Debug)]
pub struct TaskHandle {
    label: String,
    inner: JoinHandle<TaskStatus>,
}

impl TaskHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the task. Always resolves, panics included.
    pub async fn status(self) -> TaskStatus {
        match self.inner.await {
            Ok(status) => status,
            Err(e) => TaskStatus::Failed(e.to_string()),
        }
    }
}

/// Spawn `work` on the runtime, swallowing its error into a status.
pub fn spawn_best_effort<F, T, E>(label: impl Into<String>, work: F) -> TaskHandle
where
    F: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let label = label.into();
    let task_label = label.clone();
    let inner = tokio::spawn(async move {
        match work.await {
            Ok(_) => TaskStatus::Succeeded,
            Err(e) => {
                debug!(task = %task_label, error = %e, "best-effort task failed");
                TaskStatus::Failed(e.to_string())
            }
        }
    });
    TaskHandle { label, inner }
}

/// Wait for every handle, in order.
pub async fn join_all(handles: Vec<TaskHandle>) -> Vec<TaskStatus> {
    futures::future::join_all(handles.into_iter().map(TaskHandle::status)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success_and_failure_both_resolve() {
        let ok = spawn_best_effort("ok", async { Ok::<_, String>(1) });
        let failed = spawn_best_effort("failed", async { Err::<(), _>("boom") });

        assert_eq!(ok.label(), "ok");
        let statuses = join_all(vec![ok, failed]).await;
        assert_eq!(
            statuses,
            vec![TaskStatus::Succeeded, TaskStatus::Failed("boom".to_string())]
        );
    }

    #[tokio::test]
    async fn panic_becomes_failure() {
        let handle = spawn_best_effort("panics", async {
            if true {
                panic!("bad");
            }
            Ok::<(), String>(())
        });
        assert!(!handle.status().await.is_success());
    }
}
