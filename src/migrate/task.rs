use crate::core::{MigrationError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Cooperative cancellation signal shared between a task handle and the
/// running batch, checked between per-record iterations.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Handle to a spawned long-running operation. Callers may await the
/// final result or request an orderly abort; cancellation takes effect
/// between records, so already-committed records are never corrupted.
///
/// Dropping the handle requests cancellation but does not abort the
/// task mid-record.
pub struct TaskHandle<T> {
    cancel: CancelFlag,
    join: Option<JoinHandle<Result<T>>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(cancel: CancelFlag, join: JoinHandle<Result<T>>) -> Self {
        Self {
            cancel,
            join: Some(join),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    /// Wait for the task to finish and return its result.
    pub async fn join(mut self) -> Result<T> {
        let join = self
            .join
            .take()
            .ok_or_else(|| MigrationError::Task("task already joined".to_string()))?;
        join.await
            .map_err(|e| MigrationError::Task(format!("join failed: {}", e)))?
    }
}

impl<T> Drop for TaskHandle<T> {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.cancel.cancel();
        }
    }
}
