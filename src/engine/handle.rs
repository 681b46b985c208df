use tokio::task::{AbortHandle, JoinHandle};

use crate::engine::result::AggregateResult;
use crate::error::ReconcileError;

/// A running reconciliation. Dropping the handle does not stop the run;
/// `abort` does, and cancels every check still in flight.
pub struct ReconcileHandle {
    task: JoinHandle<Result<AggregateResult, ReconcileError>>,
}

impl ReconcileHandle {
    pub(crate) fn new(task: JoinHandle<Result<AggregateResult, ReconcileError>>) -> Self {
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.task.abort_handle()
    }

    /// Wait for every scheduled check to finish.
    pub async fn join(self) -> Result<AggregateResult, ReconcileError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ReconcileError::Cancelled),
            Err(e) => Err(ReconcileError::Panicked(e.to_string())),
        }
    }
}
