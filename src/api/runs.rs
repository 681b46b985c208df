use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::address::CanonicalAddress;
use crate::engine::{AggregateResult, ReconcileHandle};
use crate::error::ReconcileError;

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Running,
    Completed(Arc<AggregateResult>),
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub address: CanonicalAddress,
    pub chains: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: RunOutcome,
    abort: AbortHandle,
}

/// In-memory table of triggered runs. A running run always stays reachable
/// through its id; finished runs are dropped once older than `retention`.
pub struct RunRegistry {
    runs: RwLock<HashMap<Uuid, RunRecord>>,
    retention: Duration,
}

impl RunRegistry {
    pub fn new(retention: StdDuration) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            retention: Duration::from_std(retention).unwrap_or(Duration::MAX),
        }
    }

    /// Register a spawned run and watch it to completion.
    pub fn track(
        self: &Arc<Self>,
        address: CanonicalAddress,
        chains: Vec<String>,
        handle: ReconcileHandle,
    ) -> Uuid {
        let run_id = self.register(address, chains, handle.abort_handle());

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = handle.join().await;
            registry.finish(run_id, outcome);
        });

        run_id
    }

    fn register(&self, address: CanonicalAddress, chains: Vec<String>, abort: AbortHandle) -> Uuid {
        let now = Utc::now();
        self.prune(now);

        let run_id = Uuid::new_v4();
        let record = RunRecord {
            run_id,
            address,
            chains,
            started_at: now,
            finished_at: None,
            outcome: RunOutcome::Running,
            abort,
        };
        self.runs.write().insert(run_id, record);
        run_id
    }

    /// Drop finished runs whose `finished_at` lies more than `retention`
    /// before `now`. Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now.checked_sub_signed(self.retention);
        let mut runs = self.runs.write();
        let before = runs.len();

        runs.retain(|_, record| match (record.finished_at, cutoff) {
            (Some(finished), Some(cutoff)) => finished >= cutoff,
            _ => true,
        });

        let removed = before - runs.len();
        if removed > 0 {
            debug!(removed, remaining = runs.len(), "pruned finished runs");
        }
        removed
    }

    pub fn get(&self, run_id: &Uuid) -> Option<RunRecord> {
        self.runs.read().get(run_id).cloned()
    }

    /// Abort a run. Returns `false` for an unknown id; cancelling a finished
    /// run is a no-op.
    pub fn cancel(&self, run_id: &Uuid) -> bool {
        let mut runs = self.runs.write();
        let Some(record) = runs.get_mut(run_id) else {
            return false;
        };

        // A run whose task already returned keeps the outcome its watcher
        // is about to record.
        if matches!(record.outcome, RunOutcome::Running) && !record.abort.is_finished() {
            record.abort.abort();
            record.outcome = RunOutcome::Cancelled;
            record.finished_at = Some(Utc::now());
            info!(run_id = %run_id, "run cancelled");
        }
        true
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }

    fn finish(&self, run_id: Uuid, outcome: Result<AggregateResult, ReconcileError>) {
        let mut runs = self.runs.write();
        let Some(record) = runs.get_mut(&run_id) else {
            return;
        };
        if !matches!(record.outcome, RunOutcome::Running) {
            return;
        }

        record.finished_at = Some(Utc::now());
        record.outcome = match outcome {
            Ok(result) => {
                info!(
                    run_id = %run_id,
                    address = %result.address,
                    errors = result.errors.len(),
                    "run completed"
                );
                RunOutcome::Completed(Arc::new(result))
            }
            Err(ReconcileError::Cancelled) => RunOutcome::Cancelled,
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "run failed");
                RunOutcome::Failed(e.to_string())
            }
        };
    }
}
