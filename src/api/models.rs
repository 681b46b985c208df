use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::runs::{RunOutcome, RunRecord};
use crate::balances::{Category, Mismatch};
use crate::error::{CheckError, CheckFailure};

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Returned once a run has been scheduled
#[derive(Debug, Serialize)]
pub struct TriggerCheckResponse {
    pub run_id: Uuid,
    pub address: String,
    pub chains: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct RunStatusResponse {
    pub run_id: Uuid,
    pub address: String,
    pub status: RunStatus,
    pub chains: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks_run: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<CheckErrorView>>,
    /// Why the run itself failed, as opposed to individual checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// One failed check with its provenance
#[derive(Debug, Serialize)]
pub struct CheckErrorView {
    pub category: Category,
    pub check: String,
    pub chain: String,
    pub kind: String,
    pub message: String,
    pub expected_url: Option<String>,
    pub actual_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<Mismatch>,
}

impl From<&CheckError> for CheckErrorView {
    fn from(err: &CheckError) -> Self {
        let mismatch = match &err.failure {
            CheckFailure::Mismatch(m) => Some(m.clone()),
            _ => None,
        };

        Self {
            category: err.context.category,
            check: err.context.category.check_name().to_string(),
            chain: err.context.chain.clone(),
            kind: err.failure.kind().to_string(),
            message: err.failure.to_string(),
            expected_url: err.context.expected_url.clone(),
            actual_url: err.context.actual_url.clone(),
            mismatch,
        }
    }
}

impl From<&RunRecord> for RunStatusResponse {
    fn from(record: &RunRecord) -> Self {
        let mut response = Self {
            run_id: record.run_id,
            address: record.address.to_string(),
            status: RunStatus::Running,
            chains: record.chains.clone(),
            started_at: record.started_at,
            finished_at: record.finished_at,
            checks_run: None,
            errors: None,
            failure: None,
        };

        match &record.outcome {
            RunOutcome::Running => {}
            RunOutcome::Completed(result) => {
                response.status = RunStatus::Completed;
                response.checks_run = Some(result.checks_run);
                response.errors = Some(result.errors.iter().map(CheckErrorView::from).collect());
            }
            RunOutcome::Cancelled => response.status = RunStatus::Cancelled,
            RunOutcome::Failed(reason) => {
                response.status = RunStatus::Failed;
                response.failure = Some(reason.clone());
            }
        }

        response
    }
}
