use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::address::AddressCodecError;
use crate::balances::{Category, Mismatch};

/// Top-level error type for the server and CLI entry points
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] FetchError),

    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of a single JSON-over-HTTP request.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status code {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors a `BalanceSource` can return from a fetch
#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    AddressCodec(#[from] AddressCodecError),

    #[error("cannot split amount {amount:?} on denom {denom:?}")]
    UnrecognizedAmount { denom: String, amount: String },

    #[error("balances at {url} still paginated after {pages} pages")]
    Truncated { url: String, pages: usize },
}

/// Why a single (chain, category) check did not pass.
#[derive(Error, Debug)]
pub enum CheckFailure {
    #[error("fetching expected balances: {0}")]
    Expected(#[source] SourceError),

    #[error("fetching actual balances: {0}")]
    Actual(#[source] SourceError),

    #[error(transparent)]
    Mismatch(#[from] Mismatch),

    #[error("check task aborted: {0}")]
    TaskAborted(String),
}

impl CheckFailure {
    /// Stable machine-readable kind, used in API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckFailure::Mismatch(_) => "mismatch",
            CheckFailure::TaskAborted(_) => "task_aborted",
            CheckFailure::Expected(e) | CheckFailure::Actual(e) => match e {
                SourceError::Fetch(FetchError::Network { .. }) => "network",
                SourceError::Fetch(FetchError::UnexpectedStatus { .. }) => "unexpected_status",
                SourceError::Fetch(FetchError::Decode { .. }) => "decode",
                SourceError::AddressCodec(_) => "address_codec",
                SourceError::UnrecognizedAmount { .. } => "unrecognized_amount",
                SourceError::Truncated { .. } => "truncated",
            },
        }
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, CheckFailure::Mismatch(_))
    }
}

/// Identity of one scheduled check: enough to re-run the exact queries by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckContext {
    pub category: Category,
    pub chain: String,
    /// Reference side (the chain's own node)
    pub expected_url: Option<String>,
    /// Side under validation (the aggregator)
    pub actual_url: Option<String>,
}

/// One entry of an `AggregateResult`.
#[derive(Error, Debug)]
#[error("{} check on {} failed: {failure}", .context.category, .context.chain)]
pub struct CheckError {
    pub context: CheckContext,
    #[source]
    pub failure: CheckFailure,
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("listing chains: {0}")]
    Directory(#[from] FetchError),

    #[error("reconciliation was cancelled")]
    Cancelled,

    #[error("reconciliation task failed: {0}")]
    Panicked(String),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            AppError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "INVALID_ADDRESS", None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            AppError::Upstream(FetchError::UnexpectedStatus { url, status }) => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                Some(serde_json::json!({ "url": url, "status": status })),
            ),
            AppError::Upstream(_) | AppError::Reconcile(ReconcileError::Directory(_)) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", None)
            }
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", None),
            AppError::Config(_) | AppError::Reconcile(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None)
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::Internal(format!("HTTP client error: {}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
