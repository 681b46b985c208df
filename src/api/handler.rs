use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::models::*;
use crate::{
    address::CanonicalAddress,
    api::runs::RunRegistry,
    engine::ReconciliationEngine,
    error::{AppError, AppResult},
    middleware::RateLimitLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
    pub runs: Arc<RunRegistry>,
    pub limiter: RateLimitLayer,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Start a reconciliation for a bech32 address
/// POST /v1/accounts/:address/check
///
/// The chain list is resolved before answering so an unreachable aggregator
/// is reported to the caller instead of inside the run.
pub async fn trigger_check(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> AppResult<(StatusCode, Json<TriggerCheckResponse>)> {
    let canonical = CanonicalAddress::parse_bech32(&address)
        .map_err(|e| AppError::InvalidAddress(e.to_string()))?;

    let chains = state.engine.directory().list_checkable_chains().await?;
    let chain_names: Vec<String> = chains.iter().map(|c| c.name.clone()).collect();

    let handle = state.engine.spawn_for_chains(chains, canonical.clone());
    let run_id = state
        .runs
        .track(canonical.clone(), chain_names.clone(), handle);

    info!(
        run_id = %run_id,
        address = %address,
        chains = chain_names.len(),
        "reconciliation triggered"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerCheckResponse {
            run_id,
            address: canonical.to_string(),
            chains: chain_names,
        }),
    ))
}

/// GET /v1/checks/:run_id
pub async fn get_check(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<Json<RunStatusResponse>> {
    let record = state
        .runs
        .get(&run_id)
        .ok_or_else(|| AppError::NotFound(format!("run {}", run_id)))?;

    Ok(Json(RunStatusResponse::from(&record)))
}

/// DELETE /v1/checks/:run_id
pub async fn cancel_check(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.runs.cancel(&run_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("run {}", run_id)))
    }
}
