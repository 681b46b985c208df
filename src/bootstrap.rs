use std::sync::Arc;
use tracing::info;

use crate::{
    api::{handler::AppState, runs::RunRegistry},
    chains::ChainDirectory,
    client::JsonClient,
    config::Config,
    engine::{CheckReporter, ReconciliationEngine},
    error::AppResult,
    middleware::RateLimitLayer,
    sources::{AggregatorSource, HttpNodeSourceFactory},
};

/// Wire an engine against the configured aggregator. Every source shares one
/// HTTP client.
pub fn build_engine(
    config: &Config,
    reporter: Arc<dyn CheckReporter>,
) -> AppResult<ReconciliationEngine> {
    let client = JsonClient::new(config.http_timeout())?;

    let directory = ChainDirectory::new(client.clone(), config.aggregator_url.as_str());
    let aggregator = Arc::new(AggregatorSource::new(
        client.clone(),
        config.aggregator_url.as_str(),
    ));
    let nodes = Arc::new(HttpNodeSourceFactory::new(client, config.max_balance_pages));

    info!(
        aggregator = %config.aggregator_url,
        max_concurrent_checks = config.max_concurrent_checks,
        timeout_secs = config.http_timeout_secs,
        "reconciliation engine configured"
    );

    Ok(ReconciliationEngine::new(directory, aggregator, nodes, reporter)
        .with_max_concurrent_checks(config.max_concurrent_checks))
}

pub fn initialize_app_state(
    config: &Config,
    reporter: Arc<dyn CheckReporter>,
) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let engine = Arc::new(build_engine(config, reporter)?);
    let limiter = RateLimitLayer::per_minute(config.trigger_rate_per_minute)?;

    Ok(AppState {
        engine,
        runs: Arc::new(RunRegistry::new(config.run_retention())),
        limiter,
    })
}
