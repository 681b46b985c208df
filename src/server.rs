use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tokio::signal;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    api::handler::{cancel_check, get_check, health_check, trigger_check, AppState},
    middleware::{create_cors_layer, rate_limit_middleware},
};

/// Upper bound on handling one request. Runs themselves are detached from
/// the request and are not subject to it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    // Only triggering a run fans out upstream, so only that route is throttled
    let trigger = Router::new()
        .route("/v1/accounts/:address/check", post(trigger_check))
        .route_layer(from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/v1/checks/:run_id", get(get_check).delete(cancel_check))
        .merge(trigger)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(
    app: Router,
    bind_address: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
