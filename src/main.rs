use std::sync::Arc;
use tracing::info;

use balcheck::{
    bootstrap, config::Config, engine::TracingReporter, server, telemetry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    telemetry::init_tracing(config.log_json, telemetry::DEFAULT_DIRECTIVES);

    info!("🚀 Starting balance reconciliation service");

    let state = bootstrap::initialize_app_state(&config, Arc::new(TracingReporter))?;

    // Create HTTP server
    let app = server::create_app(state);

    // Run the Server
    server::run_server(app, &config.bind_address).await?;

    info!("Server stopped");

    Ok(())
}
