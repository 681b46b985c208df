use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Directives used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "info,tower_http=debug,balcheck=debug";

/// Install the global subscriber. `RUST_LOG` wins over `default_directives`.
/// Only the first call in a process takes effect.
pub fn init_tracing(json: bool, default_directives: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .try_init()
            .ok();
    }
}
