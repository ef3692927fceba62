//! Logging initialization

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber. `RUST_LOG` wins over the
/// configured level when set.
pub fn init_logger(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
