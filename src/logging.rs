//! Logging initialization
//!
//! Consistent `tracing` setup for binaries and tests embedding this crate.
//! Supports JSON or human-readable output and `RUST_LOG` overrides.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize logging from configuration.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = build_env_filter(config);

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    tracing::info!(level = %config.level, json = config.json, "Logging initialized");
}

/// Initialize logging using only environment variables.
///
/// Lightweight alternative for tests and tools that don't carry a full
/// config. Uses `RUST_LOG` or a quiet default.
pub fn init_simple_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roost=info,sqlx=warn,tokio_postgres=warn".into()),
        )
        .with(fmt::layer())
        .init();
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Suppress verbose sqlx logs by default
        EnvFilter::new(format!("roost={},sqlx=warn,tokio_postgres=warn", config.level))
    })
}
