//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::ClientError;

/// Set to `1` or `true` for JSON log lines.
pub const LOG_JSON_ENV: &str = "TEAMWATCH_LOG_JSON";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Call once at startup.
pub fn init_tracing(default_filter: &str) -> Result<(), ClientError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| ClientError::Telemetry(format!("invalid log filter: {}", e)))?;
    let json = std::env::var(LOG_JSON_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    };
    result.map_err(|e| ClientError::Telemetry(e.to_string()))?;

    tracing::debug!(json, filter = default_filter, "logging initialized");
    Ok(())
}
