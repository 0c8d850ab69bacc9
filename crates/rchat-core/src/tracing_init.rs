//! Shared tracing/logging initialization.
//!
//! The UI and network layers embedding the session engine call this once at
//! startup: an env-filter plus either human-readable or JSON output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ClientConfig;

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (e.g. `"rchat_core=info"`).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(default_filter: &str, log_json: bool) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    }
}

/// [`init_tracing`] with the level and output format from the client config.
pub fn init_from_config(client: &ClientConfig) -> bool {
    init_tracing(&default_filter(&client.log_level), client.log_json)
}

/// Default filter for a client at the configured level.
pub fn default_filter(log_level: &str) -> String {
    format!("rchat_core={log_level},rchat_crypto={log_level},rchat_proto={log_level}")
}
