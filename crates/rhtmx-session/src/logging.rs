// File: src/logging.rs
// Purpose: Tracing subscriber setup for applications embedding sessions

use tracing_subscriber::EnvFilter;

use crate::config::SessionConfig;

/// Installs a fmt subscriber filtered by `RUST_LOG`, or by
/// `config.log_level` when the variable is unset
///
/// Safe to call more than once; only the first call installs anything.
pub fn init(config: &SessionConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
