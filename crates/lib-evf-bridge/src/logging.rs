//! Logging for the loaded bridge.
//!
//! The host process may already have a global subscriber; the bridge only
//! installs its own if none is set.

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the bridge's log filter.
pub const LOG_ENV: &str = "EVF_BRIDGE_LOG";

const DEFAULT_FILTER: &str = "warn";

static INIT: Once = Once::new();

/// Install a stderr subscriber filtered by `EVF_BRIDGE_LOG`, once.
pub fn init() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let installed = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .try_init();
        if installed.is_err() {
            tracing::debug!("Host already installed a tracing subscriber");
        }
    });
}
