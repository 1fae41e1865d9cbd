//! Tracing setup for binaries and tests embedding the crate.
//!
//! The library only emits `tracing` events; it never installs a subscriber
//! on its own.

use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the crate's log filter directives.
pub const LOG_ENV: &str = "TASKDB_LOG";

const DEFAULT_DIRECTIVES: &str = "info";

static INITIALISED: OnceLock<bool> = OnceLock::new();

/// Installs a formatting subscriber filtered by [`LOG_ENV`], then
/// `RUST_LOG`, then `info`.
///
/// Returns `false` when another global subscriber was already installed, in
/// which case that subscriber is left in place. Later calls return the
/// first call's result.
#[must_use]
pub fn init_tracing() -> bool {
    *INITIALISED.get_or_init(|| {
        let installed = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter_from_env())
            .try_init()
            .is_ok();
        if installed {
            tracing::debug!("tracing subscriber installed");
        }
        installed
    })
}

fn filter_from_env() -> EnvFilter {
    [LOG_ENV, EnvFilter::DEFAULT_ENV]
        .into_iter()
        .filter_map(|name| std::env::var(name).ok())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}
