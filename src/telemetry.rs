//! Tracing subscriber setup for binaries embedding the auditor.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a stderr fmt subscriber filtered by `RUST_LOG`, or by
/// `default_directive` (e.g. `"dependency_auditor=info"`) when `RUST_LOG` is
/// unset.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}
