//! Process-wide `tracing` setup.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Install a stdout `tracing` subscriber filtered by `RUST_LOG`, defaulting
/// to `info`. Safe to call more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(true);

        // Another subscriber may already be installed by the host application.
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .try_init();
    });
}
