use super::config::TelemetryConfig;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Keeps the subscriber alive for the lifetime of the process.
pub struct TelemetryGuard {
    _private: (),
}

static TELEMETRY_INIT: OnceLock<()> = OnceLock::new();

/// Initialize the global tracing subscriber (singleton, called once).
///
/// `RUST_LOG` wins over `config.log_filter` when set. Later calls are no-ops,
/// so tests and the binary can both call it freely.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryGuard {
    TELEMETRY_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

        let fmt_layer = fmt::layer()
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_ansi(config.enable_console_colors);

        // try_init: another subscriber may already be installed by a test harness.
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init();
    });

    TelemetryGuard { _private: () }
}
