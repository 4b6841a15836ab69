/// Configuration for the telemetry subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Minimum log level filter (e.g. "info", "solana_swap_indexer=debug,warn").
    pub log_filter: String,
    /// Whether to enable ANSI-colored console output.
    pub enable_console_colors: bool,
    /// Whether to include target module in output.
    pub show_target: bool,
    /// Whether to include thread IDs.
    pub show_thread_ids: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            enable_console_colors: true,
            show_target: true,
            show_thread_ids: false,
        }
    }
}
