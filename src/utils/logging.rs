//! Logging helpers layered over `tracing`.
//!
//! Setting `SWAP_INDEXER_SILENT` mutes the informational helpers; errors are
//! always emitted.

fn silent() -> bool {
    std::env::var("SWAP_INDEXER_SILENT").is_ok()
}

/// Replaces the value of an `api-key=` query parameter with `[REDACTED]`.
#[must_use]
pub fn redact_url(url: &str) -> String {
    let Some(pos) = url.find("api-key=") else {
        return url.to_string();
    };
    let before = &url[..pos + 8];
    let after = &url[pos + 8..];
    let end = after.find('&').unwrap_or(after.len());
    format!("{before}[REDACTED]{}", &after[end..])
}

/// Logs indexer startup information.
pub fn log_startup(rpc_urls: &[String], ws_url: &str, baseline_workers: usize) {
    if silent() {
        return;
    }
    let rpc: Vec<String> = rpc_urls.iter().map(|url| redact_url(url)).collect();
    tracing::info!(
        rpc_urls = ?rpc,
        ws_url = %redact_url(ws_url),
        baseline_workers,
        "Swap indexer startup"
    );
}

/// Logs one processed work item.
pub fn log_batch(block_number: u64, transactions: usize, swaps: usize, duration_ms: u64) {
    if silent() {
        return;
    }
    if swaps > 0 {
        tracing::info!(
            slot = block_number,
            transactions,
            swaps,
            duration_ms,
            "Work item processed"
        );
    } else {
        tracing::debug!(slot = block_number, transactions, duration_ms, "Work item processed");
    }
}

/// Logs a pool resize decision.
pub fn log_pool_resize(depth: u64, from: usize, to: usize, prefetch: u16) {
    if silent() || from == to {
        return;
    }
    tracing::info!(depth, from, to, prefetch, "Resizing worker pool");
}

/// Logs an error with context.
pub fn log_error(context: &str, error: &str) {
    tracing::error!(context = context, error = error, "Swap indexer error");
}
