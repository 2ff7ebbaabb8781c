//! Process-wide tracing/logging setup.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process.
///
/// Filtering comes from `RUST_LOG` (default `info`). `BENCHRUN_LOG_FORMAT`
/// selects `json` (default in containers) or `compact` for local reading.
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let compact = matches!(
        std::env::var("BENCHRUN_LOG_FORMAT").as_deref(),
        Ok("compact") | Ok("pretty")
    );
    if compact {
        let _ = builder.compact().try_init();
    } else {
        let _ = builder.json().try_init();
    }
}
