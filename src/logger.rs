//! Tracing initialization for the CLI binary.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `directive` is a default filter
/// (e.g. "info"), overridable through `QUEST_ENGINE_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(directive: &str) {
    let filter = EnvFilter::try_from_env("QUEST_ENGINE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
