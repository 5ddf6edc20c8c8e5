//! Tracing setup for parley binaries.
//!
//! Console output is human-readable with uptime timestamps. Debug builds can
//! additionally write JSON lines to `parley.log` for later inspection. The
//! filter comes from `RUST_LOG` when set, otherwise from the config's
//! `debug.log_level`.

use std::path::{Path, PathBuf};

use parley_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_FILTER: &str = "info,tungstenite=warn,tokio_tungstenite=warn";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE: &str = "parley.log";

/// Filter directive for `config`: its `log_level` if non-empty, else
/// [`DEFAULT_FILTER`].
pub fn filter_directive(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.trim().is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Path of the JSON log file inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE)
}

/// Install the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (used only when `debug_build`)
/// * `debug_build` - enables the file layer
/// * `config` - source of the fallback log level
///
/// Must be called once per process; later calls panic inside
/// `tracing_subscriber` as the global default is already set.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_file_path(log_dir))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        tracing::debug!(dir = %log_dir.display(), "File logging enabled");
        return;
    }

    subscriber.init();
}

/// `EnvFilter` built from [`DEFAULT_FILTER`].
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
