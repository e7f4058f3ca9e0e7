//! Structured logging for the relight viewer.
//!
//! Console output with uptime timestamps, plus a JSON log file in debug
//! builds. The filter comes from `RUST_LOG` when set, otherwise from the
//! config's `debug` section.

use std::path::{Path, PathBuf};

use relight_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config name a level.
pub const DEFAULT_FILTER: &str = "info,wgpu=warn,naga=warn";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "relight.log";

/// Build the filter directive string for a config.
///
/// `debug.trace_frames` raises the engine crate to `debug` so per-frame tile
/// statistics become visible without flooding the other crates.
#[must_use]
pub fn filter_directive(config: Option<&Config>) -> String {
    let Some(config) = config else {
        return DEFAULT_FILTER.to_string();
    };
    let mut directive = if config.debug.log_level.is_empty() {
        DEFAULT_FILTER.to_string()
    } else {
        config.debug.log_level.clone()
    };
    if config.debug.trace_frames {
        directive.push_str(",relight_engine=debug");
    }
    directive
}

/// Path of the JSON log file inside `log_dir`.
#[must_use]
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - enables the file layer
/// * `config` - source of the level override
///
/// ```no_run
/// use relight_config::Config;
/// use relight_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), cfg!(debug_assertions), Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let directive = filter_directive(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    // Fetch workers are named threads, so the file layer keeps thread names too.
    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_file_path(log_dir))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_without_config() {
        let directive = filter_directive(None);
        assert_eq!(directive, DEFAULT_FILTER);
        assert!(EnvFilter::try_new(&directive).is_ok());
    }

    #[test]
    fn test_directive_uses_config_level() {
        let mut config = Config::default();
        config.debug.log_level = "warn,relight_fetch=trace".to_string();
        assert_eq!(filter_directive(Some(&config)), "warn,relight_fetch=trace");
    }

    #[test]
    fn test_empty_level_falls_back_to_default() {
        let mut config = Config::default();
        config.debug.log_level.clear();
        assert_eq!(filter_directive(Some(&config)), DEFAULT_FILTER);
    }

    #[test]
    fn test_trace_frames_raises_engine_level() {
        let mut config = Config::default();
        config.debug.trace_frames = true;
        let directive = filter_directive(Some(&config));
        assert!(directive.ends_with(",relight_engine=debug"));
        let filter = EnvFilter::try_new(&directive).unwrap();
        assert!(format!("{filter}").contains("relight_engine=debug"));
    }

    #[test]
    fn test_log_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = log_file_path(dir.path());
        assert_eq!(path.file_name().unwrap(), LOG_FILE_NAME);
        assert_eq!(path.parent().unwrap(), dir.path());
    }
}
