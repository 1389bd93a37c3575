//! Logging setup for the portage binary.
//!
//! Logs go to stderr so stdout stays clean for `--json`. Setting
//! `PORTAGE_LOG_DIR` also writes a daily rolling file there.

use std::env;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const FILTER_ENV: &str = "PORTAGE_LOG";
const DIR_ENV: &str = "PORTAGE_LOG_DIR";
const DEFAULT_FILTER: &str = "warn";
const LOG_FILE_PREFIX: &str = "portage.log";

/// Installs the global subscriber. Keep the returned guard alive until
/// exit so buffered file output is flushed.
pub fn init(debug: bool) -> Option<WorkerGuard> {
    let filter = build_filter(debug, env::var(FILTER_ENV).ok().as_deref());
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    match env::var_os(DIR_ENV) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init();
            None
        }
    }
}

/// `--debug` wins over the environment; an unparseable directive falls
/// back to the default.
fn build_filter(debug: bool, directive: Option<&str>) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
