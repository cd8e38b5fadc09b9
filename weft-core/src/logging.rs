//! Logging setup for the weft binaries and tests
//!
//! Each binary writes to its own daily-rolling file under
//! `$XDG_STATE_HOME/weft/` (`weft-dump.log.2025-06-01`, ...). stdout carries
//! JSON output, so nothing is logged to the terminal.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used by tests when `RUST_LOG` is unset.
const TEST_FILTER: &str = "weft_core=debug";

/// Install the file logger for the binary `app`.
///
/// `RUST_LOG` wins over `config.level`. Keep the returned guard alive for
/// the life of the process; dropping it flushes pending lines.
pub fn init(config: &LoggingConfig, app: &str) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(format!("{app}.log"))
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("failed to create log appender: {e}")))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter_or(&config.level))
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!(app, log_dir = %log_dir.display(), level = %config.level, "Logging initialized");
    Ok(LoggingGuard { _guard: guard })
}

/// Route log output through the test harness. Safe to call from every test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or(TEST_FILTER))
        .with_test_writer()
        .try_init();
}

fn filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Keeps the background log writer running.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}
