//! Logging (4.J): a console layer plus a non-blocking rolling-file layer,
//! both driven by the same `EnvFilter`.

use std::path::Path;

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;

use crate::config::{LogFormat, LogLevel};
use crate::error::Result;

/// Holds the non-blocking writer guard; must be kept alive for the process
/// lifetime so buffered log lines are flushed on drop.
pub struct LoggingGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
}

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("deadswitch={},warn", level.as_str())))
}

/// Installs the global subscriber. Must be called once, before any other
/// component logs.
pub fn init_logging(log_dir: &Path, level: LogLevel, format: LogFormat) -> Result<LoggingGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "deadswitch.log");
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(non_blocking);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter(level))
                .with(console_layer.json())
                .with(file_layer.json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter(level))
                .with(console_layer)
                .with(file_layer)
                .init();
        }
    }

    Ok(LoggingGuard { _file_guard: file_guard })
}
