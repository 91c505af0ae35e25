//! Tracing setup for hosts embedding the engine.
//!
//! Driven by [`LoggingConfig`]: stdout always, plus a daily-rolling
//! `engine.log` when a log directory is configured. Initialization is
//! fallible rather than best-effort; a host that cannot get its log
//! directory should hear about it.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::errors::{EngineError, EngineResult};

/// Keeps the non-blocking file writer alive; dropping it flushes and stops
/// file logging.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Installs the global subscriber. Returns the file guard when file
/// logging is configured, `None` for stdout-only. Fails if a subscriber is
/// already installed or the log directory cannot be created.
pub fn init_tracing(config: &LoggingConfig) -> EngineResult<Option<FileLogGuard>> {
    let env_filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    match &config.file_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|err| {
                EngineError::Computation(format!(
                    "failed to create log directory {}: {err}",
                    dir.display()
                ))
            })?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "engine.log");
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true);

            registry
                .with(file_layer)
                .try_init()
                .map_err(|err| EngineError::Computation(format!("tracing init failed: {err}")))?;
            Ok(Some(FileLogGuard { _guard: guard }))
        }
        None => {
            registry
                .try_init()
                .map_err(|err| EngineError::Computation(format!("tracing init failed: {err}")))?;
            Ok(None)
        }
    }
}
