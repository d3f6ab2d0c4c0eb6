//! Logging initialization

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::args::{Args, LogFormat};

/// Prefix of the daily log files; the date is appended by the appender
pub const LOG_FILE_PREFIX: &str = "zapret.log";

/// Initialize logging based on CLI arguments
///
/// Console output goes to stderr. When `log_dir` is given, a daily rolling
/// file layer is added there; the returned guard flushes it on drop and must
/// live until the process exits.
pub fn init(args: &Args, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(file_layer);

    match args.log_format {
        LogFormat::Text => {
            registry
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_target(args.verbose >= 2)
                        .with_thread_ids(args.verbose >= 3)
                        .with_file(args.verbose >= 3)
                        .with_line_number(args.verbose >= 3),
                )
                .init();
        }
        LogFormat::Json => {
            registry.with(fmt::layer().json().with_writer(io::stderr)).init();
        }
        LogFormat::Compact => {
            registry.with(fmt::layer().compact().with_writer(io::stderr)).init();
        }
    }

    Ok(guard)
}
