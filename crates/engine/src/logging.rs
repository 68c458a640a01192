//! Logging setup for the engine host
//
// File logging always goes to a timestamped folder; `--verbose` adds colored console
// output. Filtering follows RUST_LOG and defaults to `info`.
//
// Usage:
//   Call `logging::init(verbose, directory)` at the start of main().
//   Keep the returned guard alive for the program's duration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use directories::ProjectDirs;
use tracing::Subscriber;
use tracing_subscriber::fmt::{
    format::{FormatEvent, FormatFields, Writer},
    FmtContext,
};
use tracing_subscriber::registry::LookupSpan;

/// Keeps the background log writer flushing until dropped.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
    pub log_file: PathBuf,
}

/// Logs root: the configured directory, or `logs` under the app data directory.
pub fn logs_root(configured: Option<&Path>) -> PathBuf {
    if let Some(dir) = configured {
        return dir.to_path_buf();
    }
    match ProjectDirs::from("com", "Pulsar", "Engine_Host") {
        Some(dirs) => dirs.data_dir().join("logs"),
        None => PathBuf::from("logs"),
    }
}

/// Initializes logging for the engine host.
///
/// - `verbose`: If true, enables colored console output.
/// - `directory`: Overrides the logs root.
/// - Returns: LogGuard, which must be kept alive for file logging.
pub fn init(verbose: bool, directory: Option<&Path>) -> anyhow::Result<LogGuard> {
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_folder = logs_root(directory).join(stamp);
    fs::create_dir_all(&log_folder)
        .with_context(|| format!("Failed to create log folder {}", log_folder.display()))?;
    let log_file = log_folder.join("engine.log");

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to open {} for writing", log_file.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    use tracing_subscriber::prelude::*;
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // File log: plain formatting, no ANSI/color codes
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    let installed = if verbose {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .event_format(ConsoleFormatter);
        registry.with(console_layer).try_init()
    } else {
        registry.try_init()
    };
    installed.context("A global tracing subscriber is already installed")?;

    Ok(LogGuard {
        _guard: guard,
        log_file,
    })
}

/// Colored console formatter: timestamp, level, target, message.
pub struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let (level_str, level_color) = match *meta.level() {
            tracing::Level::ERROR => ("ERROR", "\x1b[1;91m"),
            tracing::Level::WARN => ("WARN ", "\x1b[1;93m"),
            tracing::Level::INFO => ("INFO ", "\x1b[1;94m"),
            tracing::Level::DEBUG => ("DEBUG", "\x1b[1;92m"),
            tracing::Level::TRACE => ("TRACE", "\x1b[1;95m"),
        };

        write!(writer, "\x1b[2;36m{}\x1b[0m ", Local::now().format("%H:%M:%S%.3f"))?;
        write!(writer, "{}{}\x1b[0m ", level_color, level_str)?;
        write!(writer, "\x1b[4;2;33m{}\x1b[0m: ", meta.target())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
