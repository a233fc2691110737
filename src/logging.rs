//! Logging infrastructure for diskprint.
//!
//! This module provides structured logging using the `log` facade and `env_logger` backend.
//! Log levels are determined by (in priority order):
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. CLI flags: `--quiet` (error only) or `--verbose` (debug/trace)
//! 3. Default: info level
//!
//! Every record is written twice: to stderr, styled for the terminal, and
//! to a plain-text file `<home>/log/<YYYYMMDDhhmmss>.log` that keeps a
//! permanent trail of each run, progress lines included.
//!
//! # Example
//!
//! ```rust,no_run
//! use diskprint::logging::init_logging;
//! use std::path::Path;
//!
//! let log_file = init_logging(1, false, false, Path::new("/srv/diskprint/log")).unwrap();
//! log::info!("Writing log to {}", log_file.display());
//! ```

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use env_logger::{Builder, Logger, Target, WriteStyle};
use log::{LevelFilter, Log, Metadata, Record};

/// Errors raised while setting up logging. All of them are fatal.
#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    /// The log directory or file could not be created.
    #[error("Cannot create log file {path}: {source}")]
    CreateFile {
        /// Log file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A global logger is already installed.
    #[error("Logging was already initialized")]
    AlreadyInitialized(#[from] log::SetLoggerError),
}

/// Sends every record to the console logger and the file logger.
pub struct FanoutLogger {
    console: Logger,
    file: Logger,
}

impl FanoutLogger {
    /// Combine two loggers.
    #[must_use]
    pub fn new(console: Logger, file: Logger) -> Self {
        Self { console, file }
    }

    /// Most verbose level either side accepts.
    #[must_use]
    pub fn filter(&self) -> LevelFilter {
        self.console.filter().max(self.file.filter())
    }
}

impl Log for FanoutLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.console.enabled(metadata) || self.file.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        self.console.log(record);
        self.file.log(record);
    }

    fn flush(&self) {
        self.console.flush();
        self.file.flush();
    }
}

/// Initialize console and file logging.
///
/// Creates `log_dir` if needed and returns the path of this run's log file.
///
/// # Errors
///
/// Fails when the log file cannot be created or a logger is already
/// installed.
pub fn init_logging(
    verbose: u8,
    quiet: bool,
    no_color: bool,
    log_dir: &Path,
) -> Result<PathBuf, LoggingError> {
    let path = log_dir.join(log_file_name(Local::now()));
    let file = open_log_file(&path)?;

    let level = determine_level(verbose, quiet);
    let fanout = FanoutLogger::new(
        console_builder(level, verbose, no_color).build(),
        file_builder(level, file).build(),
    );

    log::set_max_level(fanout.filter());
    log::set_boxed_logger(Box::new(fanout))?;

    log::debug!("Logging initialized at level {:?}, file {}", level, path.display());
    Ok(path)
}

/// Name of the log file for a run started at `started`.
#[must_use]
pub fn log_file_name(started: DateTime<Local>) -> String {
    format!("{}.log", started.format("%Y%m%d%H%M%S"))
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    let create_err = |source| LoggingError::CreateFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(create_err)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(create_err)
}

/// Apply `RUST_LOG` when set, otherwise the CLI level.
fn apply_filter(builder: &mut Builder, level: LevelFilter) {
    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(level);
    }
}

fn console_builder(level: LevelFilter, verbose: u8, no_color: bool) -> Builder {
    let mut builder = Builder::new();
    apply_filter(&mut builder, level);
    builder.target(Target::Stderr);
    builder.write_style(if no_color {
        WriteStyle::Never
    } else {
        WriteStyle::Auto
    });

    builder.format(move |buf, record| {
        let timestamp = buf.timestamp_seconds();
        let level = record.level();
        let level_style = buf.default_level_style(level);

        if verbose >= 1 {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} [{}] {}",
                timestamp,
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} {}",
                timestamp,
                level,
                record.args()
            )
        }
    });
    builder
}

fn file_builder(level: LevelFilter, file: File) -> Builder {
    let mut builder = Builder::new();
    apply_filter(&mut builder, level);
    builder.target(Target::Pipe(Box::new(file)));
    builder.write_style(WriteStyle::Never);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        )
    });
    builder
}

/// Determine the log level from CLI flags.
///
/// # Arguments
///
/// * `verbose` - Verbosity count (0=info, 1=debug, 2+=trace)
/// * `quiet` - If true, use error level
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
