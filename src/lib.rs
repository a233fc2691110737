//! diskprint - Incremental content fingerprints for backup disks
//!
//! Walks one or more marked disks concurrently, MD5-hashes every new file
//! that passes the filter rules, keeps one fingerprint file per disk in
//! step with what is on the disk, and merges the fingerprint files of
//! disks sharing a letter prefix into one sorted group file.

pub mod cli;
pub mod config;
pub mod disk;
pub mod error;
pub mod filter;
pub mod lister;
pub mod logging;
pub mod merge;
pub mod pipeline;
pub mod progress;
pub mod records;
pub mod scanner;
pub mod worker;

use anyhow::Context;

use crate::cli::Cli;
use crate::config::{Config, SettingsOverrides};
use crate::error::ExitCode;
use crate::filter::FilterSet;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Run one fingerprinting pass as described by `cli`.
///
/// # Errors
///
/// Returns any fatal error: bad configuration, unusable filter rules,
/// missing or invalid disk markers, corrupt fingerprint files, or a failed
/// merge.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let overrides = SettingsOverrides {
        chunk_size: cli.chunk_size,
        filter_file: cli.filter_file.clone(),
    };
    let config = Config::load(cli.home.as_deref(), &overrides)?;
    config.ensure_dirs()?;

    let log_file = logging::init_logging(cli.verbose, cli.quiet, cli.no_color, &config.log_dir)?;
    log::info!(
        "diskprint {} (home {}, log {})",
        env!("CARGO_PKG_VERSION"),
        config.home.display(),
        log_file.display()
    );
    log::debug!("Settings: {:?}", config.settings);

    let filter_path = config.filter_path();
    let filters = FilterSet::load(&filter_path)?;
    log::debug!("Loaded {} filter rules from {}", filters.len(), filter_path.display());
    if filters.is_empty() {
        log::warn!("No filter rules in {}; every file is excluded", filter_path.display());
    }

    let current_dir = std::env::current_dir().context("Cannot determine the current directory")?;
    let disks = disk::discover(&current_dir, &cli.roots)?;

    let summary = Pipeline::new(PipelineConfig::from(&config), filters).run(disks)?;

    log::info!(
        "Finished: {} files hashed ({}), {} group files, {} lines",
        summary.hashed_files(),
        bytesize::ByteSize::b(summary.hashed_bytes()),
        summary.merge.groups.len(),
        summary.merge.total_lines()
    );

    for failure in &summary.failures {
        log::warn!("Incomplete: {failure}");
    }
    Ok(summary.exit_code())
}
