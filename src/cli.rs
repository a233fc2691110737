//! Command-line interface definitions for diskprint.
//!
//! # Example
//!
//! ```bash
//! # Fingerprint the disk containing the current directory
//! DISKPRINT_HOME=~/diskprint diskprint
//!
//! # Fingerprint two mounted disks concurrently
//! diskprint --home ~/diskprint /mnt/A1 /mnt/A2
//!
//! # Smaller read chunks, debug logging
//! diskprint -v --chunk-size 4MiB /mnt/B3
//! ```

use clap::Parser;
use std::path::PathBuf;

/// Incremental content fingerprints for backup disks.
///
/// Each disk root holds a `disk` marker naming the disk (e.g. `A1`). New
/// and changed files are hashed with MD5 into `<home>/out/<id>`; afterwards
/// disks sharing a letter prefix are merged into `<home>/out/<letter>`.
#[derive(Debug, Parser)]
#[command(name = "diskprint")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Disk roots to fingerprint; without any, search upward from the
    /// current directory for a `disk` marker
    #[arg(value_name = "DISK_ROOT")]
    pub roots: Vec<PathBuf>,

    /// Base directory holding log/, out/ and configs/
    #[arg(long, value_name = "DIR", env = "DISKPRINT_HOME")]
    pub home: Option<PathBuf>,

    /// Read chunk size for hashing (e.g., 8MiB, 10MB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub chunk_size: Option<u64>,

    /// Filter rule file (relative paths resolve against configs/)
    #[arg(long, value_name = "FILE")]
    pub filter_file: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}

/// Parse a human-readable size string into bytes.
///
/// # Examples
///
/// ```
/// use diskprint::cli::parse_size;
///
/// assert_eq!(parse_size("10MiB").unwrap(), 10 * 1_048_576);
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// ```
///
/// # Errors
///
/// Returns a message for empty input, a malformed number, or an unknown
/// suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
