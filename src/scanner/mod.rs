//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Directory walking using jwalk (regular files only, sorted)
//! - Content hashing with MD5 in fixed-size chunks
//! - Unicode path normalization into canonical record keys
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: chunked MD5 hashing with a per-chunk progress callback
//! - [`path_utils`]: canonical path keys
//!
//! Errors raised here are per-file: callers log them and move on.
//!
//! # Example
//!
//! ```no_run
//! use diskprint::scanner::{fingerprint_to_hex, Hasher, Walker};
//! use std::path::Path;
//!
//! let mut hasher = Hasher::new();
//! for entry in Walker::new(Path::new("/mnt/A1")).walk() {
//!     match entry {
//!         Ok(path) => {
//!             let digest = hasher.digest(&path, |_| {}).unwrap();
//!             println!("{}: {}", path.display(), fingerprint_to_hex(&digest));
//!         }
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

// Re-export main types
pub use hasher::{fingerprint_to_hex, Fingerprint, Hasher, DEFAULT_CHUNK_SIZE};
pub use path_utils::{canonical_path, CanonicalPath};
pub use walker::Walker;

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Path of the entry that could not be read.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(path) | Self::NotFound(path) | Self::Io { path, .. } => path,
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised while opening or reading `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
