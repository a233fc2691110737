//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! [`Walker`] visits every regular file below a disk root. Directories are
//! traversal-only and never yielded. Children are sorted by name at every
//! level, so two walks over an unchanged tree yield the same sequence.
//!
//! Hidden files are included; filtering is left to the rule engine.
//! Symbolic links are not followed and not yielded.
//!
//! # Example
//!
//! ```no_run
//! use diskprint::scanner::Walker;
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/mnt/A1"));
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use super::ScanError;

/// Directory walker yielding regular files in deterministic order.
#[derive(Debug, Clone)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
}

impl Walker {
    /// Create a new walker for the given root.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Root directory of this walk.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the directory tree, yielding paths of regular files.
    ///
    /// Unreadable directories and entries are yielded as [`ScanError`]
    /// values carrying their path rather than stopping iteration.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(false)
            .sort(true);

        walk_dir
            .into_iter()
            .filter_map(move |entry_result| match entry_result {
                Ok(mut entry) => {
                    let file_type = entry.file_type();

                    if file_type.is_dir() {
                        // jwalk yields the directory itself and keeps the
                        // failure to list it on the entry.
                        return entry
                            .read_children_error
                            .take()
                            .map(|e| Err(self.handle_jwalk_error(entry.path(), e)));
                    }

                    if file_type.is_symlink() {
                        log::trace!("Skipping symlink: {}", entry.path().display());
                        return None;
                    }

                    if !file_type.is_file() {
                        log::trace!("Skipping special file: {}", entry.path().display());
                        return None;
                    }

                    Some(Ok(entry.path()))
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    Some(Err(self.handle_jwalk_error(path, e)))
                }
            })
    }

    /// Handle jwalk errors.
    fn handle_jwalk_error(&self, path: PathBuf, error: jwalk::Error) -> ScanError {
        use std::io::ErrorKind;

        let kind = error.io_error().map(std::io::Error::kind);
        match kind {
            Some(ErrorKind::PermissionDenied) => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path)
            }
            Some(ErrorKind::NotFound) => {
                log::debug!("Entry vanished during walk: {}", path.display());
                ScanError::NotFound(path)
            }
            _ => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                ScanError::Io {
                    path,
                    source: std::io::Error::other(error.to_string()),
                }
            }
        }
    }
}
