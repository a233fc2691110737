//! Incremental file listing for one disk.
//!
//! A listing walks the disk once and splits what it finds in two:
//!
//! - files already present in the previous run's records are carried
//!   forward verbatim and never hashed again;
//! - the remaining files that pass the filter rules become [`FileRecord`]s
//!   queued for hashing.
//!
//! Before returning, the record file is atomically replaced with exactly the
//! carried-forward lines, kept in the order the previous file listed them.
//! Records of files that disappeared from the disk are thereby pruned, and
//! the file is ready to be appended to. A directory the walker cannot read
//! looks empty, so records below it are pruned too; the listing counts them
//! separately and warns once per disk.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::disk::Disk;
use crate::filter::FilterSet;
use crate::records::{self, RecordError};
use crate::scanner::{canonical_path, CanonicalPath, Walker};

/// A file queued for hashing.
#[derive(Debug)]
pub struct FileRecord {
    disk: Arc<Disk>,
    real_path: PathBuf,
    canonical: CanonicalPath,
    size: OnceLock<u64>,
}

impl FileRecord {
    /// Create a record for `real_path` on `disk`; the size is resolved lazily.
    #[must_use]
    pub fn new(disk: Arc<Disk>, real_path: PathBuf) -> Self {
        let canonical = canonical_path(disk.root(), &real_path);
        Self {
            disk,
            real_path,
            canonical,
            size: OnceLock::new(),
        }
    }

    /// Owning disk.
    #[must_use]
    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    /// Absolute path used for I/O.
    #[must_use]
    pub fn real_path(&self) -> &Path {
        &self.real_path
    }

    /// Identity key relative to the disk root.
    #[must_use]
    pub fn canonical(&self) -> &CanonicalPath {
        &self.canonical
    }

    /// File size in bytes, resolved on first call.
    ///
    /// A failed stat counts as 0 bytes and is logged; it never fails the
    /// record.
    pub fn size(&self) -> u64 {
        *self.size.get_or_init(|| match fs::metadata(&self.real_path) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                log::warn!("Cannot stat {}: {}", self.real_path.display(), e);
                0
            }
        })
    }
}

/// Result of listing one disk.
#[derive(Debug, Default)]
pub struct Listing {
    /// Files to hash, in walk order.
    pub to_hash: Vec<FileRecord>,
    /// Combined size of `to_hash`.
    pub total_bytes: u64,
    /// Records kept from the previous run.
    pub carried_forward: usize,
    /// Previous records whose files are gone.
    pub pruned: usize,
    /// Part of `pruned` that sat below a directory the walker could not read.
    pub pruned_by_walk_errors: usize,
    /// Files dropped by the filter rules.
    pub excluded: usize,
    /// Files whose path cannot be stored in a record line.
    pub unrecordable: usize,
    /// Entries the walker could not read.
    pub walk_errors: usize,
    /// Files skipped because another file already claimed their key.
    pub collisions: usize,
}

/// List `disk` for hashing and rewrite its record file to the carried-forward
/// set.
///
/// # Errors
///
/// Fails when the previous record file is corrupt or unreadable, or when the
/// rewrite fails. Unreadable directory entries are logged and skipped.
pub fn list_for_hashing(
    disk: &Arc<Disk>,
    filters: &FilterSet,
    out_dir: &Path,
) -> Result<Listing, RecordError> {
    let record_path = records::record_file_path(out_dir, disk.id());
    let mut prior = records::load_prior(&record_path)?;

    let mut listing = Listing::default();
    let mut seen = HashSet::new();
    let mut unreadable = Vec::new();

    for entry in Walker::new(disk.root()).walk() {
        let real_path = match entry {
            Ok(path) => path,
            Err(e) => {
                log::warn!("[{}] Skipping unreadable entry: {}", disk.id(), e);
                listing.walk_errors += 1;
                unreadable.push(canonical_path(disk.root(), e.path()));
                continue;
            }
        };

        let key = canonical_path(disk.root(), &real_path);

        // Two spellings of one name (NFC and NFD side by side) share a key.
        if !seen.insert(key.clone()) {
            log::warn!(
                "[{}] Skipping {}: its canonical path collides with another file",
                disk.id(),
                real_path.display()
            );
            listing.collisions += 1;
            continue;
        }

        if prior.claim(key.as_str()) {
            listing.carried_forward += 1;
            continue;
        }

        if !filters.is_eligible(key.as_str()) {
            listing.excluded += 1;
            continue;
        }

        if !key.is_recordable() {
            log::warn!(
                "[{}] Skipping file whose path cannot be recorded: {:?}",
                disk.id(),
                key.as_str()
            );
            listing.unrecordable += 1;
            continue;
        }

        let record = FileRecord::new(Arc::clone(disk), real_path);
        listing.total_bytes += record.size();
        listing.to_hash.push(record);
    }

    listing.pruned = prior.unclaimed().count();
    listing.pruned_by_walk_errors = prior
        .unclaimed()
        .filter(|key| unreadable.iter().any(|dir| is_within(key, dir)))
        .count();
    if listing.pruned_by_walk_errors > 0 {
        log::warn!(
            "[{}] Pruned {} record(s) below directories that could not be read",
            disk.id(),
            listing.pruned_by_walk_errors
        );
    }
    records::rewrite_atomic(&record_path, prior.render_claimed().as_bytes())?;

    log::debug!(
        "[{}] Listed: {} to hash ({} bytes), {} carried forward, {} pruned, {} excluded",
        disk.id(),
        listing.to_hash.len(),
        listing.total_bytes,
        listing.carried_forward,
        listing.pruned,
        listing.excluded
    );

    Ok(listing)
}

/// Whether `key` is `dir` itself or lies below it. The empty key is the disk
/// root.
fn is_within(key: &CanonicalPath, dir: &CanonicalPath) -> bool {
    let (key, dir) = (key.as_str(), dir.as_str());
    dir.is_empty()
        || key
            .strip_prefix(dir)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
