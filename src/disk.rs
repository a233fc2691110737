//! Disk discovery and identity markers.
//!
//! Every disk root carries a small marker file named [`MARKER_FILE`] whose
//! first line starts with the disk id, e.g. `A1`. The id names the disk's
//! fingerprint file and, through its letter prefix, its merge group.
//!
//! With explicit roots each root must contain a marker. Without roots the
//! catalog searches upward from the working directory and uses the nearest
//! ancestor holding a marker as the only disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Name of the identity marker file at each disk root.
pub const MARKER_FILE: &str = "disk";

/// Leading disk id inside a marker file: uppercase letters then digits.
pub static DISK_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]+[0-9]+").expect("disk id pattern is valid"));

/// Errors raised while building the disk catalog. All of them are fatal.
#[derive(thiserror::Error, Debug)]
pub enum DiskError {
    /// No marker file in the working directory or any of its ancestors.
    #[error("No '{MARKER_FILE}' marker found in {0} or any parent directory")]
    MarkerNotFound(PathBuf),

    /// An explicit disk root has no marker file.
    #[error("Disk root has no '{MARKER_FILE}' marker: {0}")]
    MissingMarker(PathBuf),

    /// The marker file exists but could not be read.
    #[error("Failed to read disk marker {path}: {source}")]
    Unreadable {
        /// Marker file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The marker's first line does not start with a valid disk id.
    #[error("Malformed disk marker {0}: first line must start with an id like 'A1'")]
    InvalidMarker(PathBuf),

    /// The root path could not be made absolute.
    #[error("Cannot resolve disk root {path}: {source}")]
    Resolve {
        /// Root as given
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Two roots carry the same id and would share one fingerprint file.
    #[error("Disk id {id} appears at both {first} and {second}")]
    DuplicateId {
        /// The shared id
        id: String,
        /// Root discovered first
        first: PathBuf,
        /// Root discovered later
        second: PathBuf,
    },

    /// More than one root failed validation.
    #[error("{} disk roots are invalid: {}", .0.len(), join_errors(.0))]
    Several(Vec<DiskError>),
}

fn join_errors(errors: &[DiskError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One storage volume under fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    index: usize,
    id: String,
    root: PathBuf,
}

impl Disk {
    /// Construct a disk directly.
    #[must_use]
    pub fn new(index: usize, id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            index,
            id: id.into(),
            root: root.into(),
        }
    }

    /// Zero-based position in discovery order; addresses the progress slot.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Identity string from the marker, e.g. `A1`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Absolute content root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Merge group: the leading letter run of the id (`A12` gives `A`).
    #[must_use]
    pub fn group(&self) -> &str {
        group_of(&self.id).unwrap_or(&self.id)
    }
}

/// Letter prefix of a well-formed id, `None` when `id` is not an id.
#[must_use]
pub fn group_of(id: &str) -> Option<&str> {
    let split = id.find(|c: char| !c.is_ascii_uppercase())?;
    let (letters, digits) = id.split_at(split);
    let well_formed =
        !letters.is_empty() && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
    well_formed.then_some(letters)
}

/// Resolve the disks to process.
///
/// With an empty `roots` the nearest ancestor of `current_dir` holding a
/// marker is the single disk. Otherwise every root is validated and indices
/// follow argument order. All invalid roots are reported together.
///
/// # Errors
///
/// Returns a [`DiskError`] when a marker is missing, unreadable, malformed,
/// or when two roots share an id.
pub fn discover(current_dir: &Path, roots: &[PathBuf]) -> Result<Vec<Disk>, DiskError> {
    let roots = if roots.is_empty() {
        let root = find_marker_root(current_dir)
            .ok_or_else(|| DiskError::MarkerNotFound(current_dir.to_path_buf()))?;
        log::debug!("Using disk root found upward: {}", root.display());
        vec![root]
    } else {
        roots.to_vec()
    };

    let mut disks = Vec::with_capacity(roots.len());
    let mut errors = Vec::new();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    for root in roots {
        match load_disk(disks.len(), &root) {
            Ok(disk) => {
                if let Some(first) = seen.get(disk.id()) {
                    errors.push(DiskError::DuplicateId {
                        id: disk.id.clone(),
                        first: first.clone(),
                        second: disk.root.clone(),
                    });
                    continue;
                }
                seen.insert(disk.id.clone(), disk.root.clone());
                log::debug!(
                    "Disk {} [{}] at {}",
                    disk.id,
                    disk.index,
                    disk.root.display()
                );
                disks.push(disk);
            }
            Err(e) => errors.push(e),
        }
    }

    match errors.len() {
        0 => Ok(disks),
        1 => Err(errors.remove(0)),
        _ => Err(DiskError::Several(errors)),
    }
}

/// Walk from `start` towards the filesystem root looking for a marker.
#[must_use]
pub fn find_marker_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(MARKER_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Extract the disk id from marker file contents.
#[must_use]
pub fn parse_marker(contents: &str) -> Option<&str> {
    let first_line = contents.lines().next()?;
    DISK_ID_PATTERN.find(first_line).map(|m| m.as_str())
}

fn load_disk(index: usize, root: &Path) -> Result<Disk, DiskError> {
    let root = std::path::absolute(root).map_err(|source| DiskError::Resolve {
        path: root.to_path_buf(),
        source,
    })?;
    let marker = root.join(MARKER_FILE);

    if !marker.is_file() {
        return Err(DiskError::MissingMarker(root));
    }

    let bytes = fs::read(&marker).map_err(|source| DiskError::Unreadable {
        path: marker.clone(),
        source,
    })?;
    let contents = String::from_utf8_lossy(&bytes);
    let id = parse_marker(contents.trim_start_matches('\u{feff}'))
        .ok_or_else(|| DiskError::InvalidMarker(marker.clone()))?;

    Ok(Disk::new(index, id, root))
}
