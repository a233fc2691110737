//! Canonical path keys for fingerprint records.
//!
//! A file is identified across runs (and across operating systems) by its
//! path relative to the disk root, with `/` separators and Unicode NFC
//! composition. The same function is used when a file is discovered and when
//! the previous run's records are matched against it, so the two sides of
//! the incremental-skip lookup always agree.
//!
//! # Background
//!
//! macOS stores file names decomposed (NFD) while Windows and Linux usually
//! keep them composed (NFC). The same visual name can therefore arrive with
//! different bytes:
//!
//! - NFC: `café.txt` - 'é' is U+00E9 (single code point)
//! - NFD: `café.txt` - 'e' U+0065 + combining acute accent U+0301
//!
//! # Example
//!
//! ```
//! use diskprint::scanner::path_utils::canonical_path;
//! use std::path::Path;
//!
//! let key = canonical_path(Path::new("/mnt/A1"), Path::new("/mnt/A1/photos/cafe\u{0301}.jpg"));
//! assert_eq!(key.as_str(), "photos/café.jpg");
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::path::{Component, Path};

use unicode_normalization::UnicodeNormalization;

/// Platform-independent identity key of a file relative to its disk root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    /// Build a key from an already relative path string.
    ///
    /// Backslashes are treated as separators and the result is NFC-composed,
    /// so `dir\cafe\u{301}` and `dir/café` produce the same key.
    #[must_use]
    pub fn from_relative(relative: &str) -> Self {
        Self(normalize_path_str(&relative.replace('\\', "/")))
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key can be written to a `path:digest` line unambiguously.
    #[must_use]
    pub fn is_recordable(&self) -> bool {
        !self.0.is_empty() && !self.0.contains([':', '\n', '\r'])
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CanonicalPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CanonicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the canonical key of `real_path` relative to `disk_root`.
///
/// Only normal components survive; the root prefix and `.` segments are
/// dropped. When `real_path` does not live under `disk_root` the full path
/// is used as the relative part, which never matches a recorded key.
#[must_use]
pub fn canonical_path(disk_root: &Path, real_path: &Path) -> CanonicalPath {
    let relative = real_path.strip_prefix(disk_root).unwrap_or(real_path);

    let joined = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    CanonicalPath::from_relative(&joined)
}

/// Normalize a path string to NFC (Composed) form.
///
/// # Example
///
/// ```
/// use diskprint::scanner::path_utils::normalize_path_str;
///
/// let nfd = "cafe\u{0301}.txt"; // NFD form
/// assert_eq!(normalize_path_str(nfd), "café.txt");
/// ```
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    if unicode_normalization::is_nfc(s) {
        s.to_string()
    } else {
        s.nfc().collect()
    }
}
