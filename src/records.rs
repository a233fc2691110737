//! Fingerprint record files.
//!
//! Each disk owns one file, `<out>/<disk id>`, holding one
//! `canonical/path:hexdigest` line per fingerprinted file. At the start of a
//! run the file is loaded in order, then replaced atomically with the
//! records that are still present, and finally appended to as new files
//! are hashed.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::scanner::CanonicalPath;

/// Separator between the path and the digest on a record line.
pub const FIELD_SEPARATOR: char = ':';

/// Length of a hex-rendered MD5 digest.
pub const DIGEST_HEX_LEN: usize = 32;

/// Errors raised while reading or writing record files.
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// A line that is not a single well-formed `path:digest` pair.
    #[error("Corrupt fingerprint file {path} at line {line}: {reason}")]
    Corrupt {
        /// Record file path
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What is wrong with the line
        reason: String,
    },

    /// The record file is not UTF-8 text.
    #[error("Fingerprint file is not valid UTF-8: {0}")]
    Encoding(PathBuf),

    /// Reading, writing or renaming a record file failed.
    #[error("I/O error on fingerprint file {path}: {source}")]
    Io {
        /// Record file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl RecordError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Location of a disk's record file inside the output directory.
#[must_use]
pub fn record_file_path(out_dir: &Path, disk_id: &str) -> PathBuf {
    out_dir.join(disk_id)
}

/// Render one record line, newline included.
#[must_use]
pub fn format_line(path: &CanonicalPath, digest: &str) -> String {
    format!("{path}{FIELD_SEPARATOR}{digest}\n")
}

/// Split a record line into its path and digest halves.
///
/// Returns a description of the problem for malformed lines.
pub fn parse_line(line: &str) -> Result<(&str, &str), String> {
    let separators = line.matches(FIELD_SEPARATOR).count();
    if separators != 1 {
        return Err(format!(
            "expected exactly one '{FIELD_SEPARATOR}' but found {separators}"
        ));
    }

    let (path, digest) = line
        .split_once(FIELD_SEPARATOR)
        .ok_or_else(|| format!("missing '{FIELD_SEPARATOR}'"))?;

    if path.is_empty() {
        return Err("empty path".to_string());
    }
    if digest.len() != DIGEST_HEX_LEN || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("'{digest}' is not a {DIGEST_HEX_LEN}-digit hex digest"));
    }

    Ok((path, digest))
}

/// One line of a previous run's record file.
#[derive(Debug, Clone)]
struct PriorRecord {
    path: CanonicalPath,
    digest: String,
    present: bool,
}

/// Records of a previous run, in file order.
///
/// The lister claims every record whose file is still on the disk; the
/// claimed records are written back in their original order, so a run that
/// hashes nothing leaves the record file byte-identical.
#[derive(Debug, Default)]
pub struct PriorRecords {
    entries: Vec<PriorRecord>,
    index: HashMap<CanonicalPath, usize>,
}

impl PriorRecords {
    /// Number of records loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no records were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded digest of `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.index
            .get(path)
            .map(|&i| self.entries[i].digest.as_str())
    }

    /// Mark `path` as still present. Returns `false` when it has no record
    /// or was already claimed.
    pub fn claim(&mut self, path: &str) -> bool {
        match self.index.get(path) {
            Some(&i) if !self.entries[i].present => {
                self.entries[i].present = true;
                true
            }
            _ => false,
        }
    }

    /// Claimed records rendered as record lines, in file order.
    #[must_use]
    pub fn render_claimed(&self) -> String {
        self.entries
            .iter()
            .filter(|e| e.present)
            .map(|e| format_line(&e.path, &e.digest))
            .collect()
    }

    /// Records nobody claimed, in file order.
    pub fn unclaimed(&self) -> impl Iterator<Item = &CanonicalPath> {
        self.entries.iter().filter(|e| !e.present).map(|e| &e.path)
    }

    fn push(&mut self, path: CanonicalPath, digest: &str) -> bool {
        if self.index.contains_key(&path) {
            return false;
        }
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push(PriorRecord {
            path,
            digest: digest.to_string(),
            present: false,
        });
        true
    }
}

/// Load a previous run's records.
///
/// A missing file yields an empty set. Blank lines are skipped; every other
/// line must parse and paths must be unique.
///
/// # Errors
///
/// Returns [`RecordError::Corrupt`] naming the file and line for malformed
/// content, or an I/O / encoding error when the file cannot be read.
pub fn load_prior(path: &Path) -> Result<PriorRecords, RecordError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No previous fingerprints at {}", path.display());
            return Ok(PriorRecords::default());
        }
        Err(e) => return Err(RecordError::io(path, e)),
    };
    let text = String::from_utf8(bytes).map_err(|_| RecordError::Encoding(path.to_path_buf()))?;

    let mut records = PriorRecords::default();
    for (index, raw) in text.lines().enumerate() {
        if raw.is_empty() {
            continue;
        }
        let corrupt = |reason: String| RecordError::Corrupt {
            path: path.to_path_buf(),
            line: index + 1,
            reason,
        };

        let (file, digest) = parse_line(raw).map_err(corrupt)?;
        if !records.push(CanonicalPath::from_relative(file), digest) {
            return Err(corrupt(format!("duplicate path '{file}'")));
        }
    }

    log::debug!(
        "Loaded {} previous fingerprints from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Replace `path` with `contents` so readers see either the old or the new
/// file, never a partial one.
///
/// # Errors
///
/// Returns [`RecordError::Io`] when the temporary file cannot be written,
/// synced or renamed into place.
pub fn rewrite_atomic(path: &Path, contents: &[u8]) -> Result<(), RecordError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    result.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        RecordError::io(path, e)
    })
}

/// Destination for newly computed fingerprints of one disk.
pub trait RecordSink {
    /// Persist one record.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] when the record cannot be stored.
    fn append(&mut self, path: &CanonicalPath, digest: &str) -> Result<(), RecordError>;

    /// Number of records stored so far.
    fn written(&self) -> usize;
}

/// Opens the [`RecordSink`] for a record file path.
pub type RecordOpener = fn(&Path) -> Result<Box<dyn RecordSink + Send>, RecordError>;

/// Default [`RecordOpener`]: a [`RecordAppender`] on the file itself.
///
/// # Errors
///
/// Returns [`RecordError::Io`] when the file cannot be opened.
pub fn open_appender(path: &Path) -> Result<Box<dyn RecordSink + Send>, RecordError> {
    Ok(Box::new(RecordAppender::open(path)?))
}

/// Append-only writer for newly computed fingerprints.
///
/// Every line is flushed as soon as it is written, so an interrupted run
/// keeps everything hashed before the interruption.
#[derive(Debug)]
pub struct RecordAppender {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl RecordAppender {
    /// Open (creating if needed) the record file for appending.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Io`] when the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, RecordError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| RecordError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }
}

impl RecordSink for RecordAppender {
    /// Append one record and flush it.
    fn append(&mut self, path: &CanonicalPath, digest: &str) -> Result<(), RecordError> {
        self.writer
            .write_all(format_line(path, digest).as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|e| RecordError::io(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    fn written(&self) -> usize {
        self.written
    }
}
