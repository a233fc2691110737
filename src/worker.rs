//! Per-disk hashing worker.
//!
//! A [`DiskWorker`] moves through
//! `Listing -> Hashing -> Draining -> Done`, or ends in `Failed`:
//!
//! - **Listing** runs the incremental lister, which also rewrites the
//!   record file to the carried-forward set, then opens the record file for
//!   appending and seeds the progress totals.
//! - **Hashing** fingerprints the queued files in walk order, appending one
//!   line per success and reporting progress after every chunk.
//! - **Draining** sends the final snapshot.
//!
//! Per-file read errors are soft: the file gets no line, the counters still
//! advance, and hashing continues.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;

use crate::disk::Disk;
use crate::filter::FilterSet;
use crate::lister::{self, Listing};
use crate::progress::ProgressSnapshot;
use crate::records::{self, RecordError, RecordOpener, RecordSink};
use crate::scanner::{fingerprint_to_hex, Hasher};

/// Lifecycle of a disk worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Walking the disk and reconciling previous records
    Listing,
    /// Fingerprinting queued files
    Hashing,
    /// Reporting final progress
    Draining,
    /// Finished normally
    Done,
    /// Stopped by an error
    Failed,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Listing => "listing",
            Self::Hashing => "hashing",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Errors that end a disk worker.
#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    /// The output directory could not be created.
    #[error("[{disk}] Cannot create output directory {path}: {source}")]
    OutputDir {
        /// Disk id
        disk: String,
        /// Output directory
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Previous records are corrupt or could not be rewritten.
    #[error("[{disk}] Cannot prepare fingerprint file: {source}")]
    Listing {
        /// Disk id
        disk: String,
        /// Record file error
        #[source]
        source: RecordError,
    },

    /// The record file could not be opened for appending.
    #[error("[{disk}] Cannot open fingerprint file for appending: {source}")]
    OpenAppend {
        /// Disk id
        disk: String,
        /// Record file error
        #[source]
        source: RecordError,
    },

    /// Writing a new record failed part way through the run.
    #[error("[{disk}] Writing fingerprints failed after {written} new records: {source}")]
    Append {
        /// Disk id
        disk: String,
        /// Records appended before the failure
        written: usize,
        /// Record file error
        #[source]
        source: RecordError,
    },
}

impl WorkerError {
    /// Whether the whole run must abort.
    ///
    /// Setup and corruption failures point at a broken environment. A write
    /// failure mid-run only ends this disk.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Append { .. })
    }

    /// Id of the disk that failed.
    #[must_use]
    pub fn disk_id(&self) -> &str {
        match self {
            Self::OutputDir { disk, .. }
            | Self::Listing { disk, .. }
            | Self::OpenAppend { disk, .. }
            | Self::Append { disk, .. } => disk,
        }
    }
}

/// What a worker did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Disk id
    pub disk_id: String,
    /// Records kept from the previous run
    pub carried_forward: usize,
    /// Previous records dropped because their file is gone
    pub pruned: usize,
    /// Files rejected by the filter rules
    pub excluded: usize,
    /// Files newly fingerprinted
    pub hashed_files: usize,
    /// Bytes read while fingerprinting
    pub hashed_bytes: u64,
    /// Files that could not be read
    pub failed_files: usize,
}

/// Completion notice sent once per disk.
#[derive(Debug)]
pub struct CompletionMessage {
    /// Disk id
    pub disk_id: String,
    /// Report on success, the terminating error otherwise
    pub outcome: Result<WorkerReport, WorkerError>,
}

/// Fingerprints one disk.
#[derive(Debug)]
pub struct DiskWorker {
    disk: Arc<Disk>,
    filters: Arc<FilterSet>,
    out_dir: PathBuf,
    chunk_size: usize,
    progress: Sender<ProgressSnapshot>,
    opener: RecordOpener,
    state: WorkerState,
}

impl DiskWorker {
    /// Create a worker in the `Listing` state.
    #[must_use]
    pub fn new(
        disk: Arc<Disk>,
        filters: Arc<FilterSet>,
        out_dir: PathBuf,
        chunk_size: usize,
        progress: Sender<ProgressSnapshot>,
    ) -> Self {
        Self {
            disk,
            filters,
            out_dir,
            chunk_size,
            progress,
            opener: records::open_appender,
            state: WorkerState::Listing,
        }
    }

    /// Use `opener` instead of [`records::open_appender`] for the record file.
    #[must_use]
    pub fn with_record_opener(mut self, opener: RecordOpener) -> Self {
        self.opener = opener;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run to completion.
    ///
    /// # Errors
    ///
    /// Returns a [`WorkerError`]; see [`WorkerError::is_fatal`] for which
    /// ones abort the run.
    pub fn run(&mut self) -> Result<WorkerReport, WorkerError> {
        let result = self.run_states();
        if let Err(e) = &result {
            self.enter(WorkerState::Failed);
            log::error!("{e}");
        }
        result
    }

    fn run_states(&mut self) -> Result<WorkerReport, WorkerError> {
        let disk_id = self.disk.id().to_string();
        log::debug!("[{disk_id}] Worker started in state {}", self.state);

        fs::create_dir_all(&self.out_dir).map_err(|source| WorkerError::OutputDir {
            disk: disk_id.clone(),
            path: self.out_dir.clone(),
            source,
        })?;

        let listing = lister::list_for_hashing(&self.disk, &self.filters, &self.out_dir)
            .map_err(|source| WorkerError::Listing {
                disk: disk_id.clone(),
                source,
            })?;

        let record_path = records::record_file_path(&self.out_dir, &disk_id);
        let appender = (self.opener)(&record_path).map_err(|source| WorkerError::OpenAppend {
            disk: disk_id.clone(),
            source,
        })?;

        let mut report = WorkerReport {
            disk_id,
            carried_forward: listing.carried_forward,
            pruned: listing.pruned,
            excluded: listing.excluded,
            ..WorkerReport::default()
        };

        self.enter(WorkerState::Hashing);
        let mut snapshot = self.hash_all(&listing, appender, &mut report)?;

        self.enter(WorkerState::Draining);
        snapshot.current_file = None;
        snapshot.finished = true;
        self.send(&snapshot);

        self.enter(WorkerState::Done);
        Ok(report)
    }

    fn hash_all(
        &self,
        listing: &Listing,
        mut appender: Box<dyn RecordSink + Send>,
        report: &mut WorkerReport,
    ) -> Result<ProgressSnapshot, WorkerError> {
        let mut snapshot = ProgressSnapshot::seeded(
            self.disk.index(),
            self.disk.id(),
            listing.to_hash.len() as u64,
            listing.total_bytes,
            Instant::now(),
        );
        self.send(&snapshot);

        let mut hasher = Hasher::with_chunk_size(self.chunk_size);

        for record in &listing.to_hash {
            let budget_end = snapshot.bytes_processed + record.size();
            snapshot.current_file = Some(record.canonical().to_string());
            self.send(&snapshot);

            let mut read = 0u64;
            let digest = hasher.digest(record.real_path(), |n| {
                read += n;
                snapshot.bytes_processed = (snapshot.bytes_processed + n).min(budget_end);
                self.send(&snapshot);
            });

            match digest {
                Ok(fingerprint) => {
                    if let Err(source) =
                        appender.append(record.canonical(), &fingerprint_to_hex(&fingerprint))
                    {
                        snapshot.finished = true;
                        self.send(&snapshot);
                        return Err(WorkerError::Append {
                            disk: report.disk_id.clone(),
                            written: appender.written(),
                            source,
                        });
                    }
                    report.hashed_files += 1;
                    report.hashed_bytes += read;
                }
                Err(e) => {
                    log::warn!("[{}] Skipping unreadable file: {}", report.disk_id, e);
                    report.failed_files += 1;
                }
            }

            snapshot.files_processed += 1;
            snapshot.bytes_processed = snapshot.bytes_processed.max(budget_end);
            self.send(&snapshot);
        }

        Ok(snapshot)
    }

    fn enter(&mut self, next: WorkerState) {
        log::debug!("[{}] {} -> {}", self.disk.id(), self.state, next);
        self.state = next;
    }

    fn send(&self, snapshot: &ProgressSnapshot) {
        if self.progress.send(snapshot.clone()).is_err() {
            log::trace!("[{}] Progress receiver is gone", self.disk.id());
        }
    }
}
