//! Run orchestration.
//!
//! One thread per disk runs a [`DiskWorker`]; a dedicated thread runs the
//! [`ProgressAggregator`]. Workers share nothing but the progress channel
//! and the completion channel. The pipeline blocks until exactly one
//! [`CompletionMessage`] per disk has arrived, then merges the record files.
//! A fatal worker error ends the run at once without waiting for the other
//! disks; their threads are left running detached.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytesize::ByteSize;
use crossbeam_channel::unbounded;

use crate::config::Config;
use crate::disk::Disk;
use crate::error::ExitCode;
use crate::filter::FilterSet;
use crate::merge::{self, MergeError, MergeSummary};
use crate::progress::ProgressAggregator;
use crate::records::{self, RecordOpener};
use crate::worker::{CompletionMessage, DiskWorker, WorkerError, WorkerReport};

/// Errors that abort a run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The output directory could not be created.
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        /// Output directory
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A thread could not be started.
    #[error("Cannot start {name} thread: {source}")]
    Spawn {
        /// Thread name
        name: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A worker hit a fatal error.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Workers ended without reporting completion.
    #[error("Worker for disk {0} stopped without reporting completion")]
    Lost(String),

    /// Merging group files failed.
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where record and group files live
    pub out_dir: PathBuf,
    /// Read chunk size for hashing
    pub chunk_size: usize,
    /// Minimum time between progress lines
    pub progress_interval: Duration,
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            out_dir: config.out_dir.clone(),
            chunk_size: config.settings.chunk_size_bytes(),
            progress_interval: config.settings.progress_interval(),
        }
    }
}

/// Outcome of a run that was not aborted.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Reports of disks that completed, in completion order
    pub reports: Vec<WorkerReport>,
    /// Non-fatal worker failures
    pub failures: Vec<WorkerError>,
    /// Group files written
    pub merge: MergeSummary,
}

impl RunSummary {
    /// Whether every disk completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Files newly fingerprinted across all disks.
    #[must_use]
    pub fn hashed_files(&self) -> usize {
        self.reports.iter().map(|r| r.hashed_files).sum()
    }

    /// Bytes read across all disks.
    #[must_use]
    pub fn hashed_bytes(&self) -> u64 {
        self.reports.iter().map(|r| r.hashed_bytes).sum()
    }

    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.is_complete() {
            ExitCode::Success
        } else {
            ExitCode::PartialSuccess
        }
    }
}

/// Runs workers, waits for all of them, then merges.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    filters: Arc<FilterSet>,
    opener: RecordOpener,
}

impl Pipeline {
    /// Create a pipeline applying `filters` to every disk.
    #[must_use]
    pub fn new(config: PipelineConfig, filters: FilterSet) -> Self {
        Self {
            config,
            filters: Arc::new(filters),
            opener: records::open_appender,
        }
    }

    /// Open every disk's record file through `opener`.
    #[must_use]
    pub fn with_record_opener(mut self, opener: RecordOpener) -> Self {
        self.opener = opener;
        self
    }

    /// Fingerprint `disks` concurrently and rebuild the group files.
    ///
    /// # Errors
    ///
    /// Returns the first fatal worker error, a thread start failure, a lost
    /// worker, or a merge failure. Non-fatal worker failures are collected
    /// in [`RunSummary::failures`].
    ///
    /// On a fatal worker error the remaining disk threads and the progress
    /// thread are not joined; they keep running until they finish or the
    /// process exits.
    pub fn run(&self, disks: Vec<Disk>) -> Result<RunSummary, PipelineError> {
        fs::create_dir_all(&self.config.out_dir).map_err(|source| PipelineError::OutputDir {
            path: self.config.out_dir.clone(),
            source,
        })?;

        let (progress_tx, progress_rx) = unbounded();
        let (done_tx, done_rx) = unbounded::<CompletionMessage>();

        let aggregator = ProgressAggregator::new(disks.len(), self.config.progress_interval);
        let aggregator_handle = spawn("progress".to_string(), move || {
            aggregator.run(&progress_rx);
        })?;

        let mut pending = BTreeSet::new();
        let mut worker_handles = Vec::with_capacity(disks.len());

        for disk in disks {
            let disk = Arc::new(disk);
            let disk_id = disk.id().to_string();
            log::info!("[{}] Fingerprinting {}", disk_id, disk.root().display());

            let mut worker = DiskWorker::new(
                Arc::clone(&disk),
                Arc::clone(&self.filters),
                self.config.out_dir.clone(),
                self.config.chunk_size,
                progress_tx.clone(),
            )
            .with_record_opener(self.opener);
            let done_tx = done_tx.clone();
            let id = disk_id.clone();
            let handle = spawn(format!("disk-{disk_id}"), move || {
                let outcome = worker.run();
                drop(worker);
                let _ = done_tx.send(CompletionMessage {
                    disk_id: id,
                    outcome,
                });
            })?;

            pending.insert(disk_id);
            worker_handles.push(handle);
        }
        drop(progress_tx);
        drop(done_tx);

        let mut summary = RunSummary::default();
        while !pending.is_empty() {
            let Ok(message) = done_rx.recv() else {
                let lost = pending.into_iter().collect::<Vec<_>>().join(", ");
                return Err(PipelineError::Lost(lost));
            };
            pending.remove(&message.disk_id);

            match message.outcome {
                Ok(report) => {
                    log::info!(
                        "[{}] Done: {} hashed ({}), {} carried forward, {} pruned, {} unreadable",
                        report.disk_id,
                        report.hashed_files,
                        ByteSize::b(report.hashed_bytes),
                        report.carried_forward,
                        report.pruned,
                        report.failed_files
                    );
                    summary.reports.push(report);
                }
                Err(e) if e.is_fatal() => {
                    log::debug!(
                        "Abandoning {} unfinished disk thread(s) after a fatal error",
                        pending.len()
                    );
                    return Err(e.into());
                }
                Err(e) => {
                    log::error!("[{}] Disk stopped early; other disks continue", e.disk_id());
                    summary.failures.push(e);
                }
            }
        }

        for handle in worker_handles {
            if handle.join().is_err() {
                log::warn!("A disk worker thread panicked after reporting completion");
            }
        }
        if aggregator_handle.join().is_err() {
            log::warn!("Progress thread panicked");
        }

        log::info!("Merging fingerprint files in {}", self.config.out_dir.display());
        summary.merge = merge::merge(&self.config.out_dir)?;
        for group in &summary.merge.groups {
            log::info!(
                "Group {}: {} lines from {}",
                group.group,
                group.lines,
                group.disks.join(", ")
            );
        }

        Ok(summary)
    }
}

fn spawn<F>(name: String, body: F) -> Result<JoinHandle<()>, PipelineError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|source| PipelineError::Spawn { name, source })
}
