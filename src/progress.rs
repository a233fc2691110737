//! Live progress aggregation across disk workers.
//!
//! Workers send absolute [`ProgressSnapshot`]s over a channel; the
//! [`ProgressAggregator`] keeps the latest one per disk and, at most once per
//! interval, turns them into a status line:
//!
//! ```text
//! A1 [   12/  340]  41.07%   0:03:12 photos/2019/IMG_0042.CR2
//! A1  41.07% / B2 100.00% / C1   3.50% -   1:20:05
//! ```
//!
//! The first form is used while a single disk is active, the second when
//! several are. Lines are emitted through `log` under the `progress` target,
//! so they reach both the console and the persistent log file.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

/// Placeholder shown while no remaining-time estimate is possible.
pub const UNKNOWN_REMAINING: &str = "  -:--:--";

/// Log target used for status lines.
pub const PROGRESS_TARGET: &str = "progress";

/// Absolute counter state of one disk at one moment.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Slot index of the disk
    pub disk_index: usize,
    /// Disk id for display
    pub disk_id: String,
    /// Files queued for hashing
    pub files_total: u64,
    /// Files hashed or skipped so far
    pub files_processed: u64,
    /// Bytes queued for hashing
    pub bytes_total: u64,
    /// Bytes consumed so far
    pub bytes_processed: u64,
    /// File currently being hashed
    pub current_file: Option<String>,
    /// When hashing of this disk started
    pub started: Instant,
    /// Set on the final snapshot of a disk
    pub finished: bool,
}

impl ProgressSnapshot {
    /// Seed snapshot with totals and zero progress.
    #[must_use]
    pub fn seeded(
        disk_index: usize,
        disk_id: &str,
        files_total: u64,
        bytes_total: u64,
        started: Instant,
    ) -> Self {
        Self {
            disk_index,
            disk_id: disk_id.to_string(),
            files_total,
            files_processed: 0,
            bytes_total,
            bytes_processed: 0,
            current_file: None,
            started,
            finished: false,
        }
    }

    /// Fraction of bytes done, in `0.0..=1.0`. Nothing to do counts as done.
    #[must_use]
    pub fn completion(&self) -> f64 {
        if self.bytes_total == 0 {
            return 1.0;
        }
        (self.bytes_processed as f64 / self.bytes_total as f64).min(1.0)
    }

    /// Remaining time projected from the byte completion ratio.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        remaining_time(now.saturating_duration_since(self.started), self.completion())
    }
}

/// Project remaining time as `elapsed * (1 / rate - 1)`.
///
/// Returns `None` while nothing has been processed, or when the projection
/// does not fit in a `Duration`.
#[must_use]
pub fn remaining_time(elapsed: Duration, rate: f64) -> Option<Duration> {
    if rate <= 0.0 || !rate.is_finite() {
        return None;
    }
    let seconds = elapsed.as_secs_f64() * (1.0 / rate.min(1.0) - 1.0);
    Duration::try_from_secs_f64(seconds.max(0.0)).ok()
}

/// Render a remaining-time estimate as `hhh:mm:ss`.
#[must_use]
pub fn format_remaining(remaining: Option<Duration>) -> String {
    match remaining {
        None => UNKNOWN_REMAINING.to_string(),
        Some(duration) => {
            let total = duration.as_secs();
            format!(
                "{:3}:{:02}:{:02}",
                total / 3600,
                (total / 60) % 60,
                total % 60
            )
        }
    }
}

/// Single consumer of all progress snapshots.
#[derive(Debug)]
pub struct ProgressAggregator {
    slots: Vec<Option<ProgressSnapshot>>,
    interval: Duration,
    last_print: Instant,
}

impl ProgressAggregator {
    /// Create an aggregator with one slot per disk.
    #[must_use]
    pub fn new(disk_count: usize, interval: Duration) -> Self {
        Self {
            slots: vec![None; disk_count],
            interval,
            last_print: Instant::now(),
        }
    }

    /// Replace the disk's slot with `snapshot`.
    pub fn update(&mut self, snapshot: ProgressSnapshot) {
        match self.slots.get_mut(snapshot.disk_index) {
            Some(slot) => *slot = Some(snapshot),
            None => log::warn!(
                "Ignoring progress for unknown disk slot {} ({})",
                snapshot.disk_index,
                snapshot.disk_id
            ),
        }
    }

    /// Latest snapshot of a disk, if any arrived.
    #[must_use]
    pub fn slot(&self, disk_index: usize) -> Option<&ProgressSnapshot> {
        self.slots.get(disk_index).and_then(Option::as_ref)
    }

    /// Build the status line for `now`, or `None` before any snapshot.
    #[must_use]
    pub fn render(&self, now: Instant) -> Option<String> {
        let seeded: Vec<&ProgressSnapshot> = self.slots.iter().flatten().collect();
        if seeded.is_empty() {
            return None;
        }

        if self.slots.len() == 1 {
            return Some(detail_line(seeded[0], now));
        }

        let mut active = seeded.iter().filter(|s| !s.finished);
        if let (Some(only), None) = (active.next(), active.next()) {
            return Some(detail_line(only, now));
        }

        Some(summary_line(&seeded, now))
    }

    /// Consume snapshots until every sender is gone, logging status lines.
    pub fn run(self, rx: &Receiver<ProgressSnapshot>) {
        self.run_with(rx, |line| log::info!(target: PROGRESS_TARGET, "{line}"));
    }

    /// Like [`run`](Self::run) but hands each line to `emit`.
    ///
    /// A final line is always emitted once the channel disconnects.
    pub fn run_with<F>(mut self, rx: &Receiver<ProgressSnapshot>, mut emit: F)
    where
        F: FnMut(&str),
    {
        loop {
            let wait = self.interval.saturating_sub(self.last_print.elapsed());
            match rx.recv_timeout(wait) {
                Ok(snapshot) => self.update(snapshot),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if let Some(line) = self.render(Instant::now()) {
                        emit(&line);
                    }
                    return;
                }
            }

            if self.last_print.elapsed() >= self.interval {
                if let Some(line) = self.render(Instant::now()) {
                    emit(&line);
                }
                self.last_print = Instant::now();
            }
        }
    }
}

fn detail_line(snapshot: &ProgressSnapshot, now: Instant) -> String {
    let mut line = format!(
        "{} [{:5}/{:5}] {:6.2}% {}",
        snapshot.disk_id,
        snapshot.files_processed,
        snapshot.files_total,
        snapshot.completion() * 100.0,
        format_remaining(snapshot.remaining(now)),
    );
    if let Some(current) = &snapshot.current_file {
        let _ = write!(line, " {current}");
    }
    line
}

fn summary_line(snapshots: &[&ProgressSnapshot], now: Instant) -> String {
    let per_disk = snapshots
        .iter()
        .map(|s| format!("{} {:6.2}%", s.disk_id, s.completion() * 100.0))
        .collect::<Vec<_>>()
        .join(" / ");

    let slowest = snapshots.iter().filter_map(|s| s.remaining(now)).max();
    format!("{per_disk} - {}", format_remaining(slowest))
}
