use crossbeam_channel::unbounded;
use diskprint::disk::{Disk, MARKER_FILE};
use diskprint::filter::FilterSet;
use diskprint::progress::{ProgressAggregator, ProgressSnapshot, UNKNOWN_REMAINING};
use diskprint::worker::{DiskWorker, WorkerState};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn worker_snapshots(files: &[(&str, usize)], chunk_size: usize) -> Vec<ProgressSnapshot> {
    let dir = tempdir().unwrap();
    let root = dir.path().join("disk");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join(MARKER_FILE), "A1").unwrap();
    for (name, len) in files {
        fs::write(root.join(name), vec![b'x'; *len]).unwrap();
    }

    let (tx, rx) = unbounded();
    let mut worker = DiskWorker::new(
        Arc::new(Disk::new(0, "A1", &root)),
        Arc::new(FilterSet::parse("-^disk$\n+.*\n").unwrap()),
        dir.path().join("out"),
        chunk_size,
        tx,
    );
    worker.run().unwrap();
    assert_eq!(worker.state(), WorkerState::Done);
    drop(worker);

    rx.iter().collect()
}

#[test]
fn test_worker_counters_never_decrease() {
    let snapshots = worker_snapshots(&[("a", 10), ("b", 0), ("c", 7)], 3);

    for pair in snapshots.windows(2) {
        assert!(pair[1].files_processed >= pair[0].files_processed);
        assert!(pair[1].bytes_processed >= pair[0].bytes_processed);
    }
    for snapshot in &snapshots {
        assert!(snapshot.bytes_processed <= snapshot.bytes_total);
        assert!(snapshot.files_processed <= snapshot.files_total);
    }
}

#[test]
fn test_worker_first_and_last_snapshots() {
    let snapshots = worker_snapshots(&[("a", 10), ("b", 5)], 4);

    let first = snapshots.first().unwrap();
    assert_eq!(first.files_total, 2);
    assert_eq!(first.bytes_total, 15);
    assert_eq!(first.files_processed, 0);
    assert!(!first.finished);

    let last = snapshots.last().unwrap();
    assert!(last.finished);
    assert_eq!(last.files_processed, 2);
    assert_eq!(last.bytes_processed, 15);
    assert!(last.current_file.is_none());
    assert_eq!(snapshots.iter().filter(|s| s.finished).count(), 1);
}

#[test]
fn test_current_file_is_reported_while_hashing() {
    let snapshots = worker_snapshots(&[("only.bin", 9)], 2);

    assert!(snapshots
        .iter()
        .any(|s| s.current_file.as_deref() == Some("only.bin")));
}

#[test]
fn test_aggregator_emits_final_line_after_workers_finish() {
    let (tx, rx) = unbounded();
    let aggregator = ProgressAggregator::new(2, Duration::from_secs(3600));
    let handle = thread::spawn(move || {
        let mut lines = Vec::new();
        aggregator.run_with(&rx, |line| lines.push(line.to_string()));
        lines
    });

    let started = Instant::now();
    for (index, id) in [(0, "A1"), (1, "B2")] {
        let mut snapshot = ProgressSnapshot::seeded(index, id, 4, 400, started);
        snapshot.files_processed = 4;
        snapshot.bytes_processed = 400;
        snapshot.finished = true;
        tx.send(snapshot).unwrap();
    }
    drop(tx);

    let lines = handle.join().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("A1 100.00% / B2 100.00% - "));
}

#[test]
fn test_aggregator_tracks_the_one_active_disk_in_detail() {
    let mut aggregator = ProgressAggregator::new(3, Duration::from_secs(1));
    let now = Instant::now();
    assert!(aggregator.render(now).is_none());

    let mut done = ProgressSnapshot::seeded(0, "A1", 1, 10, now);
    done.finished = true;
    aggregator.update(done);
    let mut active = ProgressSnapshot::seeded(2, "C3", 10, 100, now);
    active.files_processed = 3;
    active.current_file = Some("photos/x.jpg".to_string());
    aggregator.update(active);

    let line = aggregator.render(now).unwrap();
    assert_eq!(
        line,
        format!("C3 [    3/   10]   0.00% {UNKNOWN_REMAINING} photos/x.jpg")
    );
}
