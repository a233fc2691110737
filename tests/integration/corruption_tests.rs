use diskprint::disk::{Disk, MARKER_FILE};
use diskprint::filter::FilterSet;
use diskprint::pipeline::{Pipeline, PipelineConfig, PipelineError};
use diskprint::records::RecordError;
use diskprint::worker::WorkerError;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

const MD5_ABC: &str = "900150983cd24fb0d6963f7d28e17f72";

fn pipeline(out: &Path) -> Pipeline {
    Pipeline::new(
        PipelineConfig {
            out_dir: out.to_path_buf(),
            chunk_size: 4096,
            progress_interval: Duration::from_millis(5),
        },
        FilterSet::parse("-^disk$\n+.*\n").unwrap(),
    )
}

fn disk_with_file(root: &Path, id: &str) -> Disk {
    fs::create_dir_all(root).unwrap();
    fs::write(root.join(MARKER_FILE), id).unwrap();
    fs::write(root.join("a"), "abc").unwrap();
    Disk::new(0, id, root)
}

fn assert_corrupt_at(err: PipelineError, expected_line: usize) {
    match err {
        PipelineError::Worker(WorkerError::Listing {
            source: RecordError::Corrupt { line, .. },
            ..
        }) => assert_eq!(line, expected_line),
        other => panic!("expected a corrupt record error, got {other}"),
    }
}

#[test]
fn test_line_with_two_separators_aborts_run() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    let corrupt = format!("a:{MD5_ABC}\nb:c:{MD5_ABC}\n");
    fs::write(out.join("A1"), &corrupt).unwrap();

    let disk = disk_with_file(&dir.path().join("disk"), "A1");
    let err = pipeline(&out).run(vec![disk]).unwrap_err();

    assert_corrupt_at(err, 2);
    assert_eq!(fs::read_to_string(out.join("A1")).unwrap(), corrupt);
    assert!(!out.join("A").exists());
}

#[test]
fn test_bad_digest_aborts_run() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("A1"), "a:not-a-digest\n").unwrap();

    let disk = disk_with_file(&dir.path().join("disk"), "A1");
    let err = pipeline(&out).run(vec![disk]).unwrap_err();

    assert_corrupt_at(err, 1);
}

#[test]
fn test_duplicate_path_aborts_run() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("A1"), format!("a:{MD5_ABC}\na:{MD5_ABC}\n")).unwrap();

    let disk = disk_with_file(&dir.path().join("disk"), "A1");
    let err = pipeline(&out).run(vec![disk]).unwrap_err();

    assert_corrupt_at(err, 2);
}

#[test]
fn test_error_message_names_file_and_line() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("A1"), "garbage\n").unwrap();

    let disk = disk_with_file(&dir.path().join("disk"), "A1");
    let err = pipeline(&out).run(vec![disk]).unwrap_err();

    let chain = format!("{:#}", anyhow::Error::new(err));
    assert!(chain.contains("A1"));
    assert!(chain.contains("line 1"));
}

#[test]
fn test_unrelated_files_in_output_dir_are_left_alone() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("notes.txt"), "not a record file").unwrap();

    let disk = disk_with_file(&dir.path().join("disk"), "A1");
    pipeline(&out).run(vec![disk]).unwrap();

    assert_eq!(
        fs::read_to_string(out.join("notes.txt")).unwrap(),
        "not a record file"
    );
    assert!(!out.join("A1.tmp").exists());
}
