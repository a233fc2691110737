use diskprint::disk::{Disk, MARKER_FILE};
use diskprint::filter::FilterSet;
use diskprint::pipeline::{Pipeline, PipelineConfig};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use unicode_normalization::UnicodeNormalization;

const MD5_ABC: &str = "900150983cd24fb0d6963f7d28e17f72";

fn run(disk: &Path, out: &Path) -> diskprint::pipeline::RunSummary {
    Pipeline::new(
        PipelineConfig {
            out_dir: out.to_path_buf(),
            chunk_size: 4096,
            progress_interval: Duration::from_millis(5),
        },
        FilterSet::parse("-^disk$\n+.*\n").unwrap(),
    )
    .run(vec![Disk::new(0, "A1", disk)])
    .unwrap()
}

fn setup() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let disk = dir.path().join("disk");
    let out = dir.path().join("out");
    fs::create_dir_all(&disk).unwrap();
    fs::write(disk.join(MARKER_FILE), "A1").unwrap();
    (dir, disk, out)
}

#[test]
fn test_paths_with_spaces_and_quotes() {
    let (_dir, disk, out) = setup();
    let name = if cfg!(windows) {
        "my file.txt"
    } else {
        "my \"quoted\" file.txt"
    };
    fs::create_dir_all(disk.join("sub dir")).unwrap();
    fs::write(disk.join("sub dir").join(name), "abc").unwrap();

    run(&disk, &out);

    assert_eq!(
        fs::read_to_string(out.join("A1")).unwrap(),
        format!("sub dir/{name}:{MD5_ABC}\n")
    );
}

#[test]
fn test_nfd_name_is_recorded_as_nfc() {
    let (_dir, disk, out) = setup();
    let nfd: String = "café.txt".nfd().collect();
    fs::write(disk.join(&nfd), "abc").unwrap();

    run(&disk, &out);

    assert_eq!(
        fs::read_to_string(out.join("A1")).unwrap(),
        format!("café.txt:{MD5_ABC}\n")
    );
}

#[test]
fn test_nfd_record_matches_nfc_file() {
    let (_dir, disk, out) = setup();
    fs::write(disk.join("café.txt"), "abc").unwrap();
    fs::create_dir_all(&out).unwrap();
    let nfd: String = "café.txt".nfd().collect();
    fs::write(out.join("A1"), format!("{nfd}:{MD5_ABC}\n")).unwrap();

    let summary = run(&disk, &out);

    assert_eq!(summary.hashed_files(), 0);
    assert_eq!(summary.reports[0].carried_forward, 1);
}

#[test]
fn test_deeply_nested_file() {
    let (_dir, disk, out) = setup();
    let mut path = disk.clone();
    for i in 0..12 {
        path = path.join(format!("level{i}"));
    }
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join("deep.bin"), "abc").unwrap();

    run(&disk, &out);

    let contents = fs::read_to_string(out.join("A1")).unwrap();
    assert!(contents.starts_with("level0/level1/level2/"));
    assert!(contents.ends_with(&format!("level11/deep.bin:{MD5_ABC}\n")));
}

#[cfg(unix)]
#[test]
fn test_colon_and_newline_names_are_skipped() {
    let (_dir, disk, out) = setup();
    fs::write(disk.join("a:b"), "abc").unwrap();
    fs::write(disk.join("line\nbreak"), "abc").unwrap();
    fs::write(disk.join("plain"), "abc").unwrap();

    run(&disk, &out);

    assert_eq!(
        fs::read_to_string(out.join("A1")).unwrap(),
        format!("plain:{MD5_ABC}\n")
    );
    // The record file must still load on the next run.
    let summary = run(&disk, &out);
    assert_eq!(summary.reports[0].carried_forward, 1);
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_not_followed() {
    let (dir, disk, out) = setup();
    let outside = dir.path().join("outside");
    fs::create_dir_all(&outside).unwrap();
    fs::write(outside.join("secret"), "abc").unwrap();
    std::os::unix::fs::symlink(&outside, disk.join("link")).unwrap();
    std::os::unix::fs::symlink(outside.join("secret"), disk.join("file-link")).unwrap();

    let summary = run(&disk, &out);

    assert_eq!(summary.hashed_files(), 0);
    assert_eq!(fs::read_to_string(out.join("A1")).unwrap(), "");
}

#[test]
fn test_hidden_files_are_included() {
    let (_dir, disk, out) = setup();
    fs::create_dir_all(disk.join(".hidden")).unwrap();
    fs::write(disk.join(".hidden").join(".dotfile"), "abc").unwrap();

    run(&disk, &out);

    assert_eq!(
        fs::read_to_string(out.join("A1")).unwrap(),
        format!(".hidden/.dotfile:{MD5_ABC}\n")
    );
}
