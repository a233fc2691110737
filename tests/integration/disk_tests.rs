use diskprint::disk::{discover, DiskError, MARKER_FILE};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_discover_upward_from_nested_directory() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("backup");
    let nested = root.join("photos").join("2019");
    fs::create_dir_all(&nested).unwrap();
    fs::write(root.join(MARKER_FILE), "B12\n").unwrap();

    let disks = discover(&nested, &[]).unwrap();

    assert_eq!(disks.len(), 1);
    assert_eq!(disks[0].id(), "B12");
    assert_eq!(disks[0].index(), 0);
    assert_eq!(disks[0].group(), "B");
    assert!(disks[0].root().ends_with("backup"));
}

#[test]
fn test_explicit_roots_keep_argument_order() {
    let dir = tempdir().unwrap();
    let mut roots = Vec::new();
    for (name, id) in [("first", "C3"), ("second", "A1"), ("third", "C1")] {
        let root = dir.path().join(name);
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(MARKER_FILE), id).unwrap();
        roots.push(root);
    }

    let disks = discover(dir.path(), &roots).unwrap();

    let ids: Vec<_> = disks.iter().map(|d| (d.index(), d.id().to_string())).collect();
    assert_eq!(
        ids,
        vec![
            (0, "C3".to_string()),
            (1, "A1".to_string()),
            (2, "C1".to_string())
        ]
    );
}

#[test]
fn test_marker_with_trailing_text_and_crlf() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("disk");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join(MARKER_FILE), "D4 bought 2021\r\nsecond line\r\n").unwrap();

    let disks = discover(dir.path(), &[root]).unwrap();

    assert_eq!(disks[0].id(), "D4");
}

#[test]
fn test_no_marker_anywhere_is_fatal() {
    let dir = tempdir().unwrap();
    let start = dir.path().join("a").join("b");
    fs::create_dir_all(&start).unwrap();

    // A marker in an ancestor of the temp dir would be found too.
    if diskprint::disk::find_marker_root(dir.path()).is_some() {
        return;
    }

    assert!(matches!(
        discover(&start, &[]),
        Err(DiskError::MarkerNotFound(_))
    ));
}

#[test]
fn test_malformed_marker_is_fatal() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("disk");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join(MARKER_FILE), "a1\n").unwrap();

    assert!(matches!(
        discover(dir.path(), &[root]),
        Err(DiskError::InvalidMarker(_))
    ));
}

#[test]
fn test_all_invalid_roots_are_reported() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good");
    fs::create_dir_all(&good).unwrap();
    fs::write(good.join(MARKER_FILE), "A1").unwrap();
    let missing = dir.path().join("missing");
    fs::create_dir_all(&missing).unwrap();
    let twin = dir.path().join("twin");
    fs::create_dir_all(&twin).unwrap();
    fs::write(twin.join(MARKER_FILE), "A1").unwrap();

    let err = discover(dir.path(), &[good, missing, twin]).unwrap_err();

    match &err {
        DiskError::Several(errors) => {
            assert_eq!(errors.len(), 2);
            assert!(matches!(errors[0], DiskError::MissingMarker(_)));
            assert!(matches!(errors[1], DiskError::DuplicateId { .. }));
        }
        other => panic!("expected several errors, got {other}"),
    }
    assert!(err.to_string().starts_with("2 disk roots are invalid"));
}

#[test]
fn test_root_is_stored_absolute() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("vol");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join(MARKER_FILE), "E9").unwrap();

    let disks = discover(dir.path(), &[root.clone()]).unwrap();

    assert!(disks[0].root().is_absolute());
    assert_eq!(disks[0].root(), root.as_path());
}
