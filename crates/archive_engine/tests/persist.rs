use std::fs;

use archive_engine::{ensure_output_dir, AtomicFileWriter, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_issue_directories() {
    let temp = TempDir::new().unwrap();
    let issue_dir = temp.path().join("1950").join("January");
    ensure_output_dir(&issue_dir).unwrap();
    assert!(issue_dir.is_dir());
}

#[test]
fn rejects_a_file_where_a_directory_is_expected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("taken");
    fs::write(&file_path, "x").unwrap();

    let err = ensure_output_dir(&file_path).unwrap_err();
    assert!(matches!(err, PersistError::OutputDir(_)));
}

#[test]
fn rewrite_replaces_previous_content() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path());

    let first = writer.write("January_1950_text.txt", "old").unwrap();
    let second = writer.write("January_1950_text.txt", "new").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "new");

    let leftovers = fs::read_dir(temp.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn failed_write_leaves_no_partial_file() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not_a_dir");
    fs::write(&blocker, "x").unwrap();

    let writer = AtomicFileWriter::new(blocker.clone());
    assert!(writer.write_bytes("page_001_deadbeef.jpg", &[1, 2, 3]).is_err());
    assert_eq!(fs::read_to_string(&blocker).unwrap(), "x");
}
