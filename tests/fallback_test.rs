mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let amounts = common::amounts_file(&["1, 100.00"]);

    let mut cmd = Command::new(cargo_bin!("paydesk"));
    cmd.arg("generate")
        .arg("--period")
        .arg("2024-03")
        .arg(amounts.path())
        .arg("--db-path")
        .arg("some_db");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains(
            "persistent storage requested via --db-path, but the 'storage-rocksdb' feature is \
             not enabled; falling back to in-memory storage",
        ))
        .stdout(predicate::str::contains("1,2024-03,100.00"));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let amounts = common::amounts_file(&["1, 100.00"]);
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut cmd = Command::new(cargo_bin!("paydesk"));
    cmd.arg("generate")
        .arg("--period")
        .arg("2024-03")
        .arg(amounts.path())
        .arg("--db-path")
        .arg(&db_path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("falling back").not());
}
