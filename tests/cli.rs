//! End-to-end tests for the `chunk-tally` binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const THREE_LINES: &str = "dog\t2000\t5\t2\ncat\t2001\t3\t1\ndog\t2002\t7\t4\n";

fn write_input(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("words.tsv");
    fs::write(&path, contents).unwrap();
    path
}

fn chunk_tally() -> Command {
    Command::cargo_bin("chunk-tally").unwrap()
}

#[test]
fn test_reports_totals_for_target_key() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, THREE_LINES);

    chunk_tally()
        .arg(&input)
        .args(["--key", "dog", "-j", "1", "--interval", "0.01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reading file took"))
        .stdout(predicate::str::contains("Progress: "))
        .stdout(predicate::str::contains("Processing data took"))
        .stdout(predicate::str::contains("Reducing results took"))
        .stdout(predicate::str::contains("Total words: 2\n"))
        .stdout(predicate::str::contains("Total count for word dog: 12\n"))
        .stdout(predicate::str::contains("Total time took"));
}

#[test]
fn test_report_lines_are_ordered() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, THREE_LINES);

    let output = chunk_tally()
        .arg(&input)
        .args(["-k", "cat", "-i", "0.01"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let position = |needle: &str| {
        stdout
            .find(needle)
            .unwrap_or_else(|| panic!("missing {needle:?} in {stdout}"))
    };
    let phases = [
        position("Reading file took"),
        position("Progress: 0/"),
        position("Processing data took"),
        position("Reducing results took"),
        position("Total words: 2"),
        position("Total count for word cat: 3"),
        position("Printing results took"),
        position("Total time took"),
    ];
    assert!(phases.windows(2).all(|w| w[0] < w[1]), "{stdout}");
}

#[test]
fn test_empty_file_reports_zero() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "");

    chunk_tally()
        .arg(&input)
        .args(["-k", "dog"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total words: 0\n"))
        .stdout(predicate::str::contains("Total count for word dog: 0\n"));
}

#[test]
fn test_malformed_line_fails_without_summary() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "dog\t2000\t5\t2\ncat\t2001\t3\n");

    chunk_tally()
        .arg(&input)
        .args(["-k", "dog"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Total words").not())
        .stderr(predicate::str::contains("malformed line at byte 13"));
}

#[test]
fn test_missing_file_fails() {
    let dir = TempDir::new().unwrap();

    chunk_tally()
        .arg(dir.path().join("absent.tsv"))
        .args(["-k", "dog"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot plan chunks"));
}

#[test]
fn test_key_is_required() {
    chunk_tally()
        .arg("words.tsv")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--key"));
}

#[test]
fn test_total_past_u64_max_fails_without_summary() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "dog\t1\t18446744073709551615\t0\ndog\t2\t1\t0\n");

    chunk_tally()
        .arg(&input)
        .args(["-k", "dog", "-j", "1"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Total count for word").not())
        .stderr(predicate::str::contains("does not fit in 64 bits"));
}
