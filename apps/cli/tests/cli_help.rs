//! CLI 冒烟测试

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("eagle-cli")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("handshake"))
        .stdout(predicate::str::contains("monitor"))
        .stdout(predicate::str::contains("send"));
}

#[test]
fn test_send_requires_port() {
    Command::cargo_bin("eagle-cli")
        .unwrap()
        .args(["send", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no serial port given"));
}

#[test]
fn test_send_rejects_bad_polarity() {
    Command::cargo_bin("eagle-cli")
        .unwrap()
        .args(["--port", "/dev/eagle-does-not-exist", "send", "pol", "0", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("polarity must be 0 or 1"));
}
