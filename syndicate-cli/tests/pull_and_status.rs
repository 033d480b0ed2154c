use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn syndicate_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("syndicate"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("RUST_LOG", "warn");
    cmd
}

fn write_feed(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("feed.json");
    fs::write(&path, body).expect("write feed");
    path
}

fn add_file_site(home: &Path, feed: &Path) {
    syndicate_cmd(home)
        .args(["site", "add", "42", "--name", "regional news", "--transport", "file"])
        .arg("--set")
        .arg(format!("source={}", feed.display()))
        .assert()
        .success()
        .stdout(contains("site 42 'regional news' registered"));
}

const ONE_POST: &str = r#"[{"remote_id": "abc", "primary_fields": {"title": "A"}}]"#;

#[test]
fn pull_creates_then_updates() {
    let home = TempDir::new().expect("home");
    let feed = write_feed(home.path(), ONE_POST);
    add_file_site(home.path(), &feed);

    syndicate_cmd(home.path())
        .args(["pull", "42"])
        .assert()
        .success()
        .stdout(contains("1 created, 0 updated, 0 failed"));

    syndicate_cmd(home.path())
        .args(["pull", "42"])
        .assert()
        .success()
        .stdout(contains("0 created, 1 updated, 0 failed"));

    syndicate_cmd(home.path())
        .args(["status", "get", "42"])
        .assert()
        .success()
        .stdout(contains("idle"));
}

#[test]
fn busy_site_refuses_pull() {
    let home = TempDir::new().expect("home");
    let feed = write_feed(home.path(), ONE_POST);
    add_file_site(home.path(), &feed);

    syndicate_cmd(home.path())
        .args(["status", "set", "42", "Pushing"])
        .assert()
        .success()
        .stdout(contains("pushing"));

    syndicate_cmd(home.path())
        .args(["pull", "42"])
        .assert()
        .failure()
        .stderr(contains("busy"));

    syndicate_cmd(home.path())
        .args(["status", "get", "42"])
        .assert()
        .success()
        .stdout(contains("pushing"));
}

#[test]
fn invalid_status_is_rejected() {
    let home = TempDir::new().expect("home");
    syndicate_cmd(home.path())
        .args(["status", "set", "42", "sleeping"])
        .assert()
        .failure();
    syndicate_cmd(home.path())
        .args(["status", "get", "42"])
        .assert()
        .success()
        .stdout(contains("unset"));
}

#[test]
fn empty_feed_fails_and_releases_site() {
    let home = TempDir::new().expect("home");
    let feed = write_feed(home.path(), "[]");
    add_file_site(home.path(), &feed);

    syndicate_cmd(home.path())
        .args(["pull", "42"])
        .assert()
        .failure()
        .stderr(contains("returned no posts"));

    syndicate_cmd(home.path())
        .args(["status", "get", "42"])
        .assert()
        .success()
        .stdout(contains("idle"));
}

#[test]
fn import_rejects_non_array_batch() {
    let home = TempDir::new().expect("home");
    let file = home.path().join("batch.json");
    fs::write(&file, r#"{"remote_id": "abc"}"#).unwrap();

    syndicate_cmd(home.path())
        .args(["import", "42"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains("invalid batch input"));

    syndicate_cmd(home.path())
        .args(["status", "get", "42"])
        .assert()
        .success()
        .stdout(contains("idle"));
}

#[test]
fn site_list_json_includes_status() {
    let home = TempDir::new().expect("home");
    let feed = write_feed(home.path(), ONE_POST);
    add_file_site(home.path(), &feed);

    let output = syndicate_cmd(home.path())
        .args(["site", "list", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(rows[0]["id"], 42);
    assert_eq!(rows[0]["transport_type"], "file");
    assert_eq!(rows[0]["status"], "unset");

    syndicate_cmd(home.path())
        .args(["site", "show", "42"])
        .assert()
        .success()
        .stdout(contains("regional news"))
        .stdout(contains("source = "));
}
