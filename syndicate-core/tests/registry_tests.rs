//! Site registry error-message, atomic-write-safety, and status parsing tests.
//! Storage: ~/.syndicate/sites/<site_id>.yaml

use std::collections::BTreeMap;
use std::fs;

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;
use syndicate_core::{
    registry, RegistryError, SiteConfigStore, SiteId, SiteRegistry, SiteStatus, StatusParseError,
    TRANSPORT_TYPE_KEY,
};

fn site() -> SiteId {
    SiteId(42)
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_site_returns_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = registry::load_site_at(home.path(), site()).unwrap_err();
    assert!(matches!(err, RegistryError::SiteNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("site 42 is not registered"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".syndicate").join("sites");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("42.yaml"), b": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = registry::load_site_at(home.path(), site()).unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("42.yaml"), "must contain file path, got: {err}");
}

#[test]
fn list_fails_on_corrupt_entry() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".syndicate/sites").create_dir_all().expect("mkdir");
    home.child(".syndicate/sites/7.yaml")
        .write_str("- this is a list, not a mapping\n")
        .expect("write");

    let err = registry::list_sites_at(home.path()).unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_cleans_up_tmp_file_and_writes_yaml() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::add_site_at(
        home.path(),
        site(),
        "regional news",
        Some("rss".to_string()),
        BTreeMap::new(),
    )
    .expect("add");

    home.child(".syndicate/sites/42.yaml.tmp")
        .assert(predicate::path::missing());
    home.child(".syndicate/sites/42.yaml")
        .assert(predicate::str::contains("transport_type: rss"));
}

#[cfg(unix)]
#[test]
fn site_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::add_site_at(home.path(), site(), "x", None, BTreeMap::new()).expect("add");
    let path = registry::site_path_at(home.path(), site());
    let mode = fs::metadata(path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}

// ---------------------------------------------------------------------------
// 3. Config lookup
// ---------------------------------------------------------------------------

#[test]
fn site_without_transport_reports_none() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::add_site_at(home.path(), site(), "x", None, BTreeMap::new()).expect("add");
    let store = SiteRegistry::at(home.path());
    assert_eq!(store.get_config(site(), TRANSPORT_TYPE_KEY).unwrap(), None);
    assert!(store.settings(site()).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// 4. Status slugs
// ---------------------------------------------------------------------------

#[rstest]
#[case("idle", SiteStatus::Idle)]
#[case("Pulling", SiteStatus::Pulling)]
#[case(" PUSHING ", SiteStatus::Pushing)]
#[case("processing\n", SiteStatus::Processing)]
fn status_slugs_parse(#[case] raw: &str, #[case] expected: SiteStatus) {
    assert_eq!(raw.parse::<SiteStatus>(), Ok(expected));
}

#[rstest]
#[case("", StatusParseError::Empty)]
#[case("--", StatusParseError::Empty)]
#[case("in progress", StatusParseError::Unknown("in-progress".to_string()))]
fn status_slugs_reject(#[case] raw: &str, #[case] expected: StatusParseError) {
    assert_eq!(raw.parse::<SiteStatus>(), Err(expected));
}
