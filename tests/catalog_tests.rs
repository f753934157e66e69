//! Loading the catalog from a directory of module assets

mod common;

use std::fs;
use std::path::Path;

use common::init_logging;
use flavorize::{Catalog, Error};

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_load_dir_reads_every_module() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "library.json",
        r#"{
            "release": [
                {"name": "HOST", "type": "String", "value": "api.example.com"},
                {"name": "RETRIES", "type": "int", "value": 3}
            ],
            "debug": [
                {"name": "HOST", "type": "String", "value": "staging.example.com"}
            ]
        }"#,
    );
    write(
        dir.path(),
        "app.json",
        r#"{"release": [{"name": "TARGET_APPLICATION_ID", "type": "String", "value": "`BuildConfig#library#TARGET_APPLICATION_ID`"}]}"#,
    );

    let catalog = Catalog::load_dir(dir.path(), "release").unwrap();
    assert_eq!(catalog.len(), 2);

    let host = catalog.resolve("`BuildConfig#library#api.example.com`").unwrap();
    assert_eq!((host.module_id.as_str(), host.key.as_str()), ("library", "HOST"));

    // A value that is already a token is bound as written.
    let id = catalog.resolve("`BuildConfig#library#TARGET_APPLICATION_ID`").unwrap();
    assert_eq!((id.module_id.as_str(), id.key.as_str()), ("app", "TARGET_APPLICATION_ID"));

    let debug = Catalog::load_dir(dir.path(), "debug").unwrap();
    assert_eq!(debug.len(), 1);
    assert!(debug.resolve("`BuildConfig#library#staging.example.com`").is_some());
}

#[test]
fn test_duplicate_tokens_resolve_to_the_first_file() {
    let dir = tempfile::tempdir().unwrap();
    let shared = "`BuildConfig#core#value`";
    write(dir.path(), "b_module.json", &format!(r#"{{"release": [{{"name": "FROM_B", "type": "String", "value": "{}"}}]}}"#, shared));
    write(dir.path(), "a_module.json", &format!(r#"{{"release": [{{"name": "FROM_A", "type": "String", "value": "{}"}}]}}"#, shared));

    let catalog = Catalog::load_dir(dir.path(), "release").unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.resolve(shared).unwrap().key, "FROM_A");
}

#[test]
fn test_malformed_json_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "broken.json", r#"{"release": [ {"name": "#);

    match Catalog::load_dir(dir.path(), "release") {
        Err(Error::Catalog { path, .. }) => assert!(path.ends_with("broken.json")),
        other => panic!("expected a catalog error, got {:?}", other.map(|c| c.len())),
    }
}

#[test]
fn test_other_files_and_bad_entries_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "notes.txt", "not a catalog");
    write(
        dir.path(),
        "library.json",
        r#"{"release": [
            {"type": "String", "value": "no name"},
            {"name": "NUMBER", "type": "String", "value": 42},
            "not an object",
            {"name": "HOST", "type": "String", "value": "api.example.com"}
        ]}"#,
    );
    write(dir.path(), "other.json", r#"["not", "an", "object"]"#);

    let catalog = Catalog::load_dir(dir.path(), "release").unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.iter().next().unwrap().key, "HOST");
}

#[test]
fn test_missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(Catalog::load_dir(&dir.path().join("absent"), "release"), Err(Error::Catalog { .. })));
}
