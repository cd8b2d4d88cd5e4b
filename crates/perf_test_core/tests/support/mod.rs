#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use perf_test_core::fixtures::ReferenceData;

pub const SCENARIO_DATASET: &str = r#"{
    "id1": {"make":"Ford","model":"Focus","license_plate":"AT-001-B","origin":{"country":"DE","year":1999}},
    "id2": {"make":"VW","model":"Golf","license_plate":"A-924-VW","origin":{"country":"FR","year":2005}}
}"#;

pub fn workspace_fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures")
}

pub fn reference_data() -> ReferenceData {
    let dir = workspace_fixtures_dir();
    ReferenceData::load(&dir.join("make_models.json"), &dir.join("countries.json"))
        .expect("workspace reference lists should load")
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("fixture file should be writable");
    path
}
