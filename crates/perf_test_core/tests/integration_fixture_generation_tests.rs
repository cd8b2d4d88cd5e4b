mod support;

use std::fs;

use perf_test_core::error::FixtureError;
use perf_test_core::fixtures::{generate_dataset, write_dataset, ReferenceData, YEAR_RANGE};
use perf_test_core::task::load_dataset;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use support::{reference_data, write_file};

fn plate_groups(plate: &str) -> (usize, usize, usize) {
    let groups: Vec<&str> = plate.split('-').collect();
    assert_eq!(groups.len(), 3, "plate {plate} should have three groups");
    assert!(groups[0].chars().all(|c| c.is_ascii_uppercase()));
    assert!(groups[1].chars().all(|c| c.is_ascii_digit()));
    assert!(groups[2].chars().all(|c| c.is_ascii_uppercase()));
    (groups[0].len(), groups[1].len(), groups[2].len())
}

#[test]
fn written_fixture_reloads_identically() {
    let dir = TempDir::new().expect("temp dir should be created");
    let dataset = generate_dataset(&mut StdRng::seed_from_u64(1), &reference_data(), 300)
        .expect("dataset should generate");

    let path = write_dataset(&dataset, dir.path()).expect("dataset should be written");
    let reloaded = load_dataset(&path).expect("dataset should reload");
    assert_eq!(reloaded, dataset);
}

#[test]
fn fixture_uses_four_space_indentation_and_record_field_order() {
    let dir = TempDir::new().expect("temp dir should be created");
    let dataset = generate_dataset(&mut StdRng::seed_from_u64(2), &reference_data(), 1)
        .expect("dataset should generate");

    let path = write_dataset(&dataset, dir.path()).expect("dataset should be written");
    let text = fs::read_to_string(path).expect("fixture should be readable");
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "{");
    assert!(lines[1].starts_with("    \""));
    assert!(lines[2].starts_with("        \"make\": "));
    assert!(lines[3].starts_with("        \"model\": "));
    assert!(lines[4].starts_with("        \"license_plate\": "));
    assert!(lines[5].starts_with("        \"origin\": {"));
    assert!(!text.contains("make_model_hash"));
}

#[test]
fn every_generated_record_satisfies_the_data_contract() {
    let reference = reference_data();
    let dataset = generate_dataset(&mut StdRng::seed_from_u64(77), &reference, 5_000)
        .expect("dataset should generate");

    for entry in dataset.entries() {
        let (first, digits, last) = plate_groups(&entry.record.license_plate);
        assert!((1..=2).contains(&first));
        assert_eq!(digits, 3);
        assert_eq!(first + last, 3);
        assert!(YEAR_RANGE.contains(&entry.record.origin.year));
        assert!(reference.countries().contains(&entry.record.origin.country));
    }
}

#[test]
fn missing_or_empty_reference_lists_are_fatal() {
    let dir = TempDir::new().expect("temp dir should be created");
    let countries = write_file(dir.path(), "countries.json", r#"["Germany"]"#);
    let empty = write_file(dir.path(), "empty.json", "[]");
    let broken = write_file(dir.path(), "broken.json", "{not json");

    let error = ReferenceData::load(&dir.path().join("absent.json"), &countries)
        .expect_err("missing file should fail");
    assert!(matches!(error, FixtureError::ReferenceUnreadable { .. }));

    let error = ReferenceData::load(&broken, &countries).expect_err("broken file should fail");
    assert!(matches!(error, FixtureError::ReferenceMalformed { .. }));

    let error = ReferenceData::load(&empty, &countries).expect_err("empty list should fail");
    assert!(matches!(error, FixtureError::EmptyReference("make_models")));
}
