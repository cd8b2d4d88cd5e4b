//! The benchmark task: load, filter, augment, sort, serialize, hash.
//!
//! Every runtime implementation must produce the same bytes for the same
//! dataset and [`TaskRules`]; only the elapsed time may differ.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, Serializer};
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::BenchmarkConfig;
use crate::contract::{Dataset, HashCase, JsonSeparators, PlateParts, TaskRules, VehicleRecord};
use crate::error::BenchmarkError;
use crate::report::BenchmarkReport;

/// Output of a single invocation, with the report line and phase timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkRun {
    pub report: BenchmarkReport,
    pub load_ms: u64,
    pub process_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedDataset {
    pub records: Vec<VehicleRecord>,
    pub encoded: Vec<u8>,
    pub result_hash: String,
}

/// Runs one complete invocation. The dataset is loaded here and dropped on
/// return; nothing is cached between calls.
pub fn run_benchmark(config: &BenchmarkConfig) -> Result<BenchmarkRun, BenchmarkError> {
    let started_at = Instant::now();
    let dataset = load_dataset(&config.dataset_path())?;
    let load_ms = millis(started_at.elapsed());
    debug!(records = dataset.len(), load_ms, "dataset loaded");

    let processing_started_at = Instant::now();
    let processed = process_dataset(&dataset, &config.rules)?;
    let process_ms = millis(processing_started_at.elapsed());

    let report = BenchmarkReport {
        filtered_count: processed.records.len(),
        source_count: dataset.len(),
        result_hash: processed.result_hash,
        duration_ms: millis(started_at.elapsed()),
    };

    Ok(BenchmarkRun {
        report,
        load_ms,
        process_ms,
    })
}

pub fn load_dataset(path: &Path) -> Result<Dataset, BenchmarkError> {
    let bytes = fs::read(path).map_err(|source| BenchmarkError::DatasetUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| BenchmarkError::DatasetMalformed {
        path: path.to_path_buf(),
        source,
    })
}

pub fn process_dataset(
    dataset: &Dataset,
    rules: &TaskRules,
) -> Result<ProcessedDataset, BenchmarkError> {
    let mut records = filter_and_augment(dataset, rules)?;
    sort_by_plate(&mut records);
    let encoded = encode_records(&records, rules.separators)?;
    let result_hash = hex_digest(&encoded, rules.hash_case);
    Ok(ProcessedDataset {
        records,
        encoded,
        result_hash,
    })
}

/// Keeps the records whose plate matches the predicate and attaches their
/// `make_model_hash`. Any unsplittable plate fails the whole dataset, even
/// when it belongs to a record that would not have matched.
pub fn filter_and_augment(
    dataset: &Dataset,
    rules: &TaskRules,
) -> Result<Vec<VehicleRecord>, BenchmarkError> {
    let mut matches = Vec::new();
    for entry in dataset.entries() {
        let plate = &entry.record.license_plate;
        let parts = PlateParts::split(plate).ok_or_else(|| BenchmarkError::MalformedPlate {
            id: entry.id.clone(),
            plate: plate.clone(),
        })?;
        if !rules.predicate.matches(&parts) {
            continue;
        }

        let mut record = entry.record.clone();
        record.make_model_hash = Some(make_model_hash(
            &record.make,
            &record.model,
            rules.hash_case,
        ));
        matches.push(record);
    }
    Ok(matches)
}

pub fn make_model_hash(make: &str, model: &str, case: HashCase) -> String {
    let mut hasher = Sha256::new();
    hasher.update(make.as_bytes());
    hasher.update(model.as_bytes());
    format_digest(&hasher.finalize(), case)
}

/// Stable: records with equal plates keep their dataset order.
pub fn sort_by_plate(records: &mut [VehicleRecord]) {
    records.sort_by(|left, right| left.license_plate.cmp(&right.license_plate));
}

pub fn encode_records(
    records: &[VehicleRecord],
    separators: JsonSeparators,
) -> Result<Vec<u8>, BenchmarkError> {
    let mut buffer = Vec::with_capacity(records.len() * 192);
    match separators {
        JsonSeparators::Compact => write_with(&mut buffer, CompactFormatter, records),
        JsonSeparators::Spaced => write_with(&mut buffer, SpacedFormatter, records),
    }
    .map_err(BenchmarkError::Encoding)?;
    Ok(buffer)
}

pub fn hex_digest(bytes: &[u8], case: HashCase) -> String {
    format_digest(&Sha256::digest(bytes), case)
}

fn format_digest(digest: &Output<Sha256>, case: HashCase) -> String {
    match case {
        HashCase::Upper => format!("{digest:X}"),
        HashCase::Lower => format!("{digest:x}"),
    }
}

fn write_with<F: Formatter>(
    buffer: &mut Vec<u8>,
    formatter: F,
    records: &[VehicleRecord],
) -> Result<(), serde_json::Error> {
    let mut serializer = Serializer::with_formatter(buffer, formatter);
    records.serialize(&mut serializer)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// `", "` between items and `": "` after keys, with no newlines.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

#[cfg(test)]
mod tests {
    use crate::contract::{DatasetEntry, Origin, PlatePredicate};

    use super::*;

    const FORD_FOCUS_HASH: &str =
        "0AA64F0B55B75C8DB843FA1B69CD48A68821FFD24A7A43320B756670F2C4CFEE";

    fn record(make: &str, model: &str, plate: &str) -> VehicleRecord {
        VehicleRecord {
            make: make.to_string(),
            model: model.to_string(),
            license_plate: plate.to_string(),
            origin: Origin {
                country: "DE".to_string(),
                year: 1999,
            },
            make_model_hash: None,
        }
    }

    fn dataset(records: Vec<(&str, VehicleRecord)>) -> Dataset {
        Dataset::from_entries(
            records
                .into_iter()
                .map(|(id, record)| DatasetEntry {
                    id: id.to_string(),
                    record,
                })
                .collect(),
        )
    }

    #[test]
    fn make_model_hash_is_uppercase_sha256_of_concatenation() {
        assert_eq!(
            make_model_hash("Ford", "Focus", HashCase::Upper),
            FORD_FOCUS_HASH
        );
        assert_eq!(
            make_model_hash("Ford", "Focus", HashCase::Lower),
            FORD_FOCUS_HASH.to_lowercase()
        );
    }

    #[test]
    fn hex_digest_matches_known_vector() {
        assert_eq!(
            hex_digest(b"abc", HashCase::Lower),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hex_digest(b"abc", HashCase::Upper),
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
        );
    }

    #[test]
    fn filters_with_and_predicate_and_attaches_hash() {
        let data = dataset(vec![
            ("id1", record("Ford", "Focus", "AT-001-B")),
            ("id2", record("VW", "Golf", "A-924-VW")),
        ]);

        let filtered =
            filter_and_augment(&data, &TaskRules::default()).expect("filter should pass");

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].license_plate, "AT-001-B");
        assert_eq!(
            filtered[0].make_model_hash.as_deref(),
            Some(FORD_FOCUS_HASH)
        );
        assert!(data.entries().iter().all(|e| e.record.make_model_hash.is_none()));
    }

    #[test]
    fn or_predicate_keeps_more_records() {
        let data = dataset(vec![
            ("id1", record("Ford", "Focus", "AT-001-B")),
            ("id2", record("VW", "Golf", "A-924-VW")),
            ("id3", record("Opel", "Astra", "BC-123-D")),
        ]);
        let rules = TaskRules {
            predicate: PlatePredicate::Any,
            ..TaskRules::default()
        };

        let filtered = filter_and_augment(&data, &rules).expect("filter should pass");
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn malformed_plate_fails_even_when_it_would_not_match() {
        let data = dataset(vec![
            ("ok", record("Ford", "Focus", "AT-001-B")),
            ("bad", record("VW", "Golf", "ZZ999Z")),
        ]);

        let error = filter_and_augment(&data, &TaskRules::default())
            .expect_err("malformed plate should fail");
        assert_eq!(
            error.to_string(),
            "vehicle 'bad' has malformed license plate 'ZZ999Z'"
        );
    }

    #[test]
    fn sort_is_stable_for_equal_plates() {
        let mut records = vec![
            record("B", "1", "AB-100-C"),
            record("first", "x", "A-000-AA"),
            record("second", "y", "A-000-AA"),
        ];

        sort_by_plate(&mut records);

        let makes: Vec<&str> = records.iter().map(|r| r.make.as_str()).collect();
        assert_eq!(makes, vec!["first", "second", "B"]);

        let snapshot = records.clone();
        sort_by_plate(&mut records);
        assert_eq!(records, snapshot);
    }

    #[test]
    fn compact_encoding_has_fixed_field_order_and_no_whitespace() {
        let mut hashed = record("Ford", "Focus", "AT-001-B");
        hashed.make_model_hash = Some("H".to_string());

        let encoded =
            encode_records(&[hashed], JsonSeparators::Compact).expect("encoding should pass");
        assert_eq!(
            String::from_utf8(encoded).expect("utf-8"),
            r#"[{"make":"Ford","model":"Focus","license_plate":"AT-001-B","origin":{"country":"DE","year":1999},"make_model_hash":"H"}]"#
        );
    }

    #[test]
    fn spaced_encoding_uses_comma_space_and_colon_space() {
        let mut hashed = record("Ford", "Focus", "AT-001-B");
        hashed.make_model_hash = Some("H".to_string());

        let encoded = encode_records(&[hashed.clone(), hashed], JsonSeparators::Spaced)
            .expect("encoding should pass");
        let text = String::from_utf8(encoded).expect("utf-8");
        assert!(text.starts_with(r#"[{"make": "Ford", "model": "Focus""#));
        assert!(text.contains(r#""origin": {"country": "DE", "year": 1999}"#));
        assert!(text.contains("}, {"));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn empty_result_still_hashes_an_empty_array() {
        let data = dataset(vec![("id2", record("VW", "Golf", "A-924-VW"))]);

        let processed =
            process_dataset(&data, &TaskRules::default()).expect("processing should pass");
        assert!(processed.records.is_empty());
        assert_eq!(processed.encoded, b"[]");
        assert_eq!(
            processed.result_hash,
            "4F53CDA18C2BAA0C0354BB5F9A3ECBE5ED12AB4D8E11BA873C2F11161202B945"
        );
    }

    #[test]
    fn processing_is_pure() {
        let data = dataset(vec![
            ("id1", record("Ford", "Focus", "AT-001-B")),
            ("id2", record("Audi", "A4", "AA-500-C")),
            ("id3", record("VW", "Golf", "A-924-VW")),
        ]);

        let first = process_dataset(&data, &TaskRules::default()).expect("first run");
        let second = process_dataset(&data, &TaskRules::default()).expect("second run");
        assert_eq!(first, second);
        assert_eq!(first.records[0].license_plate, "AA-500-C");
    }
}
