//! Synthetic vehicle dataset generation.
//!
//! Randomness here is uniform but not security sensitive; callers pass the
//! RNG so generation can be seeded for reproducible fixtures.

use std::fs;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};
use uuid::Builder;

use crate::contract::{Dataset, DatasetEntry, Origin, VehicleRecord};
use crate::error::FixtureError;
use crate::naming::fixture_file_name;

pub const YEAR_RANGE: Range<u16> = 1980..2020;
pub const PLATE_DIGITS_MAX: u16 = 1000;
const FIXTURE_INDENT: &[u8] = b"    ";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MakeModel {
    pub make: String,
    pub model: String,
}

/// The two fixed lists every record draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceData {
    make_models: Vec<MakeModel>,
    countries: Vec<String>,
}

impl ReferenceData {
    pub fn new(make_models: Vec<MakeModel>, countries: Vec<String>) -> Result<Self, FixtureError> {
        if make_models.is_empty() {
            return Err(FixtureError::EmptyReference("make_models"));
        }
        if countries.is_empty() {
            return Err(FixtureError::EmptyReference("countries"));
        }
        Ok(Self {
            make_models,
            countries,
        })
    }

    pub fn load(make_models_path: &Path, countries_path: &Path) -> Result<Self, FixtureError> {
        let make_models = read_reference(make_models_path)?;
        let countries = read_reference(countries_path)?;
        Self::new(make_models, countries)
    }

    pub fn make_models(&self) -> &[MakeModel] {
        &self.make_models
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    fn choose_make_model<R: Rng + ?Sized>(&self, rng: &mut R) -> &MakeModel {
        // Non-empty by construction.
        &self.make_models[rng.gen_range(0..self.make_models.len())]
    }

    fn choose_country<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.countries
            .choose(rng)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

fn read_reference<T: DeserializeOwned>(path: &Path) -> Result<T, FixtureError> {
    let bytes = fs::read(path).map_err(|source| FixtureError::ReferenceUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| FixtureError::ReferenceMalformed {
        path: path.to_path_buf(),
        source,
    })
}

/// `XX-123-X` or `X-123-XX`, each layout with equal probability.
pub fn generate_license_plate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let long_first = rng.gen_bool(0.5);
    let (first_len, last_len) = if long_first { (2, 1) } else { (1, 2) };

    let first = random_letters(rng, first_len);
    let numbers = rng.gen_range(0..PLATE_DIGITS_MAX);
    let last = random_letters(rng, last_len);
    format!("{first}-{numbers:03}-{last}")
}

fn random_letters<R: Rng + ?Sized>(rng: &mut R, count: usize) -> String {
    (0..count)
        .map(|_| char::from(b'A' + rng.gen_range(0..26u8)))
        .collect()
}

pub fn generate_vehicle<R: Rng + ?Sized>(rng: &mut R, reference: &ReferenceData) -> VehicleRecord {
    let make_model = reference.choose_make_model(rng).clone();
    let license_plate = generate_license_plate(rng);
    let country = reference.choose_country(rng).to_string();
    let year = rng.gen_range(YEAR_RANGE);

    VehicleRecord {
        make: make_model.make,
        model: make_model.model,
        license_plate,
        origin: Origin { country, year },
        make_model_hash: None,
    }
}

pub fn generate_dataset<R: Rng + ?Sized>(
    rng: &mut R,
    reference: &ReferenceData,
    count: usize,
) -> Result<Dataset, FixtureError> {
    if count == 0 {
        return Err(FixtureError::ZeroRecords);
    }

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let id = Builder::from_random_bytes(rng.gen()).into_uuid().to_string();
        let record = generate_vehicle(rng, reference);
        entries.push(DatasetEntry { id, record });
    }
    Ok(Dataset::from_entries(entries))
}

/// Writes `test_data_<N>.json` into `output_dir` and returns its path.
pub fn write_dataset(dataset: &Dataset, output_dir: &Path) -> Result<PathBuf, FixtureError> {
    let path = output_dir.join(fixture_file_name(dataset.len()));
    let write_error = |source| FixtureError::Write {
        path: path.clone(),
        source,
    };

    let file = fs::File::create(&path).map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    let mut serializer =
        Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(FIXTURE_INDENT));
    dataset
        .serialize(&mut serializer)
        .map_err(FixtureError::Encoding)?;
    writer.flush().map_err(write_error)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn reference() -> ReferenceData {
        ReferenceData::new(
            vec![
                MakeModel {
                    make: "Ford".to_string(),
                    model: "Focus".to_string(),
                },
                MakeModel {
                    make: "Volkswagen".to_string(),
                    model: "Golf".to_string(),
                },
            ],
            vec!["Germany".to_string(), "France".to_string()],
        )
        .expect("reference data should be valid")
    }

    fn plate_is_well_formed(plate: &str) -> bool {
        let groups: Vec<&str> = plate.split('-').collect();
        if groups.len() != 3 {
            return false;
        }
        let letters = |group: &str| {
            (1..=2).contains(&group.len()) && group.chars().all(|c| c.is_ascii_uppercase())
        };
        letters(groups[0])
            && letters(groups[2])
            && groups[0].len() + groups[2].len() == 3
            && groups[1].len() == 3
            && groups[1].chars().all(|c| c.is_ascii_digit())
    }

    #[test]
    fn plates_follow_one_of_two_layouts() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut long_first = 0;
        for _ in 0..2_000 {
            let plate = generate_license_plate(&mut rng);
            assert!(plate_is_well_formed(&plate), "bad plate {plate}");
            if plate.find('-') == Some(2) {
                long_first += 1;
            }
        }
        assert!((800..1_200).contains(&long_first));
    }

    #[test]
    fn vehicles_draw_from_reference_lists() {
        let reference = reference();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let vehicle = generate_vehicle(&mut rng, &reference);
            assert!(YEAR_RANGE.contains(&vehicle.origin.year));
            assert!(reference
                .make_models()
                .iter()
                .any(|pair| pair.make == vehicle.make && pair.model == vehicle.model));
            assert!(reference.countries().contains(&vehicle.origin.country));
            assert!(vehicle.make_model_hash.is_none());
        }
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let reference = reference();
        let first = generate_dataset(&mut StdRng::seed_from_u64(3), &reference, 50)
            .expect("dataset should generate");
        let second = generate_dataset(&mut StdRng::seed_from_u64(3), &reference, 50)
            .expect("dataset should generate");
        assert_eq!(first, second);
    }

    #[test]
    fn generated_ids_are_unique_uuids() {
        let dataset = generate_dataset(&mut StdRng::seed_from_u64(5), &reference(), 200)
            .expect("dataset should generate");
        let mut ids: Vec<&str> = dataset.entries().iter().map(|e| e.id.as_str()).collect();
        assert!(ids.iter().all(|id| uuid::Uuid::parse_str(id).is_ok()));
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn rejects_empty_reference_lists_and_zero_count() {
        assert!(matches!(
            ReferenceData::new(Vec::new(), vec!["Germany".to_string()]),
            Err(FixtureError::EmptyReference("make_models"))
        ));
        assert!(matches!(
            generate_dataset(&mut StdRng::seed_from_u64(1), &reference(), 0),
            Err(FixtureError::ZeroRecords)
        ));
    }
}
