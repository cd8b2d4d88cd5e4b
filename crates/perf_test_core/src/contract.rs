use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

pub const PLATE_SEPARATOR: char = '-';
pub const PLATE_PART_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Origin {
    pub country: String,
    pub year: u16,
}

/// One synthetic vehicle. Field declaration order is the wire order of the
/// result document and must not change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VehicleRecord {
    pub make: String,
    pub model: String,
    pub license_plate: String,
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make_model_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub id: String,
    pub record: VehicleRecord,
}

/// Mapping from vehicle id to record, kept in document order so equal
/// plates sort the same way on every load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    entries: Vec<DatasetEntry>,
}

impl Dataset {
    pub fn from_entries(entries: Vec<DatasetEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&VehicleRecord> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| &entry.record)
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.id, &entry.record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Dataset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DatasetVisitor;

        impl<'de> Visitor<'de> for DatasetVisitor {
            type Value = Dataset;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a mapping from vehicle id to vehicle record")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Dataset, A::Error> {
                let capacity = access.size_hint().unwrap_or(0);
                let mut entries = Vec::with_capacity(capacity);
                let mut seen = HashSet::with_capacity(capacity);
                while let Some((id, record)) = access.next_entry::<String, VehicleRecord>()? {
                    if !seen.insert(id.clone()) {
                        return Err(de::Error::custom(format!("duplicate vehicle id '{id}'")));
                    }
                    entries.push(DatasetEntry { id, record });
                }
                Ok(Dataset { entries })
            }
        }

        deserializer.deserialize_map(DatasetVisitor)
    }
}

/// The three `-` separated groups of a license plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlateParts<'a> {
    pub first: &'a str,
    pub numbers: &'a str,
    pub last: &'a str,
}

impl<'a> PlateParts<'a> {
    /// Returns `None` unless the plate splits into exactly three groups.
    pub fn split(plate: &'a str) -> Option<Self> {
        let mut parts = plate.split(PLATE_SEPARATOR);
        let first = parts.next()?;
        let numbers = parts.next()?;
        let last = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            first,
            numbers,
            last,
        })
    }
}

/// How the two plate conditions combine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlatePredicate {
    /// First group contains `A` and the digit group contains `0`.
    #[default]
    All,
    /// Either condition is enough.
    Any,
}

impl PlatePredicate {
    pub fn matches(self, parts: &PlateParts<'_>) -> bool {
        let has_letter = parts.first.contains('A');
        let has_zero = parts.numbers.contains('0');
        match self {
            Self::All => has_letter && has_zero,
            Self::Any => has_letter || has_zero,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }
}

impl FromStr for PlatePredicate {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" | "and" => Ok(Self::All),
            "any" | "or" => Ok(Self::Any),
            other => Err(ConfigError::InvalidValue {
                key: "PLATE_PREDICATE",
                value: other.to_string(),
                expected: "all | any",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HashCase {
    #[default]
    Upper,
    Lower,
}

impl HashCase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upper => "upper",
            Self::Lower => "lower",
        }
    }
}

impl FromStr for HashCase {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "upper" => Ok(Self::Upper),
            "lower" => Ok(Self::Lower),
            other => Err(ConfigError::InvalidValue {
                key: "HASH_CASE",
                value: other.to_string(),
                expected: "upper | lower",
            }),
        }
    }
}

/// Separator style of the serialized result document.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JsonSeparators {
    /// `,` and `:` with no whitespace.
    #[default]
    Compact,
    /// `, ` and `: `.
    Spaced,
}

impl JsonSeparators {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Spaced => "spaced",
        }
    }
}

impl FromStr for JsonSeparators {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "spaced" => Ok(Self::Spaced),
            other => Err(ConfigError::InvalidValue {
                key: "JSON_SEPARATORS",
                value: other.to_string(),
                expected: "compact | spaced",
            }),
        }
    }
}

/// Everything that changes the task's output bytes. Two runs are only
/// comparable when their rules are equal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRules {
    #[serde(default)]
    pub predicate: PlatePredicate,
    #[serde(default)]
    pub hash_case: HashCase,
    #[serde(default)]
    pub separators: JsonSeparators,
}
