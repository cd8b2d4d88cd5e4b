use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key} (expected {expected})")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{key} cannot be empty")]
    Empty { key: &'static str },
}

/// Fatal task failures. Every variant aborts the invocation.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to read dataset '{path}': {source}")]
    DatasetUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("dataset '{path}' is not a valid vehicle mapping: {source}")]
    DatasetMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("vehicle '{id}' has malformed license plate '{plate}'")]
    MalformedPlate { id: String, plate: String },
    #[error("failed to encode result document: {0}")]
    Encoding(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("unable to read reference list '{path}': {source}")]
    ReferenceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("reference list '{path}' is malformed: {source}")]
    ReferenceMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("reference list '{0}' is empty")]
    EmptyReference(&'static str),
    #[error("record count must be positive")]
    ZeroRecords,
    #[error("unable to write dataset '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode dataset: {0}")]
    Encoding(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("topology needs at least one level")]
    NoLevels,
    #[error("level {level} must have a positive width")]
    ZeroWidth { level: usize },
    #[error("level {level} must have a positive timeout")]
    ZeroTimeout { level: usize },
    #[error("topology fans out to more than {max} task invocations")]
    TooManyInvocations { max: usize },
    #[error("topology has no level {level}")]
    UnknownLevel { level: usize },
    #[error("expected {expected} nested state machine ARNs, got {actual}")]
    NestedTargets { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportParseError {
    #[error("line does not contain a benchmark report")]
    NotAReport,
    #[error("report field '{field}' is malformed: {value}")]
    Field { field: &'static str, value: String },
}
