use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::contract::TaskRules;
use crate::error::ConfigError;
use crate::naming::{fixture_file_name, function_name};

pub const TEST_DATA_FILE_ENV: &str = "TEST_DATA_FILE";
pub const TEST_DATA_DIR_ENV: &str = "TEST_DATA_DIR";
pub const PLATE_PREDICATE_ENV: &str = "PLATE_PREDICATE";
pub const HASH_CASE_ENV: &str = "HASH_CASE";
pub const JSON_SEPARATORS_ENV: &str = "JSON_SEPARATORS";

/// Layers are mounted under `/opt` inside the Lambda sandbox.
pub const DEFAULT_DATA_DIR: &str = "/opt";
pub const DEFAULT_RECORD_COUNT: usize = 10_000;
pub const DEFAULT_MEMORY_SIZE_MB: u32 = 3008;
pub const DEFAULT_DEPLOYED_RECORD_COUNT: usize = 100_000;
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// Where one task invocation reads its dataset and which rules it applies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BenchmarkConfig {
    pub data_dir: PathBuf,
    pub data_file: String,
    #[serde(default)]
    pub rules: TaskRules,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            data_file: fixture_file_name(DEFAULT_RECORD_COUNT),
            rules: TaskRules::default(),
        }
    }
}

impl BenchmarkConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from a key lookup; unset or blank keys fall back to
    /// defaults, malformed rule values are rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let mut config = Self::default();
        if let Some(data_dir) = value(TEST_DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(data_file) = value(TEST_DATA_FILE_ENV) {
            config.data_file = data_file;
        }
        if let Some(predicate) = value(PLATE_PREDICATE_ENV) {
            config.rules.predicate = predicate.parse()?;
        }
        if let Some(hash_case) = value(HASH_CASE_ENV) {
            config.rules.hash_case = hash_case.parse()?;
        }
        if let Some(separators) = value(JSON_SEPARATORS_ENV) {
            config.rules.separators = separators.parse()?;
        }
        Ok(config)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(&self.data_file)
    }
}

/// Deployment knobs that vary between benchmark configurations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentProfile {
    pub runtime: String,
    pub memory_size_mb: u32,
    pub record_count: usize,
    pub task_timeout_secs: u64,
}

impl DeploymentProfile {
    pub fn new(runtime: impl Into<String>) -> Result<Self, ConfigError> {
        let runtime = runtime.into().trim().to_string();
        if runtime.is_empty() {
            return Err(ConfigError::Empty { key: "runtime" });
        }
        Ok(Self {
            runtime,
            memory_size_mb: DEFAULT_MEMORY_SIZE_MB,
            record_count: DEFAULT_DEPLOYED_RECORD_COUNT,
            task_timeout_secs: DEFAULT_TASK_TIMEOUT.as_secs(),
        })
    }

    pub fn with_memory_size_mb(mut self, memory_size_mb: u32) -> Self {
        self.memory_size_mb = memory_size_mb;
        self
    }

    pub fn with_record_count(mut self, record_count: usize) -> Self {
        self.record_count = record_count;
        self
    }

    pub fn function_name(&self) -> String {
        function_name(&self.runtime, self.memory_size_mb, self.record_count)
    }

    pub fn data_file(&self) -> String {
        fixture_file_name(self.record_count)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// Environment the deployed function needs to find its dataset.
    pub fn function_environment(&self) -> Vec<(&'static str, String)> {
        vec![(TEST_DATA_FILE_ENV, self.data_file())]
    }
}
