//! Pipeline configuration
//!
//! YAML with recognized keys only; unknown keys are rejected so typos in
//! budget or threshold names fail the run up front instead of silently
//! running unbounded. Only configuration problems are fatal to a run.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Fatal, pre-run configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error reading configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration for a pipeline run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Payer name to index-or-rates URL. One pipeline per entry.
    pub payer_endpoints: BTreeMap<String, String>,

    /// Billing codes to admit. Absent means admit everything.
    #[serde(default)]
    pub cpt_whitelist: Option<Vec<String>>,

    #[serde(default)]
    pub processing: ProcessingConfig,

    pub output: OutputConfig,

    #[serde(default)]
    pub quality_rules: QualityRules,
}

/// Processing budgets, thresholds, and concurrency knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProcessingConfig {
    /// Rows buffered per entity before a flush
    pub batch_size: usize,

    /// Concurrent payer pipelines
    pub parallel_workers: usize,

    /// Budget: in-network files processed per payer
    pub max_files_per_payer: Option<usize>,

    /// Budget: items consumed per file
    pub max_records_per_file: Option<u64>,

    /// Budget: wall clock per payer pipeline, seconds
    pub max_processing_time_secs: Option<u64>,

    /// Quality gate: minimum completeness, percent
    pub min_completeness_pct: f64,

    /// Quality gate: minimum accuracy score
    pub min_accuracy_score: f64,

    /// Early-flush ceiling for resident batch memory
    pub memory_threshold_mb: Option<usize>,

    /// Per-HTTP-request timeout, seconds
    pub request_timeout_secs: u64,

    /// Retries for transient fetch and write failures
    pub max_retries: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            parallel_workers: 4,
            max_files_per_payer: None,
            max_records_per_file: None,
            max_processing_time_secs: None,
            min_completeness_pct: 80.0,
            min_accuracy_score: 0.5,
            memory_threshold_mb: None,
            request_timeout_secs: 120,
            max_retries: 3,
        }
    }
}

/// Output sinks. At least one of local or S3 must be configured.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub local_directory: Option<PathBuf>,

    pub s3: Option<S3Config>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Config {
    pub bucket: String,

    #[serde(default)]
    pub prefix: Option<String>,

    pub region: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityRules {
    #[serde(default)]
    pub rates: RateBounds,

    #[serde(default)]
    pub high_cost_procedures: HighCostRules,
}

/// Global admissible range for negotiated rates.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RateBounds {
    pub min_rate: f64,
    pub max_rate: f64,
}

impl Default for RateBounds {
    fn default() -> Self {
        Self {
            min_rate: 0.01,
            max_rate: 1_000_000.0,
        }
    }
}

/// Per-code rate ceilings for known high-cost procedures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HighCostRules {
    #[serde(default)]
    pub max_reasonable_rates: BTreeMap<String, f64>,
}

impl PipelineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Convenience wrapper over [`Self::from_yaml_str`] for embedding
    /// applications that keep configuration on disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Structural validation beyond what serde enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.payer_endpoints.is_empty() {
            return Err(ConfigError::Missing("payer_endpoints"));
        }
        if self.output.local_directory.is_none() && self.output.s3.is_none() {
            return Err(ConfigError::Missing("output.local_directory or output.s3"));
        }
        if self.processing.batch_size == 0 {
            return Err(ConfigError::Invalid("processing.batch_size must be > 0".into()));
        }
        if self.processing.parallel_workers == 0 {
            return Err(ConfigError::Invalid(
                "processing.parallel_workers must be > 0".into(),
            ));
        }
        let bounds = &self.quality_rules.rates;
        if bounds.min_rate <= 0.0 || bounds.min_rate >= bounds.max_rate {
            return Err(ConfigError::Invalid(format!(
                "quality_rules.rates requires 0 < min_rate < max_rate, got [{}, {}]",
                bounds.min_rate, bounds.max_rate
            )));
        }
        if !(0.0..=100.0).contains(&self.processing.min_completeness_pct) {
            return Err(ConfigError::Invalid(
                "processing.min_completeness_pct must be within [0, 100]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.processing.min_accuracy_score) {
            return Err(ConfigError::Invalid(
                "processing.min_accuracy_score must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}
