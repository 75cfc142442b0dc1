//! TOML configuration.
//!
//! Only `[db]` is required. Every other section falls back to defaults,
//! so a two-line file is a valid config:
//!
//! ```toml
//! [db]
//! path = "./data/drift.sqlite"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use schema_drift_core::detect::DetectOptions;
use schema_drift_core::evolve::{
    TrackerOptions, DEFAULT_MAX_APPEND_RETRIES, DEFAULT_RENAME_SIMILARITY,
};
use schema_drift_core::infer::InferOptions;
use schema_drift_core::pipeline::PipelineOptions;
use schema_drift_core::render::RenderOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    #[serde(default = "default_min_block_lines")]
    pub min_block_lines: usize,
    #[serde(default = "default_csv_delimiters")]
    pub csv_delimiters: Vec<char>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_block_lines: default_min_block_lines(),
            csv_delimiters: default_csv_delimiters(),
        }
    }
}

fn default_min_block_lines() -> usize {
    2
}
fn default_csv_delimiters() -> Vec<char> {
    vec![',', ';', '\t']
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InferenceConfig {
    /// chrono format strings tried after the built-in datetime shapes.
    #[serde(default)]
    pub datetime_formats: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvolutionConfig {
    #[serde(default = "default_max_append_retries")]
    pub max_append_retries: u32,
    #[serde(default = "default_rename_similarity")]
    pub rename_similarity: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            max_append_retries: default_max_append_retries(),
            rename_similarity: default_rename_similarity(),
        }
    }
}

fn default_max_append_retries() -> u32 {
    DEFAULT_MAX_APPEND_RETRIES
}
fn default_rename_similarity() -> f64 {
    DEFAULT_RENAME_SIMILARITY
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RenderConfig {
    #[serde(default)]
    pub table_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    ["txt", "md", "json", "csv", "html", "log"]
        .iter()
        .map(|ext| format!("**/*.{}", ext))
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Defaults for commands that never open the database.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/drift.sqlite"),
            },
            detection: DetectionConfig::default(),
            inference: InferenceConfig::default(),
            evolution: EvolutionConfig::default(),
            render: RenderConfig::default(),
            ingest: IngestConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            detection: DetectOptions {
                min_block_lines: self.detection.min_block_lines,
                csv_delimiters: self.detection.csv_delimiters.clone(),
            },
            inference: InferOptions {
                datetime_formats: self.inference.datetime_formats.clone(),
            },
        }
    }

    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            max_append_retries: self.evolution.max_append_retries,
            rename_similarity: self.evolution.rename_similarity,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            table_prefix: self.render.table_prefix.clone(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.detection.min_block_lines < 2 {
        anyhow::bail!("detection.min_block_lines must be >= 2");
    }

    if config.detection.csv_delimiters.is_empty() {
        anyhow::bail!("detection.csv_delimiters must not be empty");
    }
    for d in &config.detection.csv_delimiters {
        if d.is_alphanumeric() || matches!(d, '"' | '\n' | '\r') {
            anyhow::bail!("detection.csv_delimiters: {:?} cannot be a delimiter", d);
        }
    }

    if config.evolution.max_append_retries == 0 {
        anyhow::bail!("evolution.max_append_retries must be >= 1");
    }

    let s = config.evolution.rename_similarity;
    if !(s > 0.0 && s <= 1.0) {
        anyhow::bail!("evolution.rename_similarity must be in (0.0, 1.0]");
    }

    if config.ingest.include_globs.is_empty() {
        anyhow::bail!("ingest.include_globs must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn db_section_alone_is_enough() {
        let config = parse("[db]\npath = \"x.sqlite\"\n").unwrap();
        assert_eq!(config.detection.min_block_lines, 2);
        assert_eq!(config.detection.csv_delimiters, vec![',', ';', '\t']);
        assert_eq!(config.evolution.max_append_retries, 5);
        assert_eq!(config.logging.level, "warn");
        assert!(config.ingest.include_globs.contains(&"**/*.csv".to_string()));
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse(
            r#"
            [db]
            path = "x.sqlite"

            [detection]
            min_block_lines = 3
            csv_delimiters = ["|"]

            [inference]
            datetime_formats = ["%d.%m.%Y"]

            [evolution]
            max_append_retries = 2
            rename_similarity = 0.75

            [render]
            table_prefix = "raw_"
            "#,
        )
        .unwrap();
        let pipeline = config.pipeline_options();
        assert_eq!(pipeline.detection.min_block_lines, 3);
        assert_eq!(pipeline.detection.csv_delimiters, vec!['|']);
        assert_eq!(pipeline.inference.datetime_formats, vec!["%d.%m.%Y"]);
        assert_eq!(config.tracker_options().max_append_retries, 2);
        assert_eq!(config.render_options().table_prefix, "raw_");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse("[db]\npath = \"x\"\n[detection]\nmin_block_lines = 1\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[detection]\ncsv_delimiters = [\"a\"]\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[evolution]\nmax_append_retries = 0\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[evolution]\nrename_similarity = 1.5\n").is_err());
        assert!(parse("[detection]\nmin_block_lines = 2\n").is_err());
    }
}
