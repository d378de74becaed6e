use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{LawGraphError, Result};
use crate::types::ImpactOptions;

/// Name of the configuration file stored inside the `.lawgraph` directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Name of the hidden directory used to store lawgraph metadata.
pub const LAWGRAPH_DIR: &str = ".lawgraph";

/// Tunables for detection, resolution and impact analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LawGraphConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Characters scanned before an article citation for a qualifying law name.
    pub lookback_window: usize,
    /// Deterministic candidates at or below this confidence are escalated to
    /// the AI resolver.
    pub escalation_threshold: f64,
    /// Resolutions below this confidence are dropped.
    pub rejection_threshold: f64,
    /// Patterns of one article resolved concurrently.
    pub max_concurrent_resolutions: usize,
    /// Articles analysed concurrently in a batch.
    pub max_concurrent_articles: usize,
    /// Per-call timeout for the AI resolver, in milliseconds.
    pub ai_timeout_ms: u64,
    /// Widest range or relative span expanded into per-target references.
    pub max_span_expansion: u32,
    /// Defaults for impact queries.
    pub impact: ImpactDefaults,
}

/// Default impact query options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactDefaults {
    pub depth: u32,
    pub include_indirect: bool,
    pub confidence_threshold: f64,
}

impl Default for ImpactDefaults {
    fn default() -> Self {
        Self {
            depth: 3,
            include_indirect: true,
            confidence_threshold: 0.7,
        }
    }
}

impl Default for LawGraphConfig {
    fn default() -> Self {
        Self {
            version: 1,
            lookback_window: crate::detection::DEFAULT_LOOKBACK_WINDOW,
            escalation_threshold: 0.90,
            rejection_threshold: 0.5,
            max_concurrent_resolutions: 8,
            max_concurrent_articles: 4,
            ai_timeout_ms: 5_000,
            max_span_expansion: 100,
            impact: ImpactDefaults::default(),
        }
    }
}

impl LawGraphConfig {
    pub fn ai_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_timeout_ms)
    }

    /// Impact options seeded from the configured defaults.
    pub fn impact_options(&self) -> ImpactOptions {
        ImpactOptions {
            depth: self.impact.depth,
            include_indirect: self.impact.include_indirect,
            confidence_threshold: self.impact.confidence_threshold,
            deadline: None,
        }
    }

    /// Rejects thresholds outside `[0, 1]` and zero concurrency limits.
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("escalation_threshold", self.escalation_threshold),
            ("rejection_threshold", self.rejection_threshold),
            ("impact.confidence_threshold", self.impact.confidence_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(LawGraphError::Config {
                    message: format!("{name} must be within [0, 1], got {value}"),
                });
            }
        }
        if self.max_concurrent_resolutions == 0 || self.max_concurrent_articles == 0 {
            return Err(LawGraphError::Config {
                message: "concurrency limits must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Returns the path to the `.lawgraph` directory within the given root.
pub fn get_lawgraph_dir(root: &Path) -> PathBuf {
    root.join(LAWGRAPH_DIR)
}

/// Returns the path to the configuration file (`config.json`) within the `.lawgraph` directory.
pub fn get_config_path(root: &Path) -> PathBuf {
    get_lawgraph_dir(root).join(CONFIG_FILENAME)
}

/// Loads and validates the configuration from disk.
///
/// If the configuration file does not exist, returns the default configuration.
pub fn load_config(root: &Path) -> Result<LawGraphConfig> {
    let config_path = get_config_path(root);

    if !config_path.exists() {
        return Ok(LawGraphConfig::default());
    }

    let contents = fs::read_to_string(&config_path).map_err(|e| LawGraphError::Config {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    let config: LawGraphConfig =
        serde_json::from_str(&contents).map_err(|e| LawGraphError::Config {
            message: format!(
                "failed to parse config file '{}': {}",
                config_path.display(),
                e
            ),
        })?;

    config.validate()?;
    Ok(config)
}

/// Saves the configuration to disk using an atomic write.
///
/// Writes to a temporary file first and then renames it to the final location,
/// so a partial write never corrupts the configuration.
pub fn save_config(root: &Path, config: &LawGraphConfig) -> Result<()> {
    config.validate()?;

    let lawgraph_dir = get_lawgraph_dir(root);
    fs::create_dir_all(&lawgraph_dir).map_err(|e| LawGraphError::Config {
        message: format!(
            "failed to create lawgraph directory '{}': {}",
            lawgraph_dir.display(),
            e
        ),
    })?;

    let config_path = get_config_path(root);
    let tmp_path = config_path.with_extension("tmp");

    let json = serde_json::to_string_pretty(config).map_err(|e| LawGraphError::Config {
        message: format!("failed to serialize config: {}", e),
    })?;

    fs::write(&tmp_path, &json).map_err(|e| LawGraphError::Config {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, &config_path).map_err(|e| LawGraphError::Config {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            config_path.display(),
            e
        ),
    })?;

    Ok(())
}
