//! Recognizer thresholds and the TOML pipeline configuration.
//!
//! ```toml
//! [coalescer]
//! buffer_capacity = 96
//!
//! [recognizer]
//! max_duration_secs = 3.0
//!
//! [recognizer.training]
//! baum_welch_iterations = 20
//! ```
//!
//! Every table and field is optional.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gesture_hmm::TrainingConfig;
use glove_coalescer::CoalescerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════
// RecognizerConfig
// ════════════════════════════════════════════════════════════════════════════

/// Acceptance thresholds applied by the recognizer manager.
///
/// Probabilities are compared in log space, so thresholds far below the
/// smallest normal `f64` still discriminate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub min_duration_secs:       f64,
    pub max_duration_secs:       f64,
    /// Primary scores below this trigger the k-means fallback.
    pub min_base_probability:    f64,
    /// Fallback scores below this reject the instance outright.
    pub min_kmeans_probability:  f64,
    /// Primary scores below this are treated as no match at all.
    pub epsilon_probability:     f64,
    /// Fallback score that rescues a primary score under epsilon.
    pub last_chance_probability: f64,
    pub training:                TrainingConfig,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        RecognizerConfig {
            min_duration_secs:       0.011,
            max_duration_secs:       4.0,
            min_base_probability:    1e-200,
            min_kmeans_probability:  1e-250,
            epsilon_probability:     1e-300,
            last_chance_probability: 1e-100,
            training:                TrainingConfig::default(),
        }
    }
}

impl RecognizerConfig {
    pub fn duration_secs(mut self, min: f64, max: f64) -> Self {
        self.min_duration_secs = min;
        self.max_duration_secs = max;
        self
    }

    pub fn min_base_probability(mut self, p: f64) -> Self {
        self.min_base_probability = p;
        self
    }

    pub fn min_kmeans_probability(mut self, p: f64) -> Self {
        self.min_kmeans_probability = p;
        self
    }

    pub fn epsilon_probability(mut self, p: f64) -> Self {
        self.epsilon_probability = p;
        self
    }

    pub fn last_chance_probability(mut self, p: f64) -> Self {
        self.last_chance_probability = p;
        self
    }

    pub fn training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    pub(crate) fn log_thresholds(&self) -> LogThresholds {
        LogThresholds {
            min_base:    self.min_base_probability.ln(),
            min_kmeans:  self.min_kmeans_probability.ln(),
            epsilon:     self.epsilon_probability.ln(),
            last_chance: self.last_chance_probability.ln(),
        }
    }
}

/// The probability thresholds as natural logs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LogThresholds {
    pub min_base:    f64,
    pub min_kmeans:  f64,
    pub epsilon:     f64,
    pub last_chance: f64,
}

// ════════════════════════════════════════════════════════════════════════════
// PipelineConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything the demo pipeline needs, as read from one TOML file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub coalescer:  CoalescerConfig,
    pub recognizer: RecognizerConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }
}
