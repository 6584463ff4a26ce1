//! Configuration for the DNC memory engine.
//!
//! Maps directly to `dnc.toml`. Every field has a serde default, so a
//! partial file (or an empty one) yields a usable configuration.
//!
//! ```toml
//! [dimensions]
//! input_size = 8
//! controller_hidden_size = 16
//! num_read_heads = 2
//! memory_locations = 32
//! memory_vector_size = 8
//!
//! [addressing]
//! free_threshold = 0.1
//! retention = "fixed"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DncError, Result};

/// Static maximum number of read heads per engine.
pub const MAX_READ_HEADS: usize = 4;

/// Static maximum number of memory locations per engine.
pub const MAX_MEMORY_LOCATIONS: usize = 256;

/// Static maximum capacity of the write-order history ring.
pub const MAX_HISTORY_CAPACITY: usize = 4 * MAX_MEMORY_LOCATIONS;

/// Top-level engine configuration, loadable from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DncConfig {
    /// Construction-time sizes, fixed for the instance's lifetime.
    #[serde(default)]
    pub dimensions: DimensionsConfig,
    /// Addressing thresholds and usage retention.
    #[serde(default)]
    pub addressing: AddressingConfig,
    /// Seeded initialisation of memory and controller weights.
    #[serde(default)]
    pub init: InitConfig,
}

impl DncConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `DncError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| DncError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), "DNC configuration loaded");
        Ok(config)
    }

    /// Shorthand for a config with the given dimensions and default tuning.
    #[must_use]
    pub fn with_dimensions(
        input_size: usize,
        controller_hidden_size: usize,
        num_read_heads: usize,
        memory_locations: usize,
        memory_vector_size: usize,
    ) -> Self {
        Self {
            dimensions: DimensionsConfig {
                input_size,
                controller_hidden_size,
                num_read_heads,
                memory_locations,
                memory_vector_size,
            },
            ..Self::default()
        }
    }

    /// Check the configuration against the engine's static capacity.
    ///
    /// # Errors
    /// Returns the first violated constraint: head or location counts over
    /// the static maxima, zero read heads, zero-sized dimensions, a history
    /// capacity over `MAX_HISTORY_CAPACITY`, thresholds outside `[0, 1]`, or
    /// non-finite or negative epsilons and init scales.
    pub fn validate(&self) -> Result<()> {
        let d = &self.dimensions;
        if d.num_read_heads == 0 {
            return Err(DncError::NoReadHeads);
        }
        if d.num_read_heads > MAX_READ_HEADS {
            return Err(DncError::ReadHeadsExceeded {
                requested: d.num_read_heads,
                max: MAX_READ_HEADS,
            });
        }
        if d.memory_locations > MAX_MEMORY_LOCATIONS {
            return Err(DncError::LocationsExceeded {
                requested: d.memory_locations,
                max: MAX_MEMORY_LOCATIONS,
            });
        }
        if d.memory_locations == 0 {
            return Err(DncError::EmptyDimension("memory_locations"));
        }
        if d.memory_vector_size == 0 {
            return Err(DncError::EmptyDimension("memory_vector_size"));
        }
        match self.addressing.history_capacity {
            Some(0) => return Err(DncError::EmptyDimension("history_capacity")),
            Some(capacity) if capacity > MAX_HISTORY_CAPACITY => {
                return Err(DncError::Config(format!(
                    "history_capacity must be at most {MAX_HISTORY_CAPACITY}, got {capacity}"
                )));
            }
            _ => {}
        }

        let a = &self.addressing;
        for (name, value) in [
            ("free_threshold", a.free_threshold),
            ("significance_threshold", a.significance_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DncError::Config(format!("{name} must be in [0, 1], got {value}")));
            }
        }
        for (name, value) in [
            ("similarity_epsilon", a.similarity_epsilon),
            ("write_epsilon", a.write_epsilon),
            ("memory_noise", self.init.memory_noise),
            ("weight_scale", self.init.weight_scale),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(DncError::Config(format!("{name} must be finite and >= 0, got {value}")));
            }
        }
        Ok(())
    }

    /// Size of the controller input: external input plus all previous reads.
    #[must_use]
    pub fn controller_input_size(&self) -> usize {
        let d = &self.dimensions;
        d.input_size + d.num_read_heads * d.memory_vector_size
    }

    /// Size of one step's output: controller hidden segment plus all reads.
    #[must_use]
    pub fn output_size(&self) -> usize {
        let d = &self.dimensions;
        d.controller_hidden_size + d.num_read_heads * d.memory_vector_size
    }

    /// Capacity of the write-order history ring.
    #[must_use]
    pub fn history_capacity(&self) -> usize {
        self.addressing
            .history_capacity
            .unwrap_or(self.dimensions.memory_locations)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Construction parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionsConfig {
    /// Length of the external input per step.
    #[serde(default = "default_8")]
    pub input_size: usize,
    /// Length of the controller's hidden (non-interface) output segment.
    #[serde(default = "default_16")]
    pub controller_hidden_size: usize,
    /// Number of read heads (R), `1..=MAX_READ_HEADS`.
    #[serde(default = "default_2")]
    pub num_read_heads: usize,
    /// Number of memory locations (N), `1..=MAX_MEMORY_LOCATIONS`.
    #[serde(default = "default_32")]
    pub memory_locations: usize,
    /// Width of each memory vector (M).
    #[serde(default = "default_8")]
    pub memory_vector_size: usize,
}

impl Default for DimensionsConfig {
    fn default() -> Self {
        Self {
            input_size: 8,
            controller_hidden_size: 16,
            num_read_heads: 2,
            memory_locations: 32,
            memory_vector_size: 8,
        }
    }
}

/// How usage is retained between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionMode {
    /// Retention is always 1: usage only grows through writes.
    #[default]
    Fixed,
    /// Retention is `Π_r (1 − f_r · w_r)` over the previous read weightings
    /// and the current free gates.
    FreeGated,
}

/// Addressing thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressingConfig {
    /// Norm product below which cosine similarity is defined as 0.
    #[serde(default = "default_1e_6")]
    pub similarity_epsilon: f32,
    /// Weights below this are skipped by writes and reads.
    #[serde(default = "default_1e_6")]
    pub write_epsilon: f32,
    /// Locations with usage below this are on the free list.
    #[serde(default = "default_0_1")]
    pub free_threshold: f32,
    /// Minimum dominant write weight recorded in the write-order history.
    #[serde(default = "default_0_1")]
    pub significance_threshold: f32,
    /// Write-order history capacity; defaults to the location count.
    #[serde(default)]
    pub history_capacity: Option<usize>,
    /// Usage retention rule.
    #[serde(default)]
    pub retention: RetentionMode,
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            similarity_epsilon: 1e-6,
            write_epsilon: 1e-6,
            free_threshold: 0.1,
            significance_threshold: 0.1,
            history_capacity: None,
            retention: RetentionMode::Fixed,
        }
    }
}

/// Seeded initialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitConfig {
    /// Seed for memory noise and controller weights.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Width of the uniform noise a fresh memory matrix is filled with.
    #[serde(default = "default_0_01")]
    pub memory_noise: f32,
    /// Scale applied to the built-in LSTM controller's weights.
    #[serde(default = "default_0_01")]
    pub weight_scale: f32,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            memory_noise: 0.01,
            weight_scale: 0.01,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_2() -> usize { 2 }
fn default_8() -> usize { 8 }
fn default_16() -> usize { 16 }
fn default_32() -> usize { 32 }
fn default_1e_6() -> f32 { 1e-6 }
fn default_0_01() -> f32 { 0.01 }
fn default_0_1() -> f32 { 0.1 }
fn default_seed() -> u64 { 0x00d1_5c0d }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.controller_input_size(), 8 + 2 * 8);
        assert_eq!(config.output_size(), 16 + 2 * 8);
        assert_eq!(config.history_capacity(), 32);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = DncConfig::from_toml("").expect("parse");
        assert_eq!(config, DncConfig::default());
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = DncConfig::from_toml(
            r#"
            [dimensions]
            num_read_heads = 3
            memory_locations = 64

            [addressing]
            retention = "free_gated"
            history_capacity = 10
            "#,
        )
        .expect("parse");
        assert_eq!(config.dimensions.num_read_heads, 3);
        assert_eq!(config.dimensions.memory_locations, 64);
        assert_eq!(config.dimensions.memory_vector_size, 8);
        assert_eq!(config.addressing.retention, RetentionMode::FreeGated);
        assert_eq!(config.history_capacity(), 10);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = DncConfig::from_toml("[dimensions\n").expect_err("should fail");
        assert!(matches!(err, DncError::Config(_)));
    }

    #[test]
    fn rejects_too_many_heads() {
        let config = DncConfig::with_dimensions(8, 16, MAX_READ_HEADS + 1, 32, 8);
        assert!(matches!(
            config.validate(),
            Err(DncError::ReadHeadsExceeded { requested: 5, max: 4 })
        ));
    }

    #[test]
    fn rejects_too_many_locations() {
        let config = DncConfig::with_dimensions(8, 16, 2, MAX_MEMORY_LOCATIONS + 1, 8);
        assert!(matches!(config.validate(), Err(DncError::LocationsExceeded { .. })));
    }

    #[test]
    fn rejects_zero_read_heads() {
        let config = DncConfig::with_dimensions(8, 16, 0, 32, 8);
        assert!(matches!(config.validate(), Err(DncError::NoReadHeads)));
    }

    #[test]
    fn rejects_zero_vector_size() {
        let config = DncConfig::with_dimensions(8, 16, 1, 32, 0);
        assert!(matches!(
            config.validate(),
            Err(DncError::EmptyDimension("memory_vector_size"))
        ));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = DncConfig::default();
        config.addressing.free_threshold = 1.5;
        assert!(matches!(config.validate(), Err(DncError::Config(_))));
    }

    #[test]
    fn rejects_non_finite_memory_noise() {
        let config = DncConfig::from_toml("[init]\nmemory_noise = inf\n").expect("parse");
        let err = config.validate().expect_err("inf noise");
        assert!(matches!(err, DncError::Config(ref msg) if msg.contains("memory_noise")));
    }

    #[test]
    fn rejects_nan_weight_scale() {
        let config = DncConfig::from_toml("[init]\nweight_scale = nan\n").expect("parse");
        let err = config.validate().expect_err("nan scale");
        assert!(matches!(err, DncError::Config(ref msg) if msg.contains("weight_scale")));
    }

    #[test]
    fn rejects_negative_init_scales() {
        let mut config = DncConfig::default();
        config.init.memory_noise = -0.5;
        assert!(matches!(config.validate(), Err(DncError::Config(_))));

        let mut config = DncConfig::default();
        config.init.weight_scale = -1.0;
        assert!(matches!(config.validate(), Err(DncError::Config(_))));
    }

    #[test]
    fn history_capacity_is_bounded() {
        let mut config = DncConfig::default();
        config.addressing.history_capacity = Some(MAX_HISTORY_CAPACITY);
        assert!(config.validate().is_ok());

        config.addressing.history_capacity = Some(MAX_HISTORY_CAPACITY + 1);
        let err = config.validate().expect_err("oversized history");
        assert!(matches!(err, DncError::Config(ref msg) if msg.contains("history_capacity")));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dnc.toml");
        std::fs::write(&path, "[dimensions]\ninput_size = 4\n").expect("write");
        let config = DncConfig::from_file(&path).expect("load");
        assert_eq!(config.dimensions.input_size, 4);
    }
}
