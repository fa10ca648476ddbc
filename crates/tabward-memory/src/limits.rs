//! Resource limits and score tuning.
//!
//! Limits are fixed for the lifetime of a manager. They can be built in
//! code, taken from `Default`, or loaded from a TOML file:
//!
//! ```toml
//! max_tab_count = 8
//! hard_memory_ceiling_mb = 400.0
//! warning_memory_threshold_mb = 300.0
//! sample_interval_ms = 5000
//! auto_evict_enabled = true
//!
//! [score]
//! memory_span_mb = 19.0
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_TAB_COUNT: usize = 10;
const DEFAULT_HARD_CEILING_MB: f64 = 500.0;
const DEFAULT_WARNING_THRESHOLD_MB: f64 = 400.0;
const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 5_000;
const DEFAULT_SAMPLE_TIMEOUT_MS: u64 = 1_000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_tab_count must be at least 1")]
    ZeroTabCount,

    #[error("{field} must be a positive, finite number of megabytes (got {value})")]
    InvalidMemory { field: &'static str, value: f64 },

    #[error("warning threshold ({warning_mb} MB) exceeds hard ceiling ({ceiling_mb} MB)")]
    WarningAboveCeiling { warning_mb: f64, ceiling_mb: f64 },

    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),

    #[error("Invalid score tuning: {0}")]
    InvalidTuning(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Weights and normalization spans for health scoring.
///
/// The defaults are empirical: ~1 MB scores 100 and ~20 MB scores 0 on the
/// memory axis, 10 s of load time scores 0, and an hour since activation
/// scores 0 on the recency axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreTuning {
    /// Weight of the memory component
    pub memory_weight: f64,
    /// Weight of the load-latency component (only when a sample exists)
    pub load_weight: f64,
    /// Weight of the recency component
    pub recency_weight: f64,
    /// Weight of the active-state component
    pub active_weight: f64,
    /// Footprint that still scores 100
    pub memory_floor_mb: f64,
    /// Megabytes above the floor at which the memory component hits 0
    pub memory_span_mb: f64,
    /// Load duration at which the latency component hits 0
    pub load_span_ms: f64,
    /// Time since activation at which the recency component hits 0
    pub recency_span_secs: f64,
    /// Active-state component value for inactive tabs
    pub inactive_state_score: f64,
}

impl Default for ScoreTuning {
    fn default() -> Self {
        Self {
            memory_weight: 0.4,
            load_weight: 0.3,
            recency_weight: 0.2,
            active_weight: 0.1,
            memory_floor_mb: 1.0,
            memory_span_mb: 19.0,
            load_span_ms: 10_000.0,
            recency_span_secs: 3_600.0,
            inactive_state_score: 30.0,
        }
    }
}

impl ScoreTuning {
    /// Validate tuning values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            ("memory_weight", self.memory_weight),
            ("load_weight", self.load_weight),
            ("recency_weight", self.recency_weight),
            ("active_weight", self.active_weight),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidTuning(format!(
                    "{name} must be a finite, non-negative number (got {weight})"
                )));
            }
        }

        // The load component can be missing, so the rest must carry weight
        // on their own.
        if self.memory_weight + self.recency_weight + self.active_weight <= 0.0 {
            return Err(ConfigError::InvalidTuning(
                "memory, recency and active weights cannot all be zero".to_string(),
            ));
        }

        let spans = [
            ("memory_span_mb", self.memory_span_mb),
            ("load_span_ms", self.load_span_ms),
            ("recency_span_secs", self.recency_span_secs),
        ];
        for (name, span) in spans {
            if !span.is_finite() || span <= 0.0 {
                return Err(ConfigError::InvalidTuning(format!(
                    "{name} must be positive (got {span})"
                )));
            }
        }

        if !self.memory_floor_mb.is_finite() {
            return Err(ConfigError::InvalidTuning(
                "memory_floor_mb must be finite".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.inactive_state_score) {
            return Err(ConfigError::InvalidTuning(format!(
                "inactive_state_score must be within 0..=100 (got {})",
                self.inactive_state_score
            )));
        }

        Ok(())
    }
}

/// Hard and soft limits enforced by a resource manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum number of tracked tabs
    pub max_tab_count: usize,
    /// Aggregate memory above which new tabs are refused and eviction runs
    pub hard_memory_ceiling_mb: f64,
    /// Aggregate memory considered "warning"; also the eviction target
    pub warning_memory_threshold_mb: f64,
    /// Period of the check cycle
    pub sample_interval_ms: u64,
    /// Soft timeout for a single probe sample
    pub sample_timeout_ms: u64,
    /// Whether check cycles reclaim tabs automatically
    pub auto_evict_enabled: bool,
    /// Health score tuning
    pub score: ScoreTuning,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_tab_count: DEFAULT_MAX_TAB_COUNT,
            hard_memory_ceiling_mb: DEFAULT_HARD_CEILING_MB,
            warning_memory_threshold_mb: DEFAULT_WARNING_THRESHOLD_MB,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            sample_timeout_ms: DEFAULT_SAMPLE_TIMEOUT_MS,
            auto_evict_enabled: true,
            score: ScoreTuning::default(),
        }
    }
}

impl ResourceLimits {
    /// Parse limits from TOML text and validate them.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let limits: Self = toml::from_str(text)?;
        limits.validate()?;
        Ok(limits)
    }

    /// Load limits from a TOML file and validate them.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check period as a `Duration`
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Probe timeout as a `Duration`
    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tab_count == 0 {
            return Err(ConfigError::ZeroTabCount);
        }

        for (field, value) in [
            ("hard_memory_ceiling_mb", self.hard_memory_ceiling_mb),
            ("warning_memory_threshold_mb", self.warning_memory_threshold_mb),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidMemory { field, value });
            }
        }

        if self.warning_memory_threshold_mb > self.hard_memory_ceiling_mb {
            return Err(ConfigError::WarningAboveCeiling {
                warning_mb: self.warning_memory_threshold_mb,
                ceiling_mb: self.hard_memory_ceiling_mb,
            });
        }

        if self.sample_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("sample_interval_ms"));
        }
        if self.sample_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("sample_timeout_ms"));
        }

        self.score.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let limits = ResourceLimits::default();
        assert!(limits.validate().is_ok());
        assert!(limits.auto_evict_enabled);
        assert_eq!(limits.sample_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_warning_above_ceiling_rejected() {
        let limits = ResourceLimits {
            hard_memory_ceiling_mb: 100.0,
            warning_memory_threshold_mb: 120.0,
            ..Default::default()
        };
        assert!(matches!(
            limits.validate(),
            Err(ConfigError::WarningAboveCeiling { .. })
        ));
    }

    #[test]
    fn test_zero_values_rejected() {
        let limits = ResourceLimits {
            max_tab_count: 0,
            ..Default::default()
        };
        assert!(matches!(limits.validate(), Err(ConfigError::ZeroTabCount)));

        let limits = ResourceLimits {
            sample_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            limits.validate(),
            Err(ConfigError::ZeroDuration("sample_interval_ms"))
        ));

        let limits = ResourceLimits {
            hard_memory_ceiling_mb: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            limits.validate(),
            Err(ConfigError::InvalidMemory { field: "hard_memory_ceiling_mb", .. })
        ));
    }

    #[test]
    fn test_tuning_validation() {
        let tuning = ScoreTuning {
            memory_span_mb: 0.0,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());

        let tuning = ScoreTuning {
            memory_weight: 0.0,
            recency_weight: 0.0,
            active_weight: 0.0,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());

        let tuning = ScoreTuning {
            load_weight: -0.1,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let limits = ResourceLimits::from_toml_str(
            r#"
            max_tab_count = 3
            hard_memory_ceiling_mb = 150.0
            warning_memory_threshold_mb = 100.0
            auto_evict_enabled = false

            [score]
            memory_span_mb = 39.0
            "#,
        )
        .unwrap();

        assert_eq!(limits.max_tab_count, 3);
        assert_eq!(limits.hard_memory_ceiling_mb, 150.0);
        assert!(!limits.auto_evict_enabled);
        // Unspecified fields fall back to defaults
        assert_eq!(limits.sample_interval_ms, DEFAULT_SAMPLE_INTERVAL_MS);
        assert_eq!(limits.score.memory_span_mb, 39.0);
        assert_eq!(limits.score.memory_weight, 0.4);
    }

    #[test]
    fn test_from_toml_rejects_invalid() {
        let result = ResourceLimits::from_toml_str(
            r#"
            hard_memory_ceiling_mb = 50.0
            warning_memory_threshold_mb = 80.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::WarningAboveCeiling { .. })));

        let result = ResourceLimits::from_toml_str("max_tab_count = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_toml_file() {
        let path = std::env::temp_dir().join(format!("tabward-limits-{}.toml", std::process::id()));
        fs::write(&path, "max_tab_count = 6\nsample_timeout_ms = 250\n").unwrap();

        let limits = ResourceLimits::from_toml_file(&path);
        let _ = fs::remove_file(&path);

        let limits = limits.unwrap();
        assert_eq!(limits.max_tab_count, 6);
        assert_eq!(limits.sample_timeout(), Duration::from_millis(250));
        assert_eq!(limits.hard_memory_ceiling_mb, DEFAULT_HARD_CEILING_MB);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("tabward-no-such-limits.toml");
        assert!(matches!(
            ResourceLimits::from_toml_file(path),
            Err(ConfigError::Io(_))
        ));
    }
}
