//! Simulation scenario loaded from TOML.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tabward_memory::ResourceLimits;

/// One simulated tab.
#[derive(Debug, Clone, Deserialize)]
pub struct SimTab {
    /// Footprint at the first sample
    pub start_mb: f64,
    /// Growth per sample
    #[serde(default)]
    pub growth_mb: f64,
    /// Reported load duration, if the tab has finished loading
    #[serde(default)]
    pub load_ms: Option<f64>,
    /// Open this tab in the foreground
    #[serde(default)]
    pub active: bool,
}

/// Limits plus the tabs to open.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Number of check periods to run
    #[serde(default = "default_cycles")]
    pub cycles: u32,
    #[serde(default)]
    pub limits: ResourceLimits,
    #[serde(default)]
    pub tabs: Vec<SimTab>,
}

fn default_cycles() -> u32 {
    5
}

impl Scenario {
    /// Load and validate a scenario file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("loading scenario {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(text)?;
        scenario.limits.validate()?;
        Ok(scenario)
    }
}

impl Default for Scenario {
    /// Four tabs that outgrow a 150 MB ceiling within a few cycles.
    fn default() -> Self {
        let tab = |start_mb, growth_mb, load_ms, active| SimTab {
            start_mb,
            growth_mb,
            load_ms,
            active,
        };

        Self {
            cycles: default_cycles(),
            limits: ResourceLimits {
                max_tab_count: 4,
                hard_memory_ceiling_mb: 150.0,
                warning_memory_threshold_mb: 100.0,
                sample_interval_ms: 500,
                sample_timeout_ms: 200,
                auto_evict_enabled: true,
                ..Default::default()
            },
            tabs: vec![
                tab(40.0, 2.0, Some(900.0), true),
                tab(30.0, 6.0, Some(4_500.0), false),
                tab(25.0, 1.0, None, false),
                tab(8.0, 0.5, Some(300.0), false),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario_is_valid() {
        let scenario = Scenario::default();
        assert!(scenario.limits.validate().is_ok());
        assert_eq!(scenario.tabs.iter().filter(|t| t.active).count(), 1);
    }

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_toml_str(
            r#"
            cycles = 3

            [limits]
            max_tab_count = 2
            hard_memory_ceiling_mb = 80.0
            warning_memory_threshold_mb = 60.0

            [[tabs]]
            start_mb = 30.0
            growth_mb = 5.0
            active = true

            [[tabs]]
            start_mb = 20.0
            load_ms = 1200.0
            "#,
        )
        .unwrap();

        assert_eq!(scenario.cycles, 3);
        assert_eq!(scenario.limits.max_tab_count, 2);
        assert_eq!(scenario.tabs.len(), 2);
        assert_eq!(scenario.tabs[1].growth_mb, 0.0);
        assert_eq!(scenario.tabs[1].load_ms, Some(1200.0));
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let result = Scenario::from_toml_str(
            r#"
            [limits]
            hard_memory_ceiling_mb = 50.0
            warning_memory_threshold_mb = 90.0
            "#,
        );
        assert!(result.is_err());
    }
}
