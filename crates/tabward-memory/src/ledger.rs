//! Resource ledger: the table of tracked tabs and their latest signals.
//!
//! Aggregate memory is always recomputed from the tab table rather than
//! kept as a running counter, so partial updates and missed removals can
//! never make it drift.

use crate::limits::ResourceLimits;
use crate::tab_id::TabId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Score given to a tab before its first check cycle.
const INITIAL_HEALTH_SCORE: u8 = 100;

/// Signals reported for a tab by one probe sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TabSignals {
    /// Estimated footprint in megabytes
    pub memory_mb: f64,
    /// Load duration, if the frame has finished a load
    pub load_duration_ms: Option<f64>,
}

impl TabSignals {
    pub fn new(memory_mb: f64) -> Self {
        Self {
            memory_mb,
            load_duration_ms: None,
        }
    }

    pub fn with_load_duration(mut self, load_duration_ms: f64) -> Self {
        self.load_duration_ms = Some(load_duration_ms);
        self
    }
}

/// One tracked tab.
#[derive(Debug, Clone)]
pub struct TabRecord {
    pub id: TabId,
    /// Last sampled footprint in megabytes
    pub memory_mb: f64,
    /// Last sampled load duration
    pub load_duration_ms: Option<f64>,
    /// Last transition into the active state (creation time until then)
    pub last_activated_at: Instant,
    pub is_active: bool,
    /// Composite health score, 0 (worst) to 100 (best)
    pub health_score: u8,
}

/// Aggregate memory pressure relative to the configured limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PressureLevel {
    /// At or below the warning threshold
    Normal,
    /// Above the warning threshold, at or below the hard ceiling
    Warning,
    /// Above the hard ceiling
    Critical,
}

impl PressureLevel {
    /// Determine pressure level from aggregate memory and limits
    pub fn from_usage(aggregate_mb: f64, limits: &ResourceLimits) -> Self {
        if aggregate_mb > limits.hard_memory_ceiling_mb {
            Self::Critical
        } else if aggregate_mb > limits.warning_memory_threshold_mb {
            Self::Warning
        } else {
            Self::Normal
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning (approaching memory ceiling)",
            Self::Critical => "Critical (over memory ceiling)",
        }
    }
}

/// Authoritative table of tracked tabs.
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    tabs: HashMap<TabId, TabRecord>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tab or replace its sampled signals.
    ///
    /// A sample without a load duration keeps the previously recorded one.
    pub fn upsert(&mut self, id: TabId, signals: TabSignals) {
        match self.tabs.get_mut(&id) {
            Some(record) => {
                record.memory_mb = signals.memory_mb;
                if signals.load_duration_ms.is_some() {
                    record.load_duration_ms = signals.load_duration_ms;
                }
            }
            None => {
                self.tabs.insert(
                    id,
                    TabRecord {
                        id,
                        memory_mb: signals.memory_mb,
                        load_duration_ms: signals.load_duration_ms,
                        last_activated_at: Instant::now(),
                        is_active: false,
                        health_score: INITIAL_HEALTH_SCORE,
                    },
                );
            }
        }
    }

    /// Remove a tab, returning its last record.
    pub fn remove(&mut self, id: TabId) -> Option<TabRecord> {
        self.tabs.remove(&id)
    }

    pub fn get(&self, id: TabId) -> Option<&TabRecord> {
        self.tabs.get(&id)
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.tabs.contains_key(&id)
    }

    /// All tracked tabs, in no particular order.
    pub fn all(&self) -> impl Iterator<Item = &TabRecord> {
        self.tabs.values()
    }

    pub fn ids(&self) -> Vec<TabId> {
        self.tabs.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// The currently active tab, if any.
    pub fn active_tab(&self) -> Option<TabId> {
        self.tabs.values().find(|t| t.is_active).map(|t| t.id)
    }

    /// Store a freshly computed health score.
    pub fn set_score(&mut self, id: TabId, score: u8) -> bool {
        match self.tabs.get_mut(&id) {
            Some(record) => {
                record.health_score = score.min(100);
                true
            }
            None => false,
        }
    }

    /// Flip the active flag. Activation also stamps `last_activated_at`.
    ///
    /// Callers are responsible for keeping at most one tab active.
    pub fn set_active(&mut self, id: TabId, active: bool, now: Instant) -> bool {
        match self.tabs.get_mut(&id) {
            Some(record) => {
                record.is_active = active;
                if active {
                    record.last_activated_at = now;
                }
                true
            }
            None => false,
        }
    }

    /// Sum of all tracked footprints, recomputed on every call.
    pub fn aggregate_memory(&self) -> f64 {
        self.tabs.values().map(|t| t.memory_mb).sum()
    }

    pub fn is_over_warning_threshold(&self, limits: &ResourceLimits) -> bool {
        self.aggregate_memory() > limits.warning_memory_threshold_mb
    }

    pub fn is_over_hard_ceiling(&self, limits: &ResourceLimits) -> bool {
        self.aggregate_memory() > limits.hard_memory_ceiling_mb
    }

    pub fn pressure_level(&self, limits: &ResourceLimits) -> PressureLevel {
        PressureLevel::from_usage(self.aggregate_memory(), limits)
    }
}
