//! Observer-facing snapshots and notifications.

use crate::tab::TabState;
use serde::Serialize;
use tabward_memory::{PressureLevel, ProbeError, TabId};

/// Display view of one tracked tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabSnapshot {
    pub id: TabId,
    pub state: TabState,
    pub memory_mb: f64,
    pub load_duration_ms: Option<f64>,
    pub health_score: u8,
    pub is_active: bool,
    /// Time since the tab was last activated (or created)
    pub since_activated_ms: u64,
}

/// Display view of the whole manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerSnapshot {
    /// Tracked tabs, ordered by id
    pub tabs: Vec<TabSnapshot>,
    pub aggregate_memory_mb: f64,
    pub is_over_warning: bool,
    pub pressure: PressureLevel,
    /// Highest aggregate memory seen by any check cycle
    pub peak_aggregate_mb: f64,
    pub active_tab: Option<TabId>,
}

/// Notifications sent to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    /// A check cycle finished
    CycleCompleted(ManagerSnapshot),
    /// A tab was reclaimed by automatic eviction
    TabEvicted { tab_id: TabId, freed_mb: f64 },
    /// A tab was released (by any path)
    TabReleased { tab_id: TabId },
    /// Memory is still over target and automatic eviction has no next move
    PressurePersists { unresolved_mb: f64 },
    /// A probe sample failed; the previous value was kept
    SampleFailed { tab_id: TabId, error: ProbeError },
}

/// Result of one `run_check_cycle` call.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Another cycle was in flight; nothing was done
    Skipped,
    Completed(CycleReport),
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// What a completed check cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// State after sampling, scoring and eviction
    pub snapshot: ManagerSnapshot,
    /// Tabs released by automatic eviction, in order
    pub evicted: Vec<TabId>,
    /// Tabs whose sample failed this cycle
    pub failed_samples: Vec<TabId>,
    /// Megabytes still above the eviction target, if pressure persists
    pub pressure_persists: Option<f64>,
}
