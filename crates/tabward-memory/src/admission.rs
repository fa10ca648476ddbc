//! Admission control for new tabs.

use crate::ledger::ResourceLedger;
use crate::limits::ResourceLimits;
use serde::Serialize;
use thiserror::Error;

/// Why a new tab was refused.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum DenialReason {
    #[error("Too many tabs open ({current} of {max}); close a tab first")]
    TooManyTabs { current: usize, max: usize },

    #[error("Over memory budget ({aggregate_mb:.1} MB of {ceiling_mb:.1} MB); free memory first")]
    OverMemoryBudget { aggregate_mb: f64, ceiling_mb: f64 },
}

/// Suggested way out of a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Remediation {
    /// Reclaim inactive tabs to get back under the memory budget
    EvictInactive,
    /// Ask the user to pick a tab to close
    CloseSpecificTab,
}

impl DenialReason {
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::TooManyTabs { .. } => Remediation::CloseSpecificTab,
            Self::OverMemoryBudget { .. } => Remediation::EvictInactive,
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub reason: Option<DenialReason>,
}

impl AdmissionDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn into_result(self) -> Result<(), DenialReason> {
        match self.reason {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

/// Decides whether another tab may be created.
pub struct AdmissionController;

impl AdmissionController {
    /// Check both hard gates: tab count first, then aggregate memory.
    pub fn can_admit(ledger: &ResourceLedger, limits: &ResourceLimits) -> AdmissionDecision {
        let current = ledger.len();
        if current >= limits.max_tab_count {
            return AdmissionDecision::deny(DenialReason::TooManyTabs {
                current,
                max: limits.max_tab_count,
            });
        }

        let aggregate_mb = ledger.aggregate_memory();
        if aggregate_mb > limits.hard_memory_ceiling_mb {
            return AdmissionDecision::deny(DenialReason::OverMemoryBudget {
                aggregate_mb,
                ceiling_mb: limits.hard_memory_ceiling_mb,
            });
        }

        AdmissionDecision::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TabSignals;
    use crate::tab_id::TabId;

    #[test]
    fn test_tab_count_gate() {
        let limits = ResourceLimits {
            max_tab_count: 2,
            ..Default::default()
        };
        let mut ledger = ResourceLedger::new();

        assert!(AdmissionController::can_admit(&ledger, &limits).is_allowed());
        ledger.upsert(TabId(1), TabSignals::new(0.0));
        assert!(AdmissionController::can_admit(&ledger, &limits).is_allowed());
        ledger.upsert(TabId(2), TabSignals::new(0.0));

        let decision = AdmissionController::can_admit(&ledger, &limits);
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason,
            Some(DenialReason::TooManyTabs { current: 2, max: 2 })
        );
    }

    #[test]
    fn test_memory_gate() {
        let limits = ResourceLimits {
            max_tab_count: 5,
            hard_memory_ceiling_mb: 100.0,
            warning_memory_threshold_mb: 80.0,
            ..Default::default()
        };
        let mut ledger = ResourceLedger::new();
        ledger.upsert(TabId(1), TabSignals::new(60.0));
        ledger.upsert(TabId(2), TabSignals::new(60.0));

        let decision = AdmissionController::can_admit(&ledger, &limits);
        assert!(!decision.allowed);
        let reason = decision.reason.clone().unwrap();
        assert!(matches!(reason, DenialReason::OverMemoryBudget { .. }));
        assert_eq!(reason.remediation(), Remediation::EvictInactive);
        assert!(decision.into_result().is_err());
    }

    #[test]
    fn test_exactly_at_ceiling_is_admitted() {
        let limits = ResourceLimits {
            hard_memory_ceiling_mb: 100.0,
            warning_memory_threshold_mb: 80.0,
            ..Default::default()
        };
        let mut ledger = ResourceLedger::new();
        ledger.upsert(TabId(1), TabSignals::new(100.0));

        assert!(AdmissionController::can_admit(&ledger, &limits).is_allowed());
    }

    #[test]
    fn test_count_gate_wins_over_memory() {
        let limits = ResourceLimits {
            max_tab_count: 1,
            hard_memory_ceiling_mb: 10.0,
            warning_memory_threshold_mb: 5.0,
            ..Default::default()
        };
        let mut ledger = ResourceLedger::new();
        ledger.upsert(TabId(1), TabSignals::new(50.0));

        let reason = AdmissionController::can_admit(&ledger, &limits).reason.unwrap();
        assert_eq!(reason.remediation(), Remediation::CloseSpecificTab);
        assert!(reason.to_string().contains("Too many tabs"));
    }
}
