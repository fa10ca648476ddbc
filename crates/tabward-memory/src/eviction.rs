//! Eviction planning under memory pressure.

use crate::ledger::{ResourceLedger, TabRecord};
use crate::tab_id::TabId;

/// Ordered list of tabs to reclaim, plus the expected effect.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvictionPlan {
    /// Tabs to release, worst first
    pub tab_ids: Vec<TabId>,
    /// Memory the plan frees if every release succeeds
    pub freed_mb: f64,
    /// Aggregate memory after the plan
    pub projected_mb: f64,
    /// Ceiling the plan aimed for
    pub target_mb: f64,
}

impl EvictionPlan {
    pub fn is_empty(&self) -> bool {
        self.tab_ids.is_empty()
    }

    /// Whether the plan brings aggregate memory to or below the target.
    pub fn is_sufficient(&self) -> bool {
        self.projected_mb <= self.target_mb
    }

    /// Memory still above target once the plan is carried out.
    pub fn unresolved_mb(&self) -> f64 {
        (self.projected_mb - self.target_mb).max(0.0)
    }
}

/// Picks the least valuable inactive tabs to reclaim.
pub struct EvictionPlanner;

impl EvictionPlanner {
    /// Plan enough evictions to bring the ledger to `target_ceiling_mb`.
    ///
    /// Only inactive tabs are candidates. They are taken in ascending
    /// health-score order until the target is met; if candidates run out
    /// first, the partial plan is returned and `is_sufficient()` is false.
    pub fn plan_eviction(ledger: &ResourceLedger, target_ceiling_mb: f64) -> EvictionPlan {
        Self::plan_eviction_excluding(ledger, target_ceiling_mb, &[])
    }

    /// Like [`plan_eviction`](Self::plan_eviction), for a ledger where the
    /// `reclaiming` tabs are already being torn down.
    ///
    /// Those tabs are never candidates and their memory counts as freed.
    pub fn plan_eviction_excluding(
        ledger: &ResourceLedger,
        target_ceiling_mb: f64,
        reclaiming: &[TabId],
    ) -> EvictionPlan {
        let in_flight_mb: f64 = reclaiming
            .iter()
            .filter_map(|&id| ledger.get(id))
            .map(|t| t.memory_mb)
            .sum();
        let aggregate = ledger.aggregate_memory() - in_flight_mb;

        let mut candidates: Vec<&TabRecord> = ledger
            .all()
            .filter(|t| !t.is_active && !reclaiming.contains(&t.id))
            .collect();
        // Stable: equal scores keep ledger iteration order
        candidates.sort_by_key(|t| t.health_score);

        let mut plan = EvictionPlan {
            target_mb: target_ceiling_mb,
            ..Default::default()
        };

        for tab in candidates {
            if aggregate - plan.freed_mb <= target_ceiling_mb {
                break;
            }
            plan.tab_ids.push(tab.id);
            plan.freed_mb += tab.memory_mb;
        }

        plan.projected_mb = aggregate - plan.freed_mb;
        plan
    }

    /// Every tab ordered for a manual "close a tab" prompt.
    ///
    /// Worst score first; the active tab always comes last.
    pub fn manual_candidates(ledger: &ResourceLedger) -> Vec<TabId> {
        let mut tabs: Vec<&TabRecord> = ledger.all().collect();
        tabs.sort_by(|a, b| {
            a.is_active
                .cmp(&b.is_active)
                .then(a.health_score.cmp(&b.health_score))
                .then(b.memory_mb.total_cmp(&a.memory_mb))
        });
        tabs.into_iter().map(|t| t.id).collect()
    }
}
