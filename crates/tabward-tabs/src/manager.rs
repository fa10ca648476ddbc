//! Resource manager - admission, activation, release and check cycles.
//!
//! The manager owns the ledger outright; callers only ever see snapshots.
//! Every teardown, whether requested by the user or chosen by eviction,
//! goes through [`ResourceManager::release`].

use crate::event::{CycleOutcome, CycleReport, ManagerEvent, ManagerSnapshot, TabSnapshot};
use crate::scheduler::{spawn_scheduler, CheckScheduler};
use crate::tab::TabState;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tabward_memory::{
    AdmissionController, AdmissionDecision, ConfigError, DenialReason, EvictionPlanner, FrameHost,
    ProbeError, ProbeSample, ResourceLedger, ResourceLimits, ResourceProbe, ScoreCalculator,
    TabId, TabRecord, TabSignals,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Resource manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Invalid limits: {0}")]
    Config(#[from] ConfigError),

    #[error("Admission denied: {0}")]
    AdmissionDenied(#[from] DenialReason),
}

/// Why a release could not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReleaseBlocked {
    NotTracked,
    InFlight,
    Active,
}

impl fmt::Display for ReleaseBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotTracked => write!(f, "not live"),
            Self::InFlight => write!(f, "already being released"),
            Self::Active => write!(f, "is active"),
        }
    }
}

/// Everything guarded by the state lock.
#[derive(Default)]
struct ManagerState {
    ledger: ResourceLedger,
    states: HashMap<TabId, TabState>,
    peak_aggregate_mb: f64,
}

/// Admission-and-eviction controller for hosted tabs.
pub struct ResourceManager<P, H> {
    limits: ResourceLimits,
    scorer: ScoreCalculator,
    probe: Arc<P>,
    host: Arc<H>,
    state: Mutex<ManagerState>,
    /// Held for the duration of a check cycle
    cycle_guard: Mutex<()>,
    next_id: AtomicU64,
    subscribers: std::sync::Mutex<Vec<Sender<ManagerEvent>>>,
}

impl<P: ResourceProbe, H: FrameHost> ResourceManager<P, H> {
    /// Create a manager after validating `limits`.
    pub fn new(limits: ResourceLimits, probe: Arc<P>, host: Arc<H>) -> Result<Self, ManagerError> {
        limits.validate()?;
        info!(
            max_tabs = limits.max_tab_count,
            ceiling_mb = limits.hard_memory_ceiling_mb,
            warning_mb = limits.warning_memory_threshold_mb,
            "Initializing resource manager"
        );

        Ok(Self {
            scorer: ScoreCalculator::new(limits.score.clone()),
            limits,
            probe,
            host,
            state: Mutex::new(ManagerState::default()),
            cycle_guard: Mutex::new(()),
            next_id: AtomicU64::new(1),
            subscribers: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Ask whether a new frame may be materialized.
    pub async fn request_create(&self) -> AdmissionDecision {
        let state = self.state.lock().await;
        let decision = AdmissionController::can_admit(&state.ledger, &self.limits);
        if let Some(reason) = &decision.reason {
            info!("Tab creation refused: {}", reason);
        }
        decision
    }

    /// Start tracking a newly materialized frame.
    ///
    /// Admission is re-checked under the lock, so a caller racing another
    /// creation can still be refused here.
    pub async fn track(&self) -> Result<TabId, ManagerError> {
        let mut state = self.state.lock().await;
        AdmissionController::can_admit(&state.ledger, &self.limits).into_result()?;

        let tab_id = TabId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        state.ledger.upsert(tab_id, TabSignals::default());
        state.states.insert(tab_id, TabState::Created);

        info!(tab_id = %tab_id, tabs = state.ledger.len(), "Tracking new tab");
        Ok(tab_id)
    }

    /// Make `tab_id` the active tab, deactivating the previous one.
    pub async fn activate(&self, tab_id: TabId) -> bool {
        let mut state = self.state.lock().await;
        if !state.can_move(tab_id, TabState::Active) {
            return false;
        }

        let now = Instant::now();
        if let Some(previous) = state.ledger.active_tab().filter(|&prev| prev != tab_id) {
            state.ledger.set_active(previous, false, now);
            state.states.insert(previous, TabState::Inactive);
            debug!(tab_id = %previous, "Deactivated previous tab");
        }

        state.ledger.set_active(tab_id, true, now);
        state.states.insert(tab_id, TabState::Active);
        debug!(tab_id = %tab_id, "Activated tab");
        true
    }

    /// Move `tab_id` to the background.
    pub async fn deactivate(&self, tab_id: TabId) -> bool {
        let mut state = self.state.lock().await;
        if !state.can_move(tab_id, TabState::Inactive) {
            return false;
        }

        state.ledger.set_active(tab_id, false, Instant::now());
        state.states.insert(tab_id, TabState::Inactive);
        debug!(tab_id = %tab_id, "Deactivated tab");
        true
    }

    /// Tear a tab down: discard its frame, then drop its ledger entry.
    ///
    /// Returns `false` if the tab is unknown, already released, or already
    /// being released by another caller.
    pub async fn release(&self, tab_id: TabId) -> bool {
        match self.begin_release(tab_id, false).await {
            Ok(_) => self.finish_release(tab_id).await.is_some(),
            Err(blocked) => {
                debug!(tab_id = %tab_id, "Release ignored, tab {}", blocked);
                false
            }
        }
    }

    /// Mark a tab `Evicting` and return its current footprint.
    ///
    /// With `inactive_only`, a tab that is currently active is refused.
    async fn begin_release(&self, tab_id: TabId, inactive_only: bool) -> Result<f64, ReleaseBlocked> {
        let mut state = self.state.lock().await;
        match state.states.get(&tab_id) {
            None => return Err(ReleaseBlocked::NotTracked),
            Some(TabState::Evicting) => return Err(ReleaseBlocked::InFlight),
            Some(TabState::Active) if inactive_only => return Err(ReleaseBlocked::Active),
            Some(current) if !current.can_transition_to(TabState::Evicting) => {
                return Err(ReleaseBlocked::NotTracked);
            }
            Some(_) => {}
        }

        state.states.insert(tab_id, TabState::Evicting);
        Ok(state.ledger.get(tab_id).map_or(0.0, |t| t.memory_mb))
    }

    async fn finish_release(&self, tab_id: TabId) -> Option<TabRecord> {
        if let Err(e) = self.host.discard(tab_id).await {
            warn!(tab_id = %tab_id, "Frame teardown failed: {}", e);
        }

        let removed = {
            let mut state = self.state.lock().await;
            state.states.remove(&tab_id);
            state.ledger.remove(tab_id)
        };

        if let Some(record) = &removed {
            info!(tab_id = %tab_id, freed_mb = record.memory_mb, "Released tab");
            self.emit(ManagerEvent::TabReleased { tab_id });
        }
        removed
    }

    /// Release every tracked tab.
    pub async fn dispose(&self) {
        let ids = self.state.lock().await.ledger.ids();
        info!(tabs = ids.len(), "Disposing resource manager");
        for tab_id in ids {
            self.release(tab_id).await;
        }
    }

    /// Lifecycle state of a tab. Ids this manager issued but no longer
    /// tracks report `Released`.
    pub async fn tab_state(&self, tab_id: TabId) -> Option<TabState> {
        let state = self.state.lock().await;
        match state.states.get(&tab_id) {
            Some(s) => Some(*s),
            None if tab_id.get() > 0 && tab_id.get() < self.next_id.load(Ordering::Relaxed) => {
                Some(TabState::Released)
            }
            None => None,
        }
    }

    /// Current display view.
    pub async fn snapshot(&self) -> ManagerSnapshot {
        let state = self.state.lock().await;
        self.build_snapshot(&state)
    }

    /// Tabs ordered for a manual "close a tab" prompt, active tab last.
    pub async fn manual_eviction_candidates(&self) -> Vec<TabId> {
        let state = self.state.lock().await;
        EvictionPlanner::manual_candidates(&state.ledger)
    }

    /// Receive notifications for every subsequent event.
    pub fn subscribe(&self) -> Receiver<ManagerEvent> {
        let (tx, rx) = unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    /// Start running check cycles every `sample_interval_ms`.
    pub fn start(self: &Arc<Self>) -> CheckScheduler {
        spawn_scheduler(Arc::clone(self))
    }

    /// Sample, rescore and, if needed, evict.
    ///
    /// Only one cycle runs at a time; a call that arrives while another is
    /// in flight returns [`CycleOutcome::Skipped`].
    pub async fn run_check_cycle(&self) -> CycleOutcome {
        let Ok(_cycle) = self.cycle_guard.try_lock() else {
            debug!("Check cycle already in flight, skipping");
            return CycleOutcome::Skipped;
        };

        // Sample without holding the state lock
        let ids: Vec<TabId> = {
            let state = self.state.lock().await;
            state
                .states
                .iter()
                .filter(|(_, s)| s.is_live())
                .map(|(id, _)| *id)
                .collect()
        };
        let samples = self.sample_all(&ids).await;

        let mut failed_samples = Vec::new();
        let plan = {
            let mut state = self.state.lock().await;

            for (tab_id, result) in samples {
                match result.and_then(ProbeSample::into_signals) {
                    Ok(signals) => {
                        // Released while we were sampling
                        if state.ledger.contains(tab_id) {
                            state.ledger.upsert(tab_id, signals);
                        }
                    }
                    Err(error) => {
                        warn!(tab_id = %tab_id, "Sample failed, keeping previous value: {}", error);
                        failed_samples.push(tab_id);
                        self.emit(ManagerEvent::SampleFailed { tab_id, error });
                    }
                }
            }

            let now = Instant::now();
            let scores: Vec<(TabId, u8)> = state
                .ledger
                .all()
                .map(|tab| (tab.id, self.scorer.score(tab, now)))
                .collect();
            for (tab_id, score) in scores {
                state.ledger.set_score(tab_id, score);
            }

            let aggregate = state.ledger.aggregate_memory();
            state.peak_aggregate_mb = state.peak_aggregate_mb.max(aggregate);
            debug!(
                aggregate_mb = aggregate,
                tabs = state.ledger.len(),
                "Check cycle sampled"
            );

            if state.ledger.is_over_hard_ceiling(&self.limits) {
                warn!(
                    aggregate_mb = aggregate,
                    ceiling_mb = self.limits.hard_memory_ceiling_mb,
                    "Aggregate memory over hard ceiling"
                );
                if self.limits.auto_evict_enabled {
                    let reclaiming: Vec<TabId> = state
                        .states
                        .iter()
                        .filter(|(_, s)| **s == TabState::Evicting)
                        .map(|(id, _)| *id)
                        .collect();
                    Some(EvictionPlanner::plan_eviction_excluding(
                        &state.ledger,
                        self.limits.warning_memory_threshold_mb,
                        &reclaiming,
                    ))
                } else {
                    None
                }
            } else {
                None
            }
        };

        let mut evicted = Vec::new();
        if let Some(plan) = &plan {
            info!(
                tabs = plan.tab_ids.len(),
                freed_mb = plan.freed_mb,
                target_mb = plan.target_mb,
                "Evicting tabs"
            );
            for &tab_id in &plan.tab_ids {
                match self.begin_release(tab_id, true).await {
                    Ok(freed_mb) => {
                        if self.finish_release(tab_id).await.is_some() {
                            evicted.push(tab_id);
                            self.emit(ManagerEvent::TabEvicted { tab_id, freed_mb });
                        }
                    }
                    // Closed since planning, or a close is already under way
                    Err(ReleaseBlocked::NotTracked | ReleaseBlocked::InFlight) => continue,
                    Err(ReleaseBlocked::Active) => {
                        warn!(tab_id = %tab_id, "Planned tab is now active, stopping eviction");
                        break;
                    }
                }
            }
        }

        let snapshot = self.snapshot().await;
        // Memory held by tabs another caller is still tearing down
        let reclaiming_mb: f64 = snapshot
            .tabs
            .iter()
            .filter(|t| t.state == TabState::Evicting)
            .map(|t| t.memory_mb)
            .sum();
        let remaining_mb = snapshot.aggregate_memory_mb - reclaiming_mb;
        let over_warning = remaining_mb > self.limits.warning_memory_threshold_mb;
        let over_ceiling = remaining_mb > self.limits.hard_memory_ceiling_mb;
        let pressure_persists = match &plan {
            Some(_) if over_warning => Some(remaining_mb - self.limits.warning_memory_threshold_mb),
            None if over_ceiling => Some(remaining_mb - self.limits.warning_memory_threshold_mb),
            _ => None,
        };

        if let Some(unresolved_mb) = pressure_persists {
            warn!(unresolved_mb, "Memory pressure persists after automatic eviction");
            self.emit(ManagerEvent::PressurePersists { unresolved_mb });
        }

        self.emit(ManagerEvent::CycleCompleted(snapshot.clone()));

        CycleOutcome::Completed(CycleReport {
            snapshot,
            evicted,
            failed_samples,
            pressure_persists,
        })
    }

    /// Sample every tab concurrently under the soft timeout.
    async fn sample_all(&self, ids: &[TabId]) -> Vec<(TabId, Result<ProbeSample, ProbeError>)> {
        let timeout = self.limits.sample_timeout();
        let mut tasks = JoinSet::new();

        for &tab_id in ids {
            let probe = Arc::clone(&self.probe);
            tasks.spawn(async move {
                let result = match tokio::time::timeout(timeout, probe.sample(tab_id)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProbeError::Timeout(timeout)),
                };
                (tab_id, result)
            });
        }

        let mut pending: HashSet<TabId> = ids.iter().copied().collect();
        let mut results = Vec::with_capacity(ids.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((tab_id, result)) => {
                    pending.remove(&tab_id);
                    results.push((tab_id, result));
                }
                Err(e) => warn!("Probe task failed: {}", e),
            }
        }

        // Tasks that panicked never reported back
        for tab_id in pending {
            results.push((
                tab_id,
                Err(ProbeError::Unavailable("probe task aborted".to_string())),
            ));
        }

        results
    }

    fn build_snapshot(&self, state: &ManagerState) -> ManagerSnapshot {
        let now = Instant::now();
        let mut tabs: Vec<TabSnapshot> = state
            .ledger
            .all()
            .map(|tab| TabSnapshot {
                id: tab.id,
                state: state.states.get(&tab.id).copied().unwrap_or(TabState::Created),
                memory_mb: tab.memory_mb,
                load_duration_ms: tab.load_duration_ms,
                health_score: tab.health_score,
                is_active: tab.is_active,
                since_activated_ms: saturating_millis(
                    now.saturating_duration_since(tab.last_activated_at),
                ),
            })
            .collect();
        tabs.sort_by_key(|t| t.id);

        ManagerSnapshot {
            tabs,
            aggregate_memory_mb: state.ledger.aggregate_memory(),
            is_over_warning: state.ledger.is_over_warning_threshold(&self.limits),
            pressure: state.ledger.pressure_level(&self.limits),
            peak_aggregate_mb: state.peak_aggregate_mb,
            active_tab: state.ledger.active_tab(),
        }
    }

    fn emit(&self, event: ManagerEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

/// Whole milliseconds in `duration`, capped at `u64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl ManagerState {
    fn can_move(&self, tab_id: TabId, next: TabState) -> bool {
        self.states
            .get(&tab_id)
            .is_some_and(|current| current.can_transition_to(next))
    }
}
