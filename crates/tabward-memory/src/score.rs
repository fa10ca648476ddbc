//! Health scoring.
//!
//! A tab's health score combines four components, each clamped to 0-100:
//!
//! | Component    | Default weight | 100 at            | 0 at        |
//! |--------------|----------------|-------------------|-------------|
//! | Memory       | 0.4            | <= 1 MB           | >= 20 MB    |
//! | Load latency | 0.3            | 0 ms              | >= 10 s     |
//! | Recency      | 0.2            | just activated    | >= 1 hour   |
//! | Active state | 0.1            | active            | (30 if not) |
//!
//! The load-latency component is only counted once a load duration has been
//! sampled; the weights of the components that are present are renormalized
//! to sum to 1.0.

use crate::ledger::TabRecord;
use crate::limits::ScoreTuning;
use std::time::{Duration, Instant};

/// Per-component values before weighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub memory: f64,
    pub load: Option<f64>,
    pub recency: f64,
    pub active_state: f64,
}

/// Converts raw tab signals into a 0-100 health score.
#[derive(Debug, Clone, Default)]
pub struct ScoreCalculator {
    tuning: ScoreTuning,
}

impl ScoreCalculator {
    pub fn new(tuning: ScoreTuning) -> Self {
        Self { tuning }
    }

    /// Score a tab as of `now`.
    pub fn score(&self, tab: &TabRecord, now: Instant) -> u8 {
        self.combine(&self.breakdown(tab, now))
    }

    /// Compute the individual components for a tab.
    pub fn breakdown(&self, tab: &TabRecord, now: Instant) -> ScoreBreakdown {
        let since_activation = now.saturating_duration_since(tab.last_activated_at);
        ScoreBreakdown {
            memory: self.memory_component(tab.memory_mb),
            load: tab.load_duration_ms.map(|ms| self.load_component(ms)),
            recency: self.recency_component(since_activation),
            active_state: self.active_component(tab.is_active),
        }
    }

    /// Weighted sum over the available components, rounded to an integer.
    pub fn combine(&self, breakdown: &ScoreBreakdown) -> u8 {
        let t = &self.tuning;
        let parts = [
            Some((breakdown.memory, t.memory_weight)),
            breakdown.load.map(|load| (load, t.load_weight)),
            Some((breakdown.recency, t.recency_weight)),
            Some((breakdown.active_state, t.active_weight)),
        ];

        let (weighted, total_weight) = parts
            .iter()
            .flatten()
            .fold((0.0, 0.0), |(sum, weights), (value, weight)| {
                (sum + value * weight, weights + weight)
            });

        if total_weight <= 0.0 {
            return 0;
        }

        (weighted / total_weight).round().clamp(0.0, 100.0) as u8
    }

    fn memory_component(&self, memory_mb: f64) -> f64 {
        let t = &self.tuning;
        100.0 - clamp_pct((memory_mb - t.memory_floor_mb) / t.memory_span_mb * 100.0)
    }

    fn load_component(&self, duration_ms: f64) -> f64 {
        100.0 - clamp_pct(duration_ms / self.tuning.load_span_ms * 100.0)
    }

    fn recency_component(&self, since_activation: Duration) -> f64 {
        100.0 - clamp_pct(since_activation.as_secs_f64() / self.tuning.recency_span_secs * 100.0)
    }

    fn active_component(&self, is_active: bool) -> f64 {
        if is_active {
            100.0
        } else {
            self.tuning.inactive_state_score
        }
    }
}

/// Clamp to 0-100. NaN counts as the worst case.
fn clamp_pct(value: f64) -> f64 {
    if value.is_nan() {
        100.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
