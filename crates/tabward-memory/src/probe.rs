//! Collaborator contracts for the frame-hosting layer.
//!
//! The manager never inspects hosted frames itself. It asks a
//! [`ResourceProbe`] for samples and tells a [`FrameHost`] to tear frames
//! down; both may be the same object.

use crate::ledger::TabSignals;
use crate::tab_id::TabId;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// One resource sample for a hosted frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSample {
    /// Estimated footprint in megabytes
    pub memory_mb: f64,
    /// Duration of the last completed load, once known
    pub load_duration_ms: Option<f64>,
}

impl ProbeSample {
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

    /// Reject estimates that cannot be used for ranking.
    ///
    /// A negative or non-finite load duration is dropped rather than failing
    /// the whole sample.
    pub fn into_signals(self) -> Result<TabSignals, ProbeError> {
        if !self.memory_mb.is_finite() || self.memory_mb < 0.0 {
            return Err(ProbeError::InvalidEstimate(self.memory_mb));
        }
        Ok(TabSignals {
            memory_mb: self.memory_mb,
            load_duration_ms: self
                .load_duration_ms
                .filter(|ms| ms.is_finite() && *ms >= 0.0),
        })
    }
}

/// Probe errors. All of them mean "no update this cycle".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    #[error("No hosted frame for {0}")]
    UnknownTab(TabId),

    #[error("Probe unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid memory estimate: {0}")]
    InvalidEstimate(f64),

    #[error("Sample timed out after {0:?}")]
    Timeout(Duration),
}

/// Frame teardown errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("No hosted frame for {0}")]
    UnknownTab(TabId),

    #[error("Teardown failed: {0}")]
    Teardown(String),
}

/// Supplies per-tab resource samples.
pub trait ResourceProbe: Send + Sync + 'static {
    /// Sample the frame hosted for `tab_id`.
    fn sample(&self, tab_id: TabId) -> impl Future<Output = Result<ProbeSample, ProbeError>> + Send;
}

/// Tears down hosted frames.
pub trait FrameHost: Send + Sync + 'static {
    /// Discard every resource held for `tab_id`.
    fn discard(&self, tab_id: TabId) -> impl Future<Output = Result<(), HostError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_sample_converts() {
        let signals = ProbeSample::new(12.5)
            .with_load_duration(900.0)
            .into_signals()
            .unwrap();
        assert_eq!(signals.memory_mb, 12.5);
        assert_eq!(signals.load_duration_ms, Some(900.0));
    }

    #[test]
    fn test_invalid_memory_rejected() {
        assert_eq!(
            ProbeSample::new(-1.0).into_signals(),
            Err(ProbeError::InvalidEstimate(-1.0))
        );
        assert!(ProbeSample::new(f64::INFINITY).into_signals().is_err());
        assert!(ProbeSample::new(f64::NAN).into_signals().is_err());
    }

    #[test]
    fn test_bad_load_duration_dropped() {
        let signals = ProbeSample::new(3.0)
            .with_load_duration(f64::NAN)
            .into_signals()
            .unwrap();
        assert_eq!(signals.load_duration_ms, None);
    }
}
