//! tabward Memory Accounting
//!
//! Per-tab resource accounting for hosted content frames:
//! health scoring, the tab ledger, admission gates and eviction planning.
//! Frames themselves are reached only through the [`ResourceProbe`] and
//! [`FrameHost`] traits.

mod admission;
mod eviction;
mod ledger;
mod limits;
mod probe;
mod process_probe;
mod score;
mod tab_id;

pub use admission::{AdmissionController, AdmissionDecision, DenialReason, Remediation};
pub use eviction::{EvictionPlan, EvictionPlanner};
pub use ledger::{PressureLevel, ResourceLedger, TabRecord, TabSignals};
pub use limits::{ConfigError, ResourceLimits, ScoreTuning};
pub use probe::{FrameHost, HostError, ProbeError, ProbeSample, ResourceProbe};
pub use process_probe::ProcessProbe;
pub use score::{ScoreBreakdown, ScoreCalculator};
pub use tab_id::TabId;
