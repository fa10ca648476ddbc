//! tabward Tabs Runtime
//!
//! Orchestrates tracked tabs on top of `tabward-memory`:
//! - Admission before a frame is created
//! - Single-active-tab bookkeeping
//! - One release path for user closes and evictions
//! - Single-flight, timer-driven check cycles that rescore and reclaim

mod event;
mod manager;
mod scheduler;
mod tab;

pub use event::{CycleOutcome, CycleReport, ManagerEvent, ManagerSnapshot, TabSnapshot};
pub use manager::{ManagerError, ResourceManager};
pub use scheduler::{spawn_scheduler, CheckScheduler};
pub use tab::TabState;

pub use tabward_memory::{
    AdmissionDecision, DenialReason, FrameHost, HostError, PressureLevel, ProbeError, ProbeSample,
    Remediation, ResourceLimits, ResourceProbe, TabId,
};
