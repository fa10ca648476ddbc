//! Probe for frames hosted in their own OS process.
//!
//! Each tab is mapped to the PID of the process rendering it. Samples read
//! the process's resident set size through `sysinfo`; load durations are
//! pushed in by the host as loads complete.

use crate::probe::{FrameHost, HostError, ProbeError, ProbeSample, ResourceProbe};
use crate::tab_id::TabId;
use std::collections::HashMap;
use std::future::{self, Future};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

struct ProcessTable {
    system: System,
    pids: HashMap<TabId, Pid>,
    load_durations: HashMap<TabId, f64>,
}

/// Samples and tears down process-hosted frames.
pub struct ProcessProbe {
    table: Mutex<ProcessTable>,
}

impl ProcessProbe {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(ProcessTable {
                system: System::new(),
                pids: HashMap::new(),
                load_durations: HashMap::new(),
            }),
        }
    }

    /// Associate a tab with the process hosting its frame.
    pub fn attach(&self, tab_id: TabId, pid: u32) -> Result<(), ProbeError> {
        let mut table = self.lock()?;
        table.pids.insert(tab_id, Pid::from_u32(pid));
        debug!(tab_id = %tab_id, pid, "Attached frame process");
        Ok(())
    }

    /// Forget a tab without touching its process. Returns the PID it had.
    pub fn detach(&self, tab_id: TabId) -> Option<u32> {
        let mut table = self.lock().ok()?;
        table.load_durations.remove(&tab_id);
        table.pids.remove(&tab_id).map(|pid| pid.as_u32())
    }

    /// Record how long the tab's last load took.
    pub fn record_load_duration(&self, tab_id: TabId, duration: Duration) -> Result<(), ProbeError> {
        let mut table = self.lock()?;
        if !table.pids.contains_key(&tab_id) {
            return Err(ProbeError::UnknownTab(tab_id));
        }
        table
            .load_durations
            .insert(tab_id, duration.as_secs_f64() * 1000.0);
        Ok(())
    }

    /// Read a sample synchronously.
    pub fn read_sample(&self, tab_id: TabId) -> Result<ProbeSample, ProbeError> {
        let mut table = self.lock()?;
        let pid = *table.pids.get(&tab_id).ok_or(ProbeError::UnknownTab(tab_id))?;

        table.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::everything(),
        );

        let bytes = table
            .system
            .process(pid)
            .map(|p| p.memory())
            .ok_or_else(|| ProbeError::Unavailable(format!("process {pid} not found")))?;

        Ok(ProbeSample {
            memory_mb: bytes as f64 / BYTES_PER_MB,
            load_duration_ms: table.load_durations.get(&tab_id).copied(),
        })
    }

    /// Forget the tab and kill its process if it is still running.
    pub fn terminate(&self, tab_id: TabId) -> Result<(), HostError> {
        let mut table = self
            .table
            .lock()
            .map_err(|_| HostError::Teardown("process table lock poisoned".to_string()))?;

        let pid = table
            .pids
            .remove(&tab_id)
            .ok_or(HostError::UnknownTab(tab_id))?;
        table.load_durations.remove(&tab_id);

        table.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::everything(),
        );

        match table.system.process(pid) {
            Some(process) => {
                if process.kill() {
                    info!(tab_id = %tab_id, %pid, "Killed frame process");
                    Ok(())
                } else {
                    warn!(tab_id = %tab_id, %pid, "Failed to kill frame process");
                    Err(HostError::Teardown(format!("could not kill process {pid}")))
                }
            }
            None => {
                debug!(tab_id = %tab_id, %pid, "Frame process already gone");
                Ok(())
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ProcessTable>, ProbeError> {
        self.table
            .lock()
            .map_err(|_| ProbeError::Unavailable("process table lock poisoned".to_string()))
    }
}

impl Default for ProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for ProcessProbe {
    fn sample(&self, tab_id: TabId) -> impl Future<Output = Result<ProbeSample, ProbeError>> + Send {
        future::ready(self.read_sample(tab_id))
    }
}

impl FrameHost for ProcessProbe {
    fn discard(&self, tab_id: TabId) -> impl Future<Output = Result<(), HostError>> + Send {
        future::ready(self.terminate(tab_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_own_process() {
        let probe = ProcessProbe::new();
        probe.attach(TabId(1), std::process::id()).unwrap();

        let sample = probe.read_sample(TabId(1)).unwrap();
        assert!(sample.memory_mb > 0.0);
        assert_eq!(sample.load_duration_ms, None);

        probe
            .record_load_duration(TabId(1), Duration::from_millis(1500))
            .unwrap();
        let sample = probe.read_sample(TabId(1)).unwrap();
        assert_eq!(sample.load_duration_ms, Some(1500.0));
    }

    #[tokio::test]
    async fn test_async_sample() {
        let probe = ProcessProbe::new();
        probe.attach(TabId(7), std::process::id()).unwrap();
        assert!(probe.sample(TabId(7)).await.is_ok());
        assert_eq!(
            probe.sample(TabId(8)).await,
            Err(ProbeError::UnknownTab(TabId(8)))
        );
    }

    #[test]
    fn test_unknown_tab() {
        let probe = ProcessProbe::new();
        assert_eq!(
            probe.read_sample(TabId(3)),
            Err(ProbeError::UnknownTab(TabId(3)))
        );
        assert_eq!(
            probe.terminate(TabId(3)),
            Err(HostError::UnknownTab(TabId(3)))
        );
        assert!(probe
            .record_load_duration(TabId(3), Duration::from_secs(1))
            .is_err());
    }

    #[test]
    fn test_detach_keeps_process() {
        let probe = ProcessProbe::new();
        let pid = std::process::id();
        probe.attach(TabId(2), pid).unwrap();

        assert_eq!(probe.detach(TabId(2)), Some(pid));
        assert_eq!(probe.detach(TabId(2)), None);
        assert!(probe.read_sample(TabId(2)).is_err());
    }
}
