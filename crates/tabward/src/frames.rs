//! In-process stand-in for a frame-hosting layer.

use crate::scenario::SimTab;
use std::collections::HashMap;
use std::future::{self, Future};
use std::sync::Mutex;
use tabward_memory::{FrameHost, HostError, ProbeError, ProbeSample, ResourceProbe, TabId};
use tracing::debug;

struct SimFrame {
    memory_mb: f64,
    growth_mb: f64,
    load_ms: Option<f64>,
}

/// Frames whose footprint grows by a fixed step on every sample.
#[derive(Default)]
pub struct SimulatedFrames {
    frames: Mutex<HashMap<TabId, SimFrame>>,
}

impl SimulatedFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start hosting a frame for `tab_id`.
    pub fn host(&self, tab_id: TabId, tab: &SimTab) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.insert(
                tab_id,
                SimFrame {
                    memory_mb: tab.start_mb,
                    growth_mb: tab.growth_mb,
                    load_ms: tab.load_ms,
                },
            );
        }
    }

    fn next_sample(&self, tab_id: TabId) -> Result<ProbeSample, ProbeError> {
        let mut frames = self
            .frames
            .lock()
            .map_err(|_| ProbeError::Unavailable("frame table poisoned".to_string()))?;
        let frame = frames.get_mut(&tab_id).ok_or(ProbeError::UnknownTab(tab_id))?;

        let sample = ProbeSample {
            memory_mb: frame.memory_mb,
            load_duration_ms: frame.load_ms,
        };
        frame.memory_mb += frame.growth_mb;
        Ok(sample)
    }

    fn teardown(&self, tab_id: TabId) -> Result<(), HostError> {
        let mut frames = self
            .frames
            .lock()
            .map_err(|_| HostError::Teardown("frame table poisoned".to_string()))?;
        match frames.remove(&tab_id) {
            Some(frame) => {
                debug!(tab_id = %tab_id, memory_mb = frame.memory_mb, "Frame discarded");
                Ok(())
            }
            None => Err(HostError::UnknownTab(tab_id)),
        }
    }
}

impl ResourceProbe for SimulatedFrames {
    fn sample(&self, tab_id: TabId) -> impl Future<Output = Result<ProbeSample, ProbeError>> + Send {
        future::ready(self.next_sample(tab_id))
    }
}

impl FrameHost for SimulatedFrames {
    fn discard(&self, tab_id: TabId) -> impl Future<Output = Result<(), HostError>> + Send {
        future::ready(self.teardown(tab_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_grow_per_sample() {
        let frames = SimulatedFrames::new();
        let tab = SimTab {
            start_mb: 10.0,
            growth_mb: 2.5,
            load_ms: Some(700.0),
            active: false,
        };
        frames.host(TabId(1), &tab);

        assert_eq!(frames.sample(TabId(1)).await.unwrap().memory_mb, 10.0);
        let second = frames.sample(TabId(1)).await.unwrap();
        assert_eq!(second.memory_mb, 12.5);
        assert_eq!(second.load_duration_ms, Some(700.0));
    }

    #[tokio::test]
    async fn test_discard_removes_frame() {
        let frames = SimulatedFrames::new();
        let tab = SimTab {
            start_mb: 1.0,
            growth_mb: 0.0,
            load_ms: None,
            active: false,
        };
        frames.host(TabId(4), &tab);

        assert!(frames.discard(TabId(4)).await.is_ok());
        assert_eq!(
            frames.discard(TabId(4)).await,
            Err(HostError::UnknownTab(TabId(4)))
        );
        assert_eq!(
            frames.sample(TabId(4)).await,
            Err(ProbeError::UnknownTab(TabId(4)))
        );
    }
}
