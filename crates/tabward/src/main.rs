//! tabward: tab resource manager simulator
//!
//! Opens the tabs described by a scenario file (or a built-in one), runs
//! timer-driven check cycles against simulated frames, logs every manager
//! event and prints the final snapshot as JSON.
//!
//! Usage: `tabward [scenario.toml [limits.toml]]`. A limits file replaces
//! the scenario's `[limits]` table. Log verbosity follows `RUST_LOG`.

mod frames;
mod scenario;

use anyhow::{anyhow, Context, Result};
use frames::SimulatedFrames;
use scenario::Scenario;
use std::sync::Arc;
use std::thread;
use tabward_tabs::{ManagerEvent, ResourceLimits, ResourceManager};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let mut args = std::env::args().skip(1);
    let mut scenario = match args.next() {
        Some(path) => Scenario::from_file(path)?,
        None => Scenario::default(),
    };
    if let Some(path) = args.next() {
        scenario.limits = ResourceLimits::from_toml_file(&path)
            .with_context(|| format!("loading limits {path}"))?;
    }
    info!(
        tabs = scenario.tabs.len(),
        cycles = scenario.cycles,
        "tabward starting"
    );

    let frames = Arc::new(SimulatedFrames::new());
    let manager = Arc::new(ResourceManager::new(
        scenario.limits.clone(),
        frames.clone(),
        frames.clone(),
    )?);

    let events = manager.subscribe();
    let event_log = thread::Builder::new()
        .name("event-log".to_string())
        .spawn(move || {
            for event in events {
                log_event(&event);
            }
        })?;

    for tab in &scenario.tabs {
        let decision = manager.request_create().await;
        if let Some(reason) = decision.reason {
            warn!("Cannot open tab: {} (remediation: {:?})", reason, reason.remediation());
            continue;
        }

        let tab_id = manager.track().await?;
        frames.host(tab_id, tab);
        if tab.active {
            manager.activate(tab_id).await;
        } else {
            manager.deactivate(tab_id).await;
        }
    }

    let scheduler = manager.start();
    tokio::time::sleep(scenario.limits.sample_interval() * scenario.cycles).await;
    scheduler.stop().await;

    let snapshot = manager.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    manager.dispose().await;
    // Dropping the last handle closes the event channel
    drop(manager);
    event_log
        .join()
        .map_err(|_| anyhow!("event log thread panicked"))?;

    info!("tabward shutting down");
    Ok(())
}

fn log_event(event: &ManagerEvent) {
    match event {
        ManagerEvent::CycleCompleted(snapshot) => info!(
            aggregate_mb = snapshot.aggregate_memory_mb,
            tabs = snapshot.tabs.len(),
            pressure = snapshot.pressure.description(),
            "Cycle completed"
        ),
        ManagerEvent::TabEvicted { tab_id, freed_mb } => {
            info!("Evicted {} ({:.1} MB freed)", tab_id, freed_mb)
        }
        ManagerEvent::TabReleased { tab_id } => info!("Released {}", tab_id),
        ManagerEvent::PressurePersists { unresolved_mb } => warn!(
            "Memory pressure persists, {:.1} MB over target; close a tab manually",
            unresolved_mb
        ),
        ManagerEvent::SampleFailed { tab_id, error } => {
            warn!("Sample for {} failed: {}", tab_id, error)
        }
    }
}
