#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use std::time::{Duration, Instant};

use anyhow::Result as AnyResult;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::{LoadPlan, Magnitude, ResourceKind, MIB};
use crate::dynamic::DynamicController;
use crate::lib_cpu;
use crate::lib_mem::{self, MemoryStore};
use crate::lib_storage::{self, DiskStore};
use crate::probe::{DiskProbe, MemoryProbe};
use crate::validation::ConfigError;

/// Run the configured loads until the deadline fires or an interrupt
/// arrives, then wait for every worker to release its resources. Worker
/// failures are logged and never fail the run.
pub async fn run(plan: LoadPlan) -> AnyResult<()> {
    if !plan.has_load() {
        return Err(ConfigError::NoLoadSpecified.into());
    }
    announce(&plan);

    let cancel = CancellationToken::new();
    let mut workers: Vec<JoinHandle<()>> = Vec::new();

    if let Some(cores) = plan.cpu {
        let token = cancel.clone();
        workers.push(tokio::spawn(async move {
            if let Err(error) = lib_cpu::generate_load(cores, token).await {
                error!(resource = %ResourceKind::Cpu, %error, "load generation failed");
            }
        }));
    }
    if let Some(magnitude) = plan.memory {
        let token = cancel.clone();
        workers.push(tokio::spawn(async move {
            match magnitude {
                Magnitude::AbsoluteBytes(bytes) => {
                    if let Err(error) = lib_mem::hold_fixed(bytes, token).await {
                        error!(resource = %ResourceKind::Memory, %error, "load generation failed");
                    }
                }
                Magnitude::PercentageOfFree(percent) => {
                    DynamicController::new(MemoryProbe::new(), MemoryStore, percent)
                        .run(token)
                        .await;
                }
            }
        }));
    }
    if let Some(magnitude) = plan.storage {
        let token = cancel.clone();
        workers.push(tokio::spawn(async move {
            match magnitude {
                Magnitude::AbsoluteBytes(bytes) => {
                    if let Err(error) = lib_storage::hold_fixed(bytes, token).await {
                        error!(resource = %ResourceKind::Storage, %error, "load generation failed");
                    }
                }
                Magnitude::PercentageOfFree(percent) => match DiskStore::new() {
                    Ok(store) => {
                        DynamicController::new(DiskProbe::for_working_dir(), store, percent)
                            .run(token)
                            .await;
                    }
                    Err(error) => {
                        error!(resource = %ResourceKind::Storage, %error, "store setup failed");
                    }
                },
            }
        }));
    }

    workers.push(tokio::spawn(report_progress(plan.timeout, cancel.clone())));

    tokio::select! {
        () = sleep(plan.timeout) => info!("deadline reached, stopping"),
        _ = tokio::signal::ctrl_c() => info!("interrupt received, stopping"),
    }
    cancel.cancel();

    for worker in workers {
        if let Err(error) = worker.await {
            error!(%error, "worker terminated abnormally");
        }
    }
    info!("stress run completed");
    Ok(())
}

fn announce(plan: &LoadPlan) {
    info!(timeout_s = plan.timeout.as_secs(), "starting stress run");
    if let Some(cores) = plan.cpu {
        if cores == 0 {
            info!(resource = %ResourceKind::Cpu, "load requested on all cores");
        } else {
            info!(resource = %ResourceKind::Cpu, cores, "load requested");
        }
    }
    if let Some(magnitude) = plan.memory {
        announce_magnitude(ResourceKind::Memory, magnitude);
    }
    if let Some(magnitude) = plan.storage {
        announce_magnitude(ResourceKind::Storage, magnitude);
    }
}

fn announce_magnitude(resource: ResourceKind, magnitude: Magnitude) {
    match magnitude {
        Magnitude::AbsoluteBytes(bytes) => {
            info!(%resource, size_mb = bytes / MIB, "load requested");
        }
        Magnitude::PercentageOfFree(percent) => {
            info!(%resource, percent, "dynamic load requested");
        }
    }
}

/// Log elapsed/remaining once per second until the deadline or cancellation.
async fn report_progress(total: Duration, cancel: CancellationToken) {
    let start = Instant::now();
    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let elapsed = start.elapsed();
                if elapsed >= total {
                    return;
                }
                let remaining = total - elapsed;
                let percent =
                    (elapsed.as_secs_f64() / total.as_secs_f64() * 1000.0).round() / 10.0;
                info!(percent, remaining_s = remaining.as_secs(), "progress");
            }
        }
    }
}
