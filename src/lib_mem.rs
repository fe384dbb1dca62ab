#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use std::time::Duration;

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use tokio::task;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domain::{ResourceKind, MIB};
use crate::dynamic::{Segment, SegmentStore};

const PAGE: usize = 4096;
const REPORT_TICK: Duration = Duration::from_secs(5);

/// Allocate and touch one byte per page so the whole buffer is physically
/// committed, not just reserved. `try_reserve_exact` keeps allocation
/// failure recoverable instead of aborting the process.
fn allocate_touched(bytes: u64) -> AnyResult<Vec<u8>> {
    let len = bytes as usize;
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .context("buffer reservation failed")?;
    buffer.resize(len, 0u8);
    for index in (0..buffer.len()).step_by(PAGE) {
        buffer[index] = (index % 256) as u8;
    }
    Ok(buffer)
}

/// Hold one fixed-size buffer until cancelled, reporting on a slow tick and
/// bumping one byte per cycle so the pages stay resident. The buffer is
/// owned for the whole loop; nothing can reclaim it until the final drop.
pub async fn hold_fixed(bytes: u64, cancel: CancellationToken) -> AnyResult<()> {
    let mut buffer = task::spawn_blocking(move || allocate_touched(bytes)).await??;
    info!(held_mb = bytes / MIB, "memory buffer committed");
    let mut ticker = interval(REPORT_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Some(first) = buffer.first_mut() {
                    *first = first.wrapping_add(1);
                }
                info!(held_mb = buffer.len() as u64 / MIB, "holding memory");
            }
        }
    }
    drop(buffer);
    info!("memory load stopped");
    Ok(())
}

/// In-memory segment backing for the dynamic controller.
pub struct MemoryStore;

#[async_trait]
impl SegmentStore for MemoryStore {
    type Backing = Vec<u8>;

    const KIND: ResourceKind = ResourceKind::Memory;
    const SAFETY_FACTOR: f64 = 0.95;
    const TICK: Duration = Duration::from_secs(2);

    async fn allocate(&mut self, _id: u64, bytes: u64) -> AnyResult<Vec<u8>> {
        // big allocate-and-touch passes run off the async workers
        task::spawn_blocking(move || allocate_touched(bytes)).await?
    }

    async fn release(&mut self, segment: Segment<Vec<u8>>) {
        drop(segment);
    }

    async fn keep_alive(&mut self, segments: &mut [Segment<Vec<u8>>], _tick: u64) -> AnyResult<()> {
        for segment in segments.iter_mut() {
            if let Some(first) = segment.backing.first_mut() {
                *first = first.wrapping_add(1);
            }
        }
        Ok(())
    }
}
