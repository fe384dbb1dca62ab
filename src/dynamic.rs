#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{ResourceKind, MIB};
use crate::probe::{ProbeError, ResourceProbe};

/// One discrete unit of held resource: an in-memory buffer or an on-disk
/// file, identified by a monotonically increasing id.
pub struct Segment<B> {
    pub id: u64,
    pub bytes: u64,
    pub backing: B,
}

/// Ordered segment sequence with a tracked running total.
///
/// Growth appends; shrink pops from the tail, most recent first. Segment
/// id 0 is the floor allocation and is never popped while the controller is
/// steady, so the footprint never collapses to zero between cycles.
pub struct ControllerState<B> {
    segments: Vec<Segment<B>>,
    held: u64,
    next_id: u64,
}

impl<B> ControllerState<B> {
    fn new() -> Self {
        Self {
            segments: Vec::new(),
            held: 0,
            next_id: 0,
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id
    }

    fn push(&mut self, bytes: u64, backing: B) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.held += bytes;
        self.segments.push(Segment { id, bytes, backing });
        id
    }

    /// Pops the most recently added segment, refusing to touch the floor.
    fn pop_tail(&mut self) -> Option<Segment<B>> {
        if self.segments.len() <= 1 {
            return None;
        }
        let segment = self.segments.pop()?;
        self.held -= segment.bytes;
        Some(segment)
    }

    fn drain_all(&mut self) -> Vec<Segment<B>> {
        self.held = 0;
        std::mem::take(&mut self.segments)
    }

    fn segments_mut(&mut self) -> &mut [Segment<B>] {
        &mut self.segments
    }

    #[must_use]
    pub fn held_bytes(&self) -> u64 {
        self.held
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn segment_ids(&self) -> Vec<u64> {
        self.segments.iter().map(|s| s.id).collect()
    }

    #[must_use]
    pub fn segment_sizes(&self) -> Vec<u64> {
        self.segments.iter().map(|s| s.bytes).collect()
    }
}

/// Backing store for one dynamic controller variant. The control algorithm
/// is shared; only materialization, release, and the liveness operation
/// differ between memory and storage.
#[async_trait]
pub trait SegmentStore: Send {
    type Backing: Send;

    const KIND: ResourceKind;
    /// Margin applied to every computed target, countering probe-then-act
    /// lag and concurrent external consumers.
    const SAFETY_FACTOR: f64;
    const TICK: Duration;

    /// Materialize `bytes` of real usage: touched pages, or a flushed file.
    async fn allocate(&mut self, id: u64, bytes: u64) -> AnyResult<Self::Backing>;

    /// Release one segment's backing.
    async fn release(&mut self, segment: Segment<Self::Backing>);

    /// Lightweight activity that keeps held resources demonstrably hot
    /// without materially changing their size.
    async fn keep_alive(
        &mut self,
        segments: &mut [Segment<Self::Backing>],
        tick: u64,
    ) -> AnyResult<()>;

    /// Best-effort reclamation hint after a shrink. Dropping a backing frees
    /// it immediately under the global allocator, so the default is a no-op.
    fn reclaim(&mut self) {}
}

/// Failure that ends one controller early. The rest of the run continues.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("insufficient free {resource} for a non-zero target")]
    InsufficientResource { resource: ResourceKind },
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("initial {resource} segment failed: {cause:#}")]
    InitialAllocation {
        resource: ResourceKind,
        cause: anyhow::Error,
    },
}

/// Closed-loop controller tracking a percentage of currently free resource.
///
/// Every tick re-probes the OS and converges the held total toward
/// `free * percent/100 * SAFETY_FACTOR`, growing by appending one segment or
/// shrinking from the tail, never both in the same tick.
pub struct DynamicController<P, S: SegmentStore> {
    probe: P,
    store: S,
    percent: f64,
    state: ControllerState<S::Backing>,
    ticks: u64,
}

impl<P, S> DynamicController<P, S>
where
    P: ResourceProbe,
    S: SegmentStore,
{
    pub fn new(probe: P, store: S, percent: f64) -> Self {
        Self {
            probe,
            store,
            percent,
            state: ControllerState::new(),
            ticks: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ControllerState<S::Backing> {
        &self.state
    }

    fn target_bytes(&self, free: u64) -> u64 {
        (free as f64 * self.percent / 100.0 * S::SAFETY_FACTOR) as u64
    }

    async fn grow(&mut self, bytes: u64) -> AnyResult<u64> {
        let id = self.state.next_id();
        let backing = self.store.allocate(id, bytes).await?;
        Ok(self.state.push(bytes, backing))
    }

    /// Probe once and materialize the floor segment.
    pub async fn initialize(&mut self) -> Result<(), ControllerError> {
        let free = self.probe.free_bytes()?;
        let target = self.target_bytes(free);
        if target == 0 {
            return Err(ControllerError::InsufficientResource { resource: S::KIND });
        }
        self.grow(target)
            .await
            .map_err(|cause| ControllerError::InitialAllocation {
                resource: S::KIND,
                cause,
            })?;
        info!(
            resource = %S::KIND,
            held_mb = self.state.held_bytes() / MIB,
            "initial allocation"
        );
        Ok(())
    }

    /// One steady-state cycle: re-probe, converge toward the new target,
    /// then run the liveness operation and report totals.
    pub async fn run_tick(&mut self) {
        self.ticks += 1;
        let free = match self.probe.free_bytes() {
            Ok(free) => free,
            Err(error) => {
                warn!(resource = %S::KIND, %error, "probe failed, skipping cycle");
                return;
            }
        };
        let target = self.target_bytes(free);
        let held = self.state.held_bytes();
        if target > held {
            let grow_by = target - held;
            match self.grow(grow_by).await {
                Ok(id) => info!(
                    resource = %S::KIND,
                    segment = id,
                    grew_mb = grow_by / MIB,
                    held_mb = self.state.held_bytes() / MIB,
                    "grew toward target"
                ),
                Err(error) => {
                    // no retry within the tick; the next cycle re-evaluates
                    warn!(resource = %S::KIND, %error, "allocation failed, skipping cycle");
                    return;
                }
            }
        } else if target < held && self.state.segment_count() > 1 {
            let excess = held - target;
            let mut freed = 0u64;
            let mut removed = 0usize;
            while freed < excess {
                let Some(segment) = self.state.pop_tail() else {
                    break;
                };
                freed += segment.bytes;
                removed += 1;
                self.store.release(segment).await;
            }
            if freed > 0 {
                self.store.reclaim();
                info!(
                    resource = %S::KIND,
                    removed,
                    freed_mb = freed / MIB,
                    held_mb = self.state.held_bytes() / MIB,
                    "shrank toward target"
                );
            }
        }
        if let Err(error) = self
            .store
            .keep_alive(self.state.segments_mut(), self.ticks)
            .await
        {
            warn!(resource = %S::KIND, %error, "liveness operation failed");
        }
        info!(
            resource = %S::KIND,
            held_mb = self.state.held_bytes() / MIB,
            segments = self.state.segment_count(),
            "steady state"
        );
    }

    /// Release everything, floor segment included.
    pub async fn teardown(&mut self) {
        for segment in self.state.drain_all() {
            self.store.release(segment).await;
        }
        self.store.reclaim();
        info!(resource = %S::KIND, "released all segments");
    }

    /// Drive the controller until the shared token cancels, then tear down.
    /// Initialization failure ends this controller only; other loads keep
    /// running.
    pub async fn run(mut self, cancel: CancellationToken) {
        if let Err(error) = self.initialize().await {
            warn!(resource = %S::KIND, %error, "controller exiting early");
            return;
        }
        let mut ticker = interval(S::TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first interval tick completes immediately; consume it so the
        // first recompute lands one full period after initialization
        ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => self.run_tick().await,
            }
        }
        self.teardown().await;
    }
}
