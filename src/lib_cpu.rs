#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use std::num::NonZeroUsize;
use std::thread;

use anyhow::Result as AnyResult;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Iterations between cancellation checks. Batching keeps the loop pure
/// arithmetic; the trade is a worst-case shutdown latency of one full batch
/// per worker.
const CANCEL_CHECK_INTERVAL: u64 = 50_000_000;

/// Run compute-bound workers until cancelled. `cores == 0` loads every
/// available core. Returns once all workers have returned.
pub async fn generate_load(cores: usize, cancel: CancellationToken) -> AnyResult<()> {
    let cores = if cores == 0 {
        thread::available_parallelism().map_or(1, NonZeroUsize::get)
    } else {
        cores
    };
    info!(cores, "starting cpu load");
    let mut workers = Vec::with_capacity(cores);
    for core in 0..cores {
        let cancel = cancel.clone();
        workers.push(task::spawn_blocking(move || burn_core(core, &cancel)));
    }
    for worker in workers {
        worker.await?;
    }
    info!("cpu load completed");
    Ok(())
}

/// Pure-arithmetic mixing loop: a linear congruential step plus xorshift,
/// pinned with `black_box` so the optimizer cannot delete it.
fn burn_core(core: usize, cancel: &CancellationToken) {
    info!(core, "worker started");
    let mut value = core as u64;
    loop {
        for i in 0..CANCEL_CHECK_INTERVAL {
            value = value.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            value ^= value >> 21;
            value ^= value << 35;
            value ^= value >> 4;
            value = value.wrapping_add(i.wrapping_mul(31));
        }
        std::hint::black_box(value);
        if cancel.is_cancelled() {
            break;
        }
    }
    info!(core, "worker stopped");
}
