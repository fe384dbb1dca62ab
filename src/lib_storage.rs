#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use tempfile::TempDir;
use tokio::task;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{ResourceKind, MIB};
use crate::dynamic::{Segment, SegmentStore};

const CHUNK: usize = 64 * 1024;
const FIXED_FILE_COUNT: u64 = 10;
const FIXED_APPEND: usize = 256 * 1024;
const DYNAMIC_APPEND: usize = 1024;
const FIXED_IO_TICK: Duration = Duration::from_secs(2);

/// Write `bytes` of cryptographically random content in fixed-size chunks,
/// then force a durable flush.
fn write_random_file(path: &Path, bytes: u64) -> AnyResult<()> {
    let mut file =
        File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut chunk = vec![0u8; CHUNK];
    let mut written = 0u64;
    while written < bytes {
        OsRng.fill_bytes(&mut chunk);
        let len = CHUNK.min((bytes - written) as usize);
        file.write_all(&chunk[..len])
            .with_context(|| format!("write {}", path.display()))?;
        written += len as u64;
    }
    file.sync_all()
        .with_context(|| format!("sync {}", path.display()))?;
    Ok(())
}

/// One full sequential pass over the file.
fn read_back(path: &Path) -> AnyResult<u64> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut chunk = vec![0u8; CHUNK];
    let mut total = 0u64;
    loop {
        let n = file
            .read(&mut chunk)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        total += n as u64;
    }
    Ok(total)
}

fn append_random(path: &Path, bytes: usize) -> AnyResult<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("open {} for append", path.display()))?;
    let mut chunk = vec![0u8; bytes];
    OsRng.fill_bytes(&mut chunk);
    file.write_all(&chunk)
        .with_context(|| format!("append {}", path.display()))?;
    Ok(())
}

/// Generate a fixed amount of disk usage: a fleet of random-content files,
/// then continuous round-robin read/append activity until cancelled. The
/// temporary directory guard removes everything on every exit path,
/// including panics.
pub async fn hold_fixed(bytes: u64, cancel: CancellationToken) -> AnyResult<()> {
    let dir = tempfile::tempdir().context("create storage temp dir")?;
    info!(dir = %dir.path().display(), "storage temp directory");
    let per_file = (bytes / FIXED_FILE_COUNT).max(MIB);
    let mut paths = Vec::new();
    for index in 0..FIXED_FILE_COUNT {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let path = dir.path().join(format!("load-{index}.dat"));
        let target = path.clone();
        task::spawn_blocking(move || write_random_file(&target, per_file)).await??;
        info!(file = index + 1, total = FIXED_FILE_COUNT, "file written");
        paths.push(path);
    }
    info!(
        held_mb = per_file * FIXED_FILE_COUNT / MIB,
        "starting continuous i/o"
    );
    let mut ticker = interval(FIXED_IO_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    let mut operations = 0u64;
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let path = paths[(operations % FIXED_FILE_COUNT) as usize].clone();
                let result = task::spawn_blocking(move || {
                    read_back(&path)?;
                    append_random(&path, FIXED_APPEND)
                })
                .await;
                match result {
                    Ok(Ok(())) => {
                        operations += 1;
                        info!(operations, "i/o operation completed");
                    }
                    Ok(Err(error)) => warn!(%error, "i/o operation failed"),
                    Err(error) => warn!(%error, "i/o task failed"),
                }
            }
        }
    }
    info!("storage load stopped");
    Ok(())
}

/// On-disk segment backing inside a private temporary directory. Dropping
/// the store removes the directory and anything left in it.
pub struct DiskStore {
    dir: TempDir,
}

impl DiskStore {
    pub fn new() -> AnyResult<Self> {
        let dir = tempfile::tempdir().context("create storage temp dir")?;
        info!(dir = %dir.path().display(), "storage temp directory");
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

#[async_trait]
impl SegmentStore for DiskStore {
    type Backing = PathBuf;

    const KIND: ResourceKind = ResourceKind::Storage;
    const SAFETY_FACTOR: f64 = 0.90;
    const TICK: Duration = Duration::from_secs(3);

    async fn allocate(&mut self, id: u64, bytes: u64) -> AnyResult<PathBuf> {
        let path = self.dir.path().join(format!("segment-{id}.dat"));
        let target = path.clone();
        task::spawn_blocking(move || write_random_file(&target, bytes)).await??;
        Ok(path)
    }

    async fn release(&mut self, segment: Segment<PathBuf>) {
        if let Err(error) = tokio::fs::remove_file(&segment.backing).await {
            warn!(
                path = %segment.backing.display(),
                %error,
                "failed to remove segment file"
            );
        }
    }

    async fn keep_alive(
        &mut self,
        segments: &mut [Segment<PathBuf>],
        tick: u64,
    ) -> AnyResult<()> {
        if segments.is_empty() {
            return Ok(());
        }
        // rotate through held files one per tick
        let index = (tick % segments.len() as u64) as usize;
        let path = segments[index].backing.clone();
        task::spawn_blocking(move || {
            read_back(&path)?;
            append_random(&path, DYNAMIC_APPEND)
        })
        .await??;
        Ok(())
    }
}
