#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use std::env;
use std::path::PathBuf;

use sysinfo::{Disks, System};
use thiserror::Error;

use crate::domain::ResourceKind;

/// Live free-resource query. Implementations must hit the OS on every call:
/// the dynamic controllers depend on observing the effect of their own prior
/// allocations as well as external consumers, so cached values are wrong by
/// construction.
pub trait ResourceProbe: Send {
    fn free_bytes(&mut self) -> Result<u64, ProbeError>;
}

/// Recoverable per-cycle failure: callers log it and retry next tick.
#[derive(Clone, Debug, Error)]
#[error("{resource} probe unavailable: {reason}")]
pub struct ProbeError {
    pub resource: ResourceKind,
    pub reason: String,
}

/// Available system memory, refreshed on every call.
pub struct MemoryProbe {
    system: System,
}

impl MemoryProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for MemoryProbe {
    fn free_bytes(&mut self) -> Result<u64, ProbeError> {
        self.system.refresh_memory();
        let available = self.system.available_memory();
        if available == 0 {
            return Err(ProbeError {
                resource: ResourceKind::Memory,
                reason: "no available memory reported".to_string(),
            });
        }
        Ok(available)
    }
}

/// Free space on the volume holding `path`, re-enumerated on every call.
pub struct DiskProbe {
    path: PathBuf,
}

impl DiskProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Probe the working volume, as seen from the current directory.
    #[must_use]
    pub fn for_working_dir() -> Self {
        Self::new(env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

impl ResourceProbe for DiskProbe {
    fn free_bytes(&mut self) -> Result<u64, ProbeError> {
        let path = self
            .path
            .canonicalize()
            .unwrap_or_else(|_| self.path.clone());
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            // nested mounts: the longest matching mount point wins
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(sysinfo::Disk::available_space)
            .ok_or_else(|| ProbeError {
                resource: ResourceKind::Storage,
                reason: format!("no mounted volume contains {}", path.display()),
            })
    }
}
