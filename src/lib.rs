#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

pub mod cli;
pub mod domain;
pub mod dynamic;
pub mod lib_cpu;
pub mod lib_mem;
pub mod lib_storage;
pub mod probe;
pub mod service;
pub mod validation;

pub use domain::{LoadPlan, Magnitude, ResourceKind, SizeError};
pub use dynamic::{ControllerError, ControllerState, DynamicController, Segment, SegmentStore};
pub use lib_mem::MemoryStore;
pub use lib_storage::DiskStore;
pub use probe::{DiskProbe, MemoryProbe, ProbeError, ResourceProbe};
pub use service::run;
pub use validation::{validate, ConfigError};
