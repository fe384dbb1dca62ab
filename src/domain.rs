#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const MIB: u64 = 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Cpu,
    Memory,
    Storage,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Memory => f.write_str("memory"),
            Self::Storage => f.write_str("storage"),
        }
    }
}

/// Requested load magnitude: an absolute byte count or a percentage of the
/// currently free resource.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Magnitude {
    AbsoluteBytes(u64),
    PercentageOfFree(f64),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SizeError {
    #[error("percentage must be a number in 0-100: {0}")]
    InvalidPercentage(String),
    #[error("invalid size format: {0}")]
    InvalidSizeFormat(String),
    #[error("unsupported unit: {0}")]
    UnsupportedUnit(String),
}

impl FromStr for Magnitude {
    type Err = SizeError;

    fn from_str(s: &str) -> Result<Self, SizeError> {
        let s = s.trim();
        if let Some(percent) = s.strip_suffix('%') {
            let value: f64 = percent
                .trim()
                .parse()
                .map_err(|_| SizeError::InvalidPercentage(s.to_string()))?;
            if !(0.0..=100.0).contains(&value) {
                return Err(SizeError::InvalidPercentage(s.to_string()));
            }
            return Ok(Self::PercentageOfFree(value));
        }
        let digits = s
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(s.len());
        let (number, unit) = s.split_at(digits);
        let value: f64 = number
            .parse()
            .map_err(|_| SizeError::InvalidSizeFormat(s.to_string()))?;
        let multiplier = match unit.trim_start().to_ascii_uppercase().as_str() {
            "" | "B" => 1u64,
            "KB" | "K" => 1 << 10,
            "MB" | "M" => 1 << 20,
            "GB" | "G" => 1 << 30,
            "TB" | "T" => 1 << 40,
            other if other.chars().all(|c| c.is_ascii_alphabetic()) => {
                return Err(SizeError::UnsupportedUnit(other.to_string()));
            }
            _ => return Err(SizeError::InvalidSizeFormat(s.to_string())),
        };
        Ok(Self::AbsoluteBytes((value * multiplier as f64).round() as u64))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid time format: {0}")]
pub struct InvalidDuration(pub String);

/// Parse a duration of the form `<number><s|m|h>`, fractions allowed.
pub fn parse_duration(s: &str) -> Result<Duration, InvalidDuration> {
    let s = s.trim();
    let digits = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(digits);
    let value: f64 = number
        .parse()
        .map_err(|_| InvalidDuration(s.to_string()))?;
    let seconds = match unit {
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return Err(InvalidDuration(s.to_string())),
    };
    Duration::try_from_secs_f64(seconds).map_err(|_| InvalidDuration(s.to_string()))
}

/// Validated run configuration, immutable once built.
#[derive(Clone, Debug)]
pub struct LoadPlan {
    pub timeout: Duration,
    /// `Some(0)` loads every available core.
    pub cpu: Option<usize>,
    pub memory: Option<Magnitude>,
    pub storage: Option<Magnitude>,
}

impl LoadPlan {
    #[must_use]
    pub fn has_load(&self) -> bool {
        self.cpu.is_some() || self.memory.is_some() || self.storage.is_some()
    }
}
