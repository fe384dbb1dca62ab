#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use thiserror::Error;

use crate::cli::Cli;
use crate::domain::{parse_duration, InvalidDuration, LoadPlan, Magnitude, SizeError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--timeout option is required")]
    MissingTimeout,
    #[error(transparent)]
    InvalidDuration(#[from] InvalidDuration),
    #[error("invalid {flag} value: {source}")]
    Size {
        flag: &'static str,
        source: SizeError,
    },
    #[error("at least one load type must be specified")]
    NoLoadSpecified,
}

/// Turn raw CLI flags into a validated `LoadPlan`.
pub fn validate(cli: &Cli) -> Result<LoadPlan, ConfigError> {
    let timeout = cli.timeout.as_deref().ok_or(ConfigError::MissingTimeout)?;
    let timeout = parse_duration(timeout)?;
    let plan = LoadPlan {
        timeout,
        // any negative count means the flag was not given
        cpu: usize::try_from(cli.cpu).ok(),
        memory: parse_size_flag("--memory", cli.memory.as_deref())?,
        storage: parse_size_flag("--storage", cli.storage.as_deref())?,
    };
    if !plan.has_load() {
        return Err(ConfigError::NoLoadSpecified);
    }
    Ok(plan)
}

fn parse_size_flag(
    flag: &'static str,
    value: Option<&str>,
) -> Result<Option<Magnitude>, ConfigError> {
    value
        .map(|raw| raw.parse().map_err(|source| ConfigError::Size { flag, source }))
        .transpose()
}
