// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{DEFAULT_DRAIN_GRACE, RawConfigFile, SupervisorConfig};
use crate::errors::ConfigError;
use crate::exec::termination::{DEFAULT_SENTINEL_GRACE, TerminationStrategy};

impl TryFrom<RawConfigFile> for SupervisorConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfigFile) -> Result<Self, Self::Error> {
        validate_stream(&raw)?;

        let timeout = optional_duration("[run].timeout", raw.run.timeout.as_deref())?;
        if timeout == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid(
                "[run].timeout must be greater than zero".to_string(),
            ));
        }

        let drain_grace = optional_duration("[run].drain_grace", raw.run.drain_grace.as_deref())?
            .unwrap_or(DEFAULT_DRAIN_GRACE);

        let termination = termination_strategy(&raw)?;

        Ok(SupervisorConfig {
            timeout,
            termination,
            stream_capacity: raw.stream.capacity,
            overflow: raw.stream.overflow,
            drain_grace,
        })
    }
}

fn validate_stream(cfg: &RawConfigFile) -> Result<(), ConfigError> {
    if cfg.stream.capacity == 0 {
        return Err(ConfigError::Invalid(
            "[stream].capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn termination_strategy(cfg: &RawConfigFile) -> Result<TerminationStrategy, ConfigError> {
    let section = &cfg.termination;
    match section.strategy.trim().to_lowercase().as_str() {
        "kill" => Ok(TerminationStrategy::Kill),
        "sentinel" => {
            if section.sentinel.is_empty() {
                return Err(ConfigError::Invalid(
                    "[termination].sentinel must not be empty".to_string(),
                ));
            }
            let grace = optional_duration("[termination].grace", section.grace.as_deref())?
                .unwrap_or(DEFAULT_SENTINEL_GRACE);
            Ok(TerminationStrategy::Sentinel {
                input: section.sentinel.clone(),
                grace,
            })
        }
        other => Err(ConfigError::Invalid(format!(
            "invalid [termination].strategy: {other} (expected \"kill\" or \"sentinel\")"
        ))),
    }
}

fn optional_duration(field: &str, value: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    value
        .map(|s| {
            parse_duration(s).map_err(|e| ConfigError::Invalid(format!("{field}: {e}")))
        })
        .transpose()
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let seconds = |per_unit: u64| {
        value
            .checked_mul(per_unit)
            .map(Duration::from_secs)
            .ok_or_else(|| "duration too large".to_string())
    };

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => seconds(60),
        "h" => seconds(60 * 60),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
