//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on values that do not parse. Every
//! variable has a default.

pub mod roster;

use std::time::Duration;

use crate::engine::{DispatcherConfig, HandlingTime};
use crate::error::{Error, Result};

pub use roster::Roster;

#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum calls in flight (answered or held) at once.
    pub max_concurrent: usize,
    pub hold_timeout: Duration,
    pub handling_min: Duration,
    pub handling_max: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            hold_timeout: Duration::from_secs(10),
            handling_min: Duration::from_secs(5),
            handling_max: Duration::from_secs(10),
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let max_concurrent = parsed_var(&lookup, "MAX_CONCURRENT_CALLS")?
            .unwrap_or(defaults.max_concurrent);
        if max_concurrent == 0 {
            return Err(Error::Config(
                "MAX_CONCURRENT_CALLS must be at least 1".to_string(),
            ));
        }

        let hold_timeout = millis_var(&lookup, "HOLD_TIMEOUT_MS")?.unwrap_or(defaults.hold_timeout);
        let handling_min =
            millis_var(&lookup, "HANDLING_MIN_MS")?.unwrap_or(defaults.handling_min);
        let handling_max =
            millis_var(&lookup, "HANDLING_MAX_MS")?.unwrap_or(defaults.handling_max);
        if handling_max < handling_min {
            return Err(Error::Config(format!(
                "HANDLING_MAX_MS ({}) is below HANDLING_MIN_MS ({})",
                handling_max.as_millis(),
                handling_min.as_millis()
            )));
        }

        Ok(Self {
            max_concurrent,
            hold_timeout,
            handling_min,
            handling_max,
            otel_endpoint: lookup("OTEL_ENDPOINT").filter(|v| !v.is_empty()),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_concurrent: self.max_concurrent,
            hold_timeout: self.hold_timeout,
        }
    }

    pub fn handling_time(&self) -> HandlingTime {
        if self.handling_min == self.handling_max {
            HandlingTime::Fixed(self.handling_min)
        } else {
            HandlingTime::Uniform {
                min: self.handling_min,
                max: self.handling_max,
            }
        }
    }
}

fn parsed_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for {name} ({raw:?}): {e}"))),
    }
}

fn millis_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<Duration>> {
    Ok(parsed_var::<u64>(lookup, name)?.map(Duration::from_millis))
}
