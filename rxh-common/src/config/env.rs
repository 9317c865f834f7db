//! Environment variable overrides.
//!
//! [`EnvParser`] reads `RXH_`-prefixed variables. Each getter returns `None`
//! when the variable is unset, so callers only override what the environment
//! actually provides. Invalid values are collected instead of failing fast,
//! letting [`RxhConfig::load`](super::RxhConfig::load) report all of them at
//! once.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    #[error("Invalid duration for {var}: {value}")]
    InvalidDuration { var: String, value: String },

    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

/// Type-safe reader for `RXH_` environment variables.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl EnvParser {
    pub fn new() -> Self {
        Self {
            prefix: "RXH_",
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn raw(&self, name: &str) -> Option<(String, String)> {
        let var_name = self.var_name(name);
        env::var(&var_name).ok().map(|value| (var_name, value))
    }

    /// String value; an empty variable counts as unset.
    pub fn get_string(&mut self, name: &str) -> Option<String> {
        self.raw(name)
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
    }

    /// Boolean value.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off, "" (for false)
    pub fn get_bool(&mut self, name: &str) -> Option<bool> {
        let (var, value) = self.raw(name)?;
        match parse_bool(&value) {
            Some(flag) => Some(flag),
            None => {
                self.errors.push(EnvError::InvalidValue {
                    var,
                    expected: "boolean (true/false/1/0/yes/no)".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// u16 value within `min..=max`.
    pub fn get_u16_range(&mut self, name: &str, min: u16, max: u16) -> Option<u16> {
        let (var, value) = self.raw(name)?;
        match value.trim().parse::<u16>() {
            Ok(n) if (min..=max).contains(&n) => Some(n),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var,
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                None
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var,
                    expected: "unsigned 16-bit integer".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Duration in humantime notation (`90s`, `5m`, `1h 30m`).
    pub fn get_duration(&mut self, name: &str) -> Option<Duration> {
        let (var, value) = self.raw(name)?;
        match humantime::parse_duration(value.trim()) {
            Ok(duration) => Some(duration),
            Err(_) => {
                self.errors.push(EnvError::InvalidDuration { var, value });
                None
            }
        }
    }

    /// Path value with `~/` expanded to the home directory.
    pub fn get_path(&mut self, name: &str) -> Option<PathBuf> {
        self.get_string(name).map(|value| expand_home(&value))
    }

    /// Log level, lowercased.
    pub fn get_log_level(&mut self, name: &str) -> Option<String> {
        let (var, value) = self.raw(name)?;
        let lower = value.to_lowercase();
        if LOG_LEVELS.contains(&lower.as_str()) {
            Some(lower)
        } else {
            self.errors.push(EnvError::InvalidLogLevel { var, value });
            None
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

pub(crate) fn expand_home(value: &str) -> PathBuf {
    match (value.strip_prefix("~/"), dirs::home_dir()) {
        (Some(stripped), Some(home)) => home.join(stripped),
        _ => PathBuf::from(value),
    }
}
