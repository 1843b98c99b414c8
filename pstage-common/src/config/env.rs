//! Environment variable parsing with type safety.
//!
//! Looks up each variable in the process environment first and the parsed
//! `.env` map second. Parse errors are collected so every problem can be
//! reported at once.

use super::source::Sourced;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },
}

/// Typed reader over the process environment layered on a `.env` map.
///
/// Every getter returns `None` when the variable is unset or empty, so
/// callers can overlay the result on lower-precedence layers.
pub struct EnvParser {
    dotenv: HashMap<String, String>,
    errors: Vec<EnvError>,
}

impl EnvParser {
    pub fn new() -> Self {
        Self::with_dotenv(HashMap::new())
    }

    pub fn with_dotenv(dotenv: HashMap<String, String>) -> Self {
        Self {
            dotenv,
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

    fn lookup(&self, var: &str) -> Option<Sourced<String>> {
        if let Ok(value) = env::var(var)
            && !value.is_empty()
        {
            return Some(Sourced::from_env(value, var));
        }
        self.dotenv
            .get(var)
            .filter(|v| !v.is_empty())
            .map(|v| Sourced::from_dotenv(v.clone(), var))
    }

    pub fn get_string(&mut self, var: &str) -> Option<Sourced<String>> {
        self.lookup(var)
    }

    /// Accepts 1/true/yes/on and 0/false/no/off, case-insensitive.
    pub fn get_bool(&mut self, var: &str) -> Option<Sourced<bool>> {
        let raw = self.lookup(var)?;
        match parse_bool_string(&raw.value) {
            Some(b) => Some(raw.map(|_| b)),
            None => {
                self.errors.push(EnvError::InvalidValue {
                    var: var.to_string(),
                    expected: "boolean (true/false/1/0/yes/no)".to_string(),
                    value: raw.value,
                });
                None
            }
        }
    }

    pub fn get_u64_range(&mut self, var: &str, min: u64, max: u64) -> Option<Sourced<u64>> {
        let raw = self.lookup(var)?;
        match raw.value.trim().parse::<u64>() {
            Ok(n) if (min..=max).contains(&n) => Some(raw.map(|_| n)),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var.to_string(),
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                None
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var.to_string(),
                    expected: "unsigned integer".to_string(),
                    value: raw.value,
                });
                None
            }
        }
    }

    pub fn get_port(&mut self, var: &str) -> Option<Sourced<u16>> {
        self.get_u64_range(var, 1, u64::from(u16::MAX))
            .map(|s| s.map(|n| n as u16))
    }

    /// A path with a leading `~/` expanded to the home directory.
    pub fn get_path(&mut self, var: &str) -> Option<Sourced<PathBuf>> {
        self.lookup(var).map(|s| s.map(|v| expand_home(&v)))
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn parse_bool_string(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(crate) fn expand_home(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(value)),
        None => PathBuf::from(value),
    }
}
