//! Source tracking for layered configuration values.

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Where a configuration value came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Default,
    File,
    DotEnv,
    Environment,
    Cli,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::File => write!(f, "config file"),
            Self::DotEnv => write!(f, ".env"),
            Self::Environment => write!(f, "environment"),
            Self::Cli => write!(f, "command line"),
        }
    }
}

/// A value with its source and, when known, the variable, key or flag that set it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
    pub origin: Option<String>,
}

impl<T> Sourced<T> {
    pub fn default_value(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Default,
            origin: None,
        }
    }

    pub fn from_env(value: T, var: impl Into<String>) -> Self {
        Self {
            value,
            source: ConfigSource::Environment,
            origin: Some(var.into()),
        }
    }

    pub fn from_dotenv(value: T, var: impl Into<String>) -> Self {
        Self {
            value,
            source: ConfigSource::DotEnv,
            origin: Some(var.into()),
        }
    }

    pub fn from_file(value: T, path: &Path, key: &str) -> Self {
        Self {
            value,
            source: ConfigSource::File,
            origin: Some(format!("{}:{}", path.display(), key)),
        }
    }

    pub fn from_cli(value: T, flag: &str) -> Self {
        Self {
            value,
            source: ConfigSource::Cli,
            origin: Some(flag.to_string()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced {
            value: f(self.value),
            source: self.source,
            origin: self.origin,
        }
    }

    /// Human-readable provenance, e.g. `environment (IBMI_HOST)`.
    pub fn describe(&self) -> String {
        match &self.origin {
            Some(origin) => format!("{} ({})", self.source, origin),
            None => self.source.to_string(),
        }
    }
}
