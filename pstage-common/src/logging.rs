//! Logging setup for the pstage binary.
//!
//! Events go to stderr (pretty or JSON) and, optionally, to a JSON log file
//! written through a non-blocking appender. The returned [`LoggingGuards`]
//! must be kept alive until exit or buffered file lines are lost.

use crate::errors::StageError;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Output format for the stderr layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" | "" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `pstage_common=debug`.
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    pub stderr: bool,
}

impl LogConfig {
    /// Read `PSTAGE_LOG`, `PSTAGE_LOG_FORMAT` and `PSTAGE_LOG_FILE`.
    ///
    /// Unknown formats fall back to pretty output.
    pub fn from_env(default_level: &str) -> Self {
        let level = std::env::var("PSTAGE_LOG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default_level.to_string());
        let format = std::env::var("PSTAGE_LOG_FORMAT")
            .ok()
            .and_then(|v| LogFormat::parse(&v))
            .unwrap_or_default();
        let file = std::env::var_os("PSTAGE_LOG_FILE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self {
            level,
            format,
            file,
            stderr: false,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    pub fn with_json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    fn filter(&self) -> Result<EnvFilter, StageError> {
        EnvFilter::try_new(&self.level)
            .map_err(|e| StageError::Config(format!("invalid log filter '{}': {}", self.level, e)))
    }
}

/// Flush guards for the file appender.
#[must_use = "dropping the guards stops the log file writer"]
pub struct LoggingGuards {
    _file: Vec<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards, StageError> {
    let filter = config.filter()?;
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guards = Vec::new();

    if config.stderr {
        let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
        layers.push(match config.format {
            LogFormat::Pretty => layer.boxed(),
            LogFormat::Json => layer.json().with_current_span(true).boxed(),
        });
    }

    if let Some(path) = &config.file {
        let (dir, name) = split_log_path(path)?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| StageError::Config(format!("cannot create {}: {}", dir.display(), e)))?;
        let appender = tracing_appender::rolling::never(dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| StageError::Config(format!("logging already initialized: {}", e)))?;

    Ok(LoggingGuards { _file: guards })
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf), StageError> {
    let name = path
        .file_name()
        .ok_or_else(|| StageError::Config(format!("log file path has no file name: {}", path.display())))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(name)))
}
