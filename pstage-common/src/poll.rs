//! Completion polling for the remote batch job.
//!
//! The IBM i job signals completion by writing a `*.status` file into
//! `base/run`. There is no callback mechanism, so the directory is listed on
//! a fixed interval until a marker shows up or the deadline passes.

use crate::errors::{StageError, TimeoutKind};
use crate::plan::STATUS_SUFFIX;
use crate::ssh::{RemoteConnection, RemoteTransport};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Outcome recorded in a status marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerStatus {
    Success,
    Failure(String),
}

/// Classify marker contents.
///
/// Any occurrence of `FAILED` means failure; everything else, including an
/// empty file, is success. This is a substring check, not a status format.
pub fn classify(contents: &str) -> MarkerStatus {
    if contents.contains("FAILED") {
        MarkerStatus::Failure(contents.trim().to_string())
    } else {
        MarkerStatus::Success
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompletionPoller {
    interval: Duration,
}

impl Default for CompletionPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl CompletionPoller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// List `run_dir` now and then every interval until a marker appears.
    ///
    /// Returns the first entry ending in `.status`. Fails with
    /// [`StageError::Timeout`] once `timeout` has elapsed without one.
    pub async fn await_marker<T: RemoteTransport>(
        &self,
        connection: &mut RemoteConnection<T>,
        run_dir: &str,
        timeout: Duration,
    ) -> Result<String, StageError> {
        let deadline = Instant::now() + timeout;
        let mut listings = 0u32;

        loop {
            let entries = connection.list_dir(run_dir).await?;
            listings += 1;

            if let Some(name) = entries.into_iter().find(|n| n.ends_with(STATUS_SUFFIX)) {
                info!(marker = %name, listings, "status marker found");
                return Ok(name);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(StageError::timeout(
                    TimeoutKind::Marker,
                    format!("status marker in {run_dir}"),
                    timeout,
                ));
            }
            debug!(listings, run_dir, "no status marker yet");
            tokio::time::sleep(self.interval.min(deadline - now)).await;
        }
    }
}
