//! Remote connection to the IBM i host.
//!
//! [`RemoteTransport`] is the narrow seam over the SSH session (run a
//! command, copy a file, list a directory). [`RemoteConnection`] wraps a
//! transport with the behavior every caller relies on: dry-run short
//! circuits, recursive directory creation, exit-code reporting and an
//! idempotent close that never raises.

#[cfg(unix)]
mod session;

#[cfg(unix)]
pub use session::{SshConnector, SshTransport};

use crate::errors::StageError;
use crate::types::ConnectionConfig;
use crate::util::mask_sensitive_command;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What to do when the host key is not in `known_hosts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownHostsPolicy {
    /// Refuse unknown hosts.
    #[default]
    Strict,
    /// Accept unknown hosts and record their key.
    Add,
}

/// Result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Operations an authenticated session must provide.
#[allow(async_fn_in_trait)]
pub trait RemoteTransport {
    async fn exec(&mut self, command: &str, timeout: Duration)
    -> Result<CommandOutput, StageError>;
    async fn upload(&mut self, local: &Path, remote: &str) -> Result<(), StageError>;
    async fn download(&mut self, remote: &str, local: &Path) -> Result<(), StageError>;
    async fn list_dir(&mut self, remote: &str) -> Result<Vec<String>, StageError>;
    async fn is_dir(&mut self, remote: &str) -> Result<bool, StageError>;
    async fn make_dir(&mut self, remote: &str) -> Result<(), StageError>;
    async fn remove_file(&mut self, remote: &str) -> Result<(), StageError>;
    async fn close(&mut self) -> Result<(), StageError>;
}

/// Opens transports. One call per workflow invocation.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Transport: RemoteTransport;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Transport, StageError>;
}

/// A single remote session, exclusively owned by one run.
pub struct RemoteConnection<T: RemoteTransport> {
    host: String,
    transport: Option<T>,
    dry_run: bool,
    closed: bool,
}

impl<T: RemoteTransport> RemoteConnection<T> {
    /// Connect, or in dry-run mode just log the intent.
    pub async fn open<C>(connector: &C, config: &ConnectionConfig) -> Result<Self, StageError>
    where
        C: Connector<Transport = T>,
    {
        if config.dry_run {
            info!(host = %config.host, "DRY-RUN connect");
            return Ok(Self {
                host: config.host.clone(),
                transport: None,
                dry_run: true,
                closed: false,
            });
        }

        let start = Instant::now();
        let transport = connector.connect(config).await?;
        debug!(
            host = %config.host,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "connected"
        );
        Ok(Self {
            host: config.host.clone(),
            transport: Some(transport),
            dry_run: false,
            closed: false,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn transport(&mut self) -> Result<&mut T, StageError> {
        if self.closed {
            return Err(StageError::connection(&self.host, "connection already closed"));
        }
        self.transport
            .as_mut()
            .ok_or_else(|| StageError::connection(&self.host, "no active session"))
    }

    /// Run one command. A non-zero exit code is returned, not raised.
    pub async fn run(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, StageError> {
        info!(command = %mask_sensitive_command(command), "SSH");
        if self.dry_run {
            return Ok(CommandOutput::default());
        }

        let start = Instant::now();
        let output = self.transport()?.exec(command, timeout).await?;
        debug!(
            exit_code = output.exit_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "command finished"
        );
        if !output.success() {
            error!(
                exit_code = output.exit_code,
                stderr = %output.stderr.trim(),
                "Command failed"
            );
        }
        Ok(output)
    }

    pub async fn put(&mut self, local: &Path, remote: &str) -> Result<(), StageError> {
        info!(local = %local.display(), remote, "PUT");
        if self.dry_run {
            return Ok(());
        }
        let start = Instant::now();
        self.transport()?.upload(local, remote).await?;
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "PUT done");
        Ok(())
    }

    /// Download `remote` to `local`, creating the local parent directory.
    pub async fn get(&mut self, remote: &str, local: &Path) -> Result<(), StageError> {
        info!(remote, local = %local.display(), "GET");
        if self.dry_run {
            return Ok(());
        }
        if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StageError::transfer(parent.display().to_string(), e))?;
        }
        let start = Instant::now();
        self.transport()?.download(remote, local).await?;
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "GET done");
        Ok(())
    }

    pub async fn list_dir(&mut self, remote: &str) -> Result<Vec<String>, StageError> {
        debug!(remote, "LIST");
        if self.dry_run {
            return Ok(Vec::new());
        }
        self.transport()?.list_dir(remote).await
    }

    pub async fn remove(&mut self, remote: &str) -> Result<(), StageError> {
        info!(remote, "RM");
        if self.dry_run {
            return Ok(());
        }
        self.transport()?.remove_file(remote).await
    }

    /// Create `path` and any missing ancestors, like `mkdir -p`.
    ///
    /// Segments are checked top to bottom and only missing ones are created,
    /// so a partially created tree is completed on retry.
    pub async fn ensure_dir(&mut self, path: &str) -> Result<(), StageError> {
        if self.dry_run {
            info!(path, "DRY-RUN ensure_dir");
            return Ok(());
        }

        let transport = self.transport()?;
        let mut creating = false;
        for segment in ancestor_paths(path) {
            if !creating && transport.is_dir(&segment).await? {
                continue;
            }
            creating = true;
            info!(path = %segment, "MKDIR");
            transport.make_dir(&segment).await?;
        }
        Ok(())
    }

    /// Close the session. Safe to call repeatedly; failures are only logged.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(mut transport) = self.transport.take() {
            match transport.close().await {
                Ok(()) => debug!(host = %self.host, "connection closed"),
                Err(e) => warn!(host = %self.host, error = %e, "failed to close connection"),
            }
        }
    }
}

impl<T: RemoteTransport> Drop for RemoteConnection<T> {
    fn drop(&mut self) {
        if !self.closed && self.transport.is_some() {
            warn!(host = %self.host, "connection dropped without close; releasing session");
        }
    }
}

/// Every prefix of `path` that names a directory, shortest first.
///
/// `"/a/b/c"` yields `["/a", "/a/b", "/a/b/c"]`; empty and `.` segments are
/// skipped. The root itself is never returned.
pub fn ancestor_paths(path: &str) -> Vec<String> {
    let absolute = path.starts_with('/');
    let mut current = String::new();
    let mut paths = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if absolute || !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        paths.push(current.clone());
    }
    paths
}
