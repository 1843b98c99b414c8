//! In-memory transport for tests and rehearsals without an IBM i host.
//!
//! [`MockConnector`] hands out [`MockTransport`]s that share one
//! [`MockState`], so a test can inspect every call the workflow made after
//! the connection is gone.

use crate::errors::StageError;
use crate::ssh::{CommandOutput, Connector, RemoteTransport};
use crate::types::ConnectionConfig;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Connect { host: String },
    Exec { command: String },
    Upload { local: PathBuf, remote: String },
    Download { remote: String, local: PathBuf },
    ListDir { path: String },
    IsDir { path: String },
    MakeDir { path: String },
    Remove { path: String },
    Close,
}

/// Scripted behavior for the mock host.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub fail_connect: bool,
    pub fail_exec: bool,
    pub fail_close: bool,
    /// Exit code returned when a command contains the key.
    pub exit_codes: Vec<(String, i32)>,
    pub existing_dirs: HashSet<String>,
    /// Files already on the host, by absolute path.
    pub remote_files: HashMap<String, Vec<u8>>,
    /// Marker that appears in the listed directory on the Nth listing.
    pub marker: Option<MockMarker>,
}

#[derive(Debug, Clone)]
pub struct MockMarker {
    pub appears_on_listing: usize,
    pub name: String,
    pub contents: String,
}

impl MockConfig {
    /// Every operation succeeds; no marker is ever written.
    pub fn success() -> Self {
        Self::default()
    }

    pub fn connection_failure() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    pub fn with_exec_failure(mut self) -> Self {
        self.fail_exec = true;
        self
    }

    pub fn with_close_failure(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn with_exit_code(mut self, command_contains: impl Into<String>, code: i32) -> Self {
        self.exit_codes.push((command_contains.into(), code));
        self
    }

    pub fn with_existing_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.existing_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    pub fn with_remote_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.remote_files.insert(path.into(), contents.into());
        self
    }

    /// Write `name` with `contents` into the listed directory on listing `n` (1-based).
    pub fn with_marker_on(
        mut self,
        n: usize,
        name: impl Into<String>,
        contents: impl Into<String>,
    ) -> Self {
        self.marker = Some(MockMarker {
            appears_on_listing: n.max(1),
            name: name.into(),
            contents: contents.into(),
        });
        self
    }
}

/// Shared, inspectable host state.
#[derive(Debug, Default)]
pub struct MockState {
    calls: Vec<MockCall>,
    dirs: HashSet<String>,
    files: HashMap<String, Vec<u8>>,
    listings: usize,
}

impl MockState {
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Exec { command } => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Upload { remote, .. } => Some(remote.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn made_dirs(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                MockCall::MakeDir { path } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn listings(&self) -> usize {
        self.listings
    }

    /// Contents of a file uploaded to (or seeded on) the mock host.
    pub fn remote_file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.get(path).cloned()
    }
}

/// Connector that produces [`MockTransport`]s over one shared state.
#[derive(Debug, Clone)]
pub struct MockConnector {
    config: MockConfig,
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new(config: MockConfig) -> Self {
        let state = MockState {
            dirs: config.existing_dirs.clone(),
            files: config.remote_files.clone(),
            ..MockState::default()
        };
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, config: &ConnectionConfig) -> Result<MockTransport, StageError> {
        self.state().calls.push(MockCall::Connect {
            host: config.host.clone(),
        });
        if self.config.fail_connect {
            return Err(StageError::connection(&config.host, "mock connection refused"));
        }
        Ok(MockTransport {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MockTransport {
    config: MockConfig,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RemoteTransport for MockTransport {
    async fn exec(
        &mut self,
        command: &str,
        _timeout: Duration,
    ) -> Result<CommandOutput, StageError> {
        self.state().calls.push(MockCall::Exec {
            command: command.to_string(),
        });
        if self.config.fail_exec {
            return Err(StageError::connection("mock", "channel closed"));
        }
        let exit_code = self
            .config
            .exit_codes
            .iter()
            .find(|(key, _)| command.contains(key.as_str()))
            .map(|(_, code)| *code)
            .unwrap_or(0);
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                "mock failure".to_string()
            },
            exit_code,
        })
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<(), StageError> {
        let mut state = self.state();
        state.calls.push(MockCall::Upload {
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        let bytes = std::fs::read(local)
            .map_err(|e| StageError::transfer(local.display().to_string(), e))?;
        state.files.insert(remote.to_string(), bytes);
        Ok(())
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<(), StageError> {
        let bytes = {
            let mut state = self.state();
            state.calls.push(MockCall::Download {
                remote: remote.to_string(),
                local: local.to_path_buf(),
            });
            state.files.get(remote).cloned()
        };
        let bytes = bytes.ok_or_else(|| StageError::transfer(remote, "No such file"))?;
        std::fs::write(local, bytes)
            .map_err(|e| StageError::transfer(local.display().to_string(), e))
    }

    async fn list_dir(&mut self, remote: &str) -> Result<Vec<String>, StageError> {
        let mut state = self.state();
        state.calls.push(MockCall::ListDir {
            path: remote.to_string(),
        });
        state.listings += 1;

        if let Some(marker) = &self.config.marker
            && state.listings >= marker.appears_on_listing
        {
            let path = format!("{}/{}", remote.trim_end_matches('/'), marker.name);
            state
                .files
                .insert(path, marker.contents.clone().into_bytes());
        }

        let prefix = format!("{}/", remote.trim_end_matches('/'));
        let mut entries: Vec<String> = state
            .files
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect();
        entries.sort();
        Ok(entries)
    }

    async fn is_dir(&mut self, remote: &str) -> Result<bool, StageError> {
        let mut state = self.state();
        state.calls.push(MockCall::IsDir {
            path: remote.to_string(),
        });
        Ok(state.dirs.contains(remote))
    }

    async fn make_dir(&mut self, remote: &str) -> Result<(), StageError> {
        let mut state = self.state();
        state.calls.push(MockCall::MakeDir {
            path: remote.to_string(),
        });
        state.dirs.insert(remote.to_string());
        Ok(())
    }

    async fn remove_file(&mut self, remote: &str) -> Result<(), StageError> {
        let mut state = self.state();
        state.calls.push(MockCall::Remove {
            path: remote.to_string(),
        });
        state.files.remove(remote);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StageError> {
        self.state().calls.push(MockCall::Close);
        if self.config.fail_close {
            return Err(StageError::connection("mock", "close failed"));
        }
        Ok(())
    }
}
