//! Common types used across pstage components.

use crate::ssh::KnownHostsPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// SSH connection settings for the IBM i host.
///
/// Immutable for the lifetime of one connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Private key handed to ssh as `-i`.
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub known_hosts: KnownHostsPolicy,
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Log every network action instead of performing it.
    #[serde(default)]
    pub dry_run: bool,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            port: default_port(),
            identity_file: None,
            password: None,
            known_hosts: KnownHostsPolicy::default(),
            connect_timeout: default_connect_timeout(),
            dry_run: false,
        }
    }

    /// `user@host` destination string.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("identity_file", &self.identity_file)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("known_hosts", &self.known_hosts)
            .field("connect_timeout", &self.connect_timeout)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// Remote staging identifiers, as loaded. Not yet validated.
///
/// The workflow only accepts [`crate::sanitize::ValidatedWorkflow`], which is
/// built from this record by running every field through the sanitizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// IFS base directory, e.g. `/home/payroll/stage`.
    pub ifs_dir: String,
    /// Staging library (schema) name.
    pub lib_stg: String,
    #[serde(default = "default_outq")]
    pub outq: String,
    #[serde(default = "default_jobq")]
    pub jobq: String,
}

pub(crate) fn default_outq() -> String {
    "QPRINT".to_string()
}

pub(crate) fn default_jobq() -> String {
    "QSYSNOMAX".to_string()
}

/// Per-invocation switches for [`crate::Workflow::run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Upload the control scripts before running.
    pub sync_scripts: bool,
    /// Try to download `{stem}_result.csv` after success.
    pub fetch_outputs: bool,
    /// Deadline for the status marker.
    pub timeout: Duration,
    /// Local directory holding the control scripts.
    pub scripts_dir: PathBuf,
    /// Local directory for downloaded markers and results.
    pub outputs_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            sync_scripts: false,
            fetch_outputs: false,
            timeout: Duration::from_secs(600),
            scripts_dir: PathBuf::from("ibmi"),
            outputs_dir: PathBuf::from("outputs"),
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub dry_run: bool,
    pub local_csv: PathBuf,
    pub sha256: String,
    pub remote_csv: String,
    pub scripts_synced: usize,
    /// Marker name, absent in dry-run.
    pub marker: Option<String>,
    pub marker_contents: Option<String>,
    /// Local path of the fetched result CSV, if one was retrieved.
    pub result_file: Option<PathBuf>,
    pub elapsed_ms: u64,
}
