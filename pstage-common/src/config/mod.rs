//! Configuration loading for pstage.
//!
//! Values are layered, lowest precedence first: built-in defaults, the TOML
//! file, the `.env` file, the process environment, command-line overrides.
//! Every resolved value keeps its [`ConfigSource`] for diagnostics.

pub mod dotenv;
pub mod env;
pub mod file;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use file::FileConfig;
pub use source::{ConfigSource, Sourced};

use crate::errors::StageError;
use crate::sanitize::ValidatedWorkflow;
use crate::ssh::KnownHostsPolicy;
use crate::types::{ConnectionConfig, WorkflowConfig, default_jobq, default_outq};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub jobq: Option<String>,
    pub outq: Option<String>,
    pub lib_stg: Option<String>,
    pub ifs_dir: Option<String>,
    /// `--allow-unknown-host`; only ever relaxes the policy.
    pub allow_auto_hostkey: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// `.env` file; a missing file is ignored.
    pub env_file: Option<PathBuf>,
    /// Explicit TOML file. When `None` the per-user default is used if present.
    pub config_file: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub connection: ConnectionConfig,
    pub workflow: WorkflowConfig,
    /// Provenance of each resolved key.
    pub sources: BTreeMap<&'static str, String>,
}

impl StageConfig {
    /// Run every workflow field through the sanitizer.
    pub fn validated_workflow(&self) -> Result<ValidatedWorkflow, StageError> {
        ValidatedWorkflow::new(&self.workflow)
    }
}

/// Resolve configuration from every layer.
///
/// Missing required keys and malformed values are collected and reported in
/// a single [`StageError::Config`].
pub fn load_config(options: &LoadOptions) -> Result<StageConfig, StageError> {
    let (file, file_path) = load_file_layer(options.config_file.as_deref())?;
    let path = file_path.as_deref();
    let dotenv = match &options.env_file {
        Some(env_file) => dotenv::load_file(env_file)
            .map_err(|e| StageError::Config(e.to_string()))?
            .unwrap_or_default(),
        None => Default::default(),
    };
    let mut parser = EnvParser::with_dotenv(dotenv);
    let cli = &options.overrides;
    let conn = file.connection;
    let wf = file.workflow;

    let host = parser
        .get_string("IBMI_HOST")
        .or_else(|| file_value(path, "connection.host", conn.host));
    let user = parser
        .get_string("IBMI_USER")
        .or_else(|| file_value(path, "connection.user", conn.user));
    let port = parser
        .get_port("IBMI_PORT")
        .or_else(|| file_value(path, "connection.port", conn.port))
        .unwrap_or_else(|| Sourced::default_value(22));
    let identity_file = parser.get_path("IBMI_SSH_KEY").or_else(|| {
        file_value(
            path,
            "connection.identity_file",
            conn.identity_file.as_deref().map(env::expand_home),
        )
    });
    let password = parser.get_string("IBMI_PASSWORD");
    let connect_timeout = parser
        .get_u64_range("IBMI_CONNECT_TIMEOUT_SECS", 1, 600)
        .or_else(|| {
            file_value(
                path,
                "connection.connect_timeout_secs",
                conn.connect_timeout_secs,
            )
        })
        .unwrap_or_else(|| Sourced::default_value(30));
    let auto_hostkey = if cli.allow_auto_hostkey {
        Sourced::from_cli(true, "--allow-unknown-host")
    } else {
        parser
            .get_bool("ALLOW_AUTO_HOSTKEY")
            .or_else(|| file_value(path, "connection.allow_auto_hostkey", conn.allow_auto_hostkey))
            .unwrap_or_else(|| Sourced::default_value(false))
    };

    let lib_stg = cli_value("--lib-stg", cli.lib_stg.as_deref())
        .or_else(|| parser.get_string("LIB_STG"))
        .or_else(|| file_value(path, "workflow.lib_stg", wf.lib_stg));
    let ifs_dir = cli_value("--ifs-dir", cli.ifs_dir.as_deref())
        .or_else(|| parser.get_string("IFS_STAGING_DIR"))
        .or_else(|| file_value(path, "workflow.ifs_dir", wf.ifs_dir));
    let outq = cli_value("--outq", cli.outq.as_deref())
        .or_else(|| parser.get_string("OUTQ"))
        .or_else(|| file_value(path, "workflow.outq", wf.outq))
        .unwrap_or_else(|| Sourced::default_value(default_outq()));
    let jobq = cli_value("--jobq", cli.jobq.as_deref())
        .or_else(|| parser.get_string("JOBQ"))
        .or_else(|| file_value(path, "workflow.jobq", wf.jobq))
        .unwrap_or_else(|| Sourced::default_value(default_jobq()));

    let mut problems: Vec<String> = parser
        .take_errors()
        .iter()
        .map(ToString::to_string)
        .collect();
    for (name, missing) in [
        ("IBMI_HOST", host.is_none()),
        ("IBMI_USER", user.is_none()),
        ("LIB_STG", lib_stg.is_none()),
        ("IFS_STAGING_DIR", ifs_dir.is_none()),
    ] {
        if missing {
            problems.push(format!("{name} is required"));
        }
    }
    let (Some(host), Some(user), Some(lib_stg), Some(ifs_dir)) = (host, user, lib_stg, ifs_dir)
    else {
        return Err(StageError::Config(problems.join("; ")));
    };
    if !problems.is_empty() {
        return Err(StageError::Config(problems.join("; ")));
    }

    let mut sources = BTreeMap::new();
    sources.insert("host", host.describe());
    sources.insert("user", user.describe());
    sources.insert("port", port.describe());
    sources.insert("connect_timeout", connect_timeout.describe());
    sources.insert("allow_auto_hostkey", auto_hostkey.describe());
    sources.insert("lib_stg", lib_stg.describe());
    sources.insert("ifs_dir", ifs_dir.describe());
    sources.insert("outq", outq.describe());
    sources.insert("jobq", jobq.describe());
    if let Some(key) = &identity_file {
        sources.insert("identity_file", key.describe());
    }
    if let Some(password) = &password {
        sources.insert("password", password.describe());
    }
    for (key, source) in &sources {
        debug!(key, source = %source, "config value resolved");
    }

    let connection = ConnectionConfig {
        host: host.value,
        user: user.value,
        port: port.value,
        identity_file: identity_file.map(|s| s.value),
        password: password.map(|s| s.value),
        known_hosts: if auto_hostkey.value {
            KnownHostsPolicy::Add
        } else {
            KnownHostsPolicy::Strict
        },
        connect_timeout: Duration::from_secs(connect_timeout.value),
        dry_run: cli.dry_run,
    };
    let workflow = WorkflowConfig {
        ifs_dir: ifs_dir.value,
        lib_stg: lib_stg.value,
        outq: outq.value,
        jobq: jobq.value,
    };

    Ok(StageConfig {
        connection,
        workflow,
        sources,
    })
}

fn load_file_layer(explicit: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), StageError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match file::default_path().filter(|p| p.is_file()) {
            Some(path) => path,
            None => return Ok((FileConfig::default(), None)),
        },
    };
    debug!(path = %path.display(), "loading config file");
    Ok((file::load(&path)?, Some(path)))
}

fn file_value<T>(path: Option<&Path>, key: &str, value: Option<T>) -> Option<Sourced<T>> {
    let path = path?;
    value.map(|v| Sourced::from_file(v, path, key))
}

fn cli_value(flag: &str, value: Option<&str>) -> Option<Sourced<String>> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| Sourced::from_cli(v.to_string(), flag))
}
