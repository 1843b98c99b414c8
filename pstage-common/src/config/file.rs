//! Optional TOML configuration file.
//!
//! ```toml
//! [connection]
//! host = "ibmi.example.com"
//! user = "payroll"
//! port = 22
//! identity_file = "~/.ssh/id_ed25519"
//! connect_timeout_secs = 30
//! allow_auto_hostkey = false
//!
//! [workflow]
//! ifs_dir = "/home/payroll/stage"
//! lib_stg = "PAYSTG"
//! outq = "QPRINT"
//! jobq = "QSYSNOMAX"
//! ```
//!
//! Passwords are deliberately not accepted here.

use crate::errors::StageError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub connection: ConnectionSection,
    pub workflow: WorkflowSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSection {
    pub host: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub allow_auto_hostkey: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowSection {
    pub ifs_dir: Option<String>,
    pub lib_stg: Option<String>,
    pub outq: Option<String>,
    pub jobq: Option<String>,
}

/// `$XDG_CONFIG_HOME/pstage/config.toml` (platform equivalent elsewhere).
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pstage").join("config.toml"))
}

pub fn load(path: &Path) -> Result<FileConfig, StageError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| StageError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| StageError::Config(format!("invalid config file {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[connection]
host = "ibmi.example"
user = "payroll"
port = 2222
allow_auto_hostkey = true

[workflow]
ifs_dir = "/home/payroll/stage"
lib_stg = "PAYSTG"
"#,
        )
        .unwrap();

        let cfg = load(&path).unwrap();
        assert_eq!(cfg.connection.host.as_deref(), Some("ibmi.example"));
        assert_eq!(cfg.connection.port, Some(2222));
        assert_eq!(cfg.connection.allow_auto_hostkey, Some(true));
        assert_eq!(cfg.workflow.lib_stg.as_deref(), Some("PAYSTG"));
        assert!(cfg.workflow.jobq.is_none());
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        assert_eq!(load(&path).unwrap(), FileConfig::default());
    }

    #[test]
    fn test_password_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[connection]\npassword = \"hunter2\"\n").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, StageError::Config(_)));
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_unreadable_file_is_config_error() {
        let err = load(Path::new("/nonexistent/pstage.toml")).unwrap_err();
        assert!(matches!(err, StageError::Config(_)));
    }
}
