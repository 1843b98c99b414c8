use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

const STAGING_VARS: &[&str] = &[
    "IBMI_HOST",
    "IBMI_USER",
    "IBMI_PORT",
    "IBMI_SSH_KEY",
    "IBMI_PASSWORD",
    "LIB_STG",
    "IFS_STAGING_DIR",
    "JOBQ",
    "OUTQ",
    "ALLOW_AUTO_HOSTKEY",
    "IBMI_CONNECT_TIMEOUT_SECS",
    "PSTAGE_LOG_FILE",
];

/// A scratch directory with a payroll CSV and an isolated environment for
/// the `pstage` binary.
pub struct StagingEnv {
    pub dir: TempDir,
    pub csv: PathBuf,
    vars: Vec<(String, String)>,
}

impl StagingEnv {
    pub fn new() -> Self {
        crate::test_log!("FIXTURE: creating staging environment");

        let dir = TempDir::new().expect("Failed to create temp dir");
        let csv = dir.path().join("payroll.csv");
        fs::write(&csv, "employee,amount\r\n1001,2500.00\r\n").expect("Failed to write CSV");

        Self {
            dir,
            csv,
            vars: vec![
                ("IBMI_HOST".into(), "ibmi.invalid".into()),
                ("IBMI_USER".into(), "payroll".into()),
                ("LIB_STG".into(), "PAYSTG".into()),
                ("IFS_STAGING_DIR".into(), "/home/payroll/stage".into()),
            ],
        }
    }

    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.vars.retain(|(k, _)| k != key);
        self.vars.push((key.into(), value.into()));
        self
    }

    pub fn unset(mut self, key: &str) -> Self {
        self.vars.retain(|(k, _)| k != key);
        self
    }

    /// `pstage` with the scratch dir as cwd and only this fixture's settings.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pstage"));
        cmd.current_dir(self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join("xdg"))
            .env("PSTAGE_LOG", "warn");
        for var in STAGING_VARS {
            cmd.env_remove(var);
        }
        for (key, value) in &self.vars {
            cmd.env(key, value);
        }
        cmd
    }
}
