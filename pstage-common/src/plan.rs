//! Remote layout and command planning.
//!
//! Pure derivations from a validated workflow: no I/O, no connection. The
//! same plan drives a real run, a dry run and the tests.

use crate::errors::StageError;
use crate::sanitize::{ValidatedWorkflow, validate_identifier};

/// Control scripts synced to `base/scripts`, in upload order.
pub const CONTROL_SCRIPTS: [&str; 4] = ["setup.sql", "apply.sql", "process.clp", "teardown.sql"];

pub const SETUP_SCRIPT: &str = "setup.sql";
pub const TEARDOWN_SCRIPT: &str = "teardown.sql";

/// Suffix identifying a status marker in `base/run`.
pub const STATUS_SUFFIX: &str = ".status";

/// Remote layout and commands for one run.
#[derive(Debug, Clone)]
pub struct StagingPlan {
    workflow: ValidatedWorkflow,
}

impl StagingPlan {
    pub fn new(workflow: ValidatedWorkflow) -> Self {
        Self { workflow }
    }

    pub fn workflow(&self) -> &ValidatedWorkflow {
        &self.workflow
    }

    /// The five staging directories, base first.
    pub fn directories(&self) -> [String; 5] {
        plan(self.workflow.ifs_dir())
    }

    pub fn status_dir(&self) -> String {
        join(self.workflow.ifs_dir(), "run")
    }

    /// Remote path for an uploaded data file. The name is validated.
    pub fn remote_csv_path(&self, filename: &str) -> Result<String, StageError> {
        remote_csv_path(self.workflow.ifs_dir(), filename)
    }

    pub fn script_path(&self, script: &str) -> String {
        join(&join(self.workflow.ifs_dir(), "scripts"), script)
    }

    /// `base/out/{stem}_result.csv`.
    pub fn result_path(&self, stem: &str) -> Result<String, StageError> {
        let name = format!("{stem}_result.csv");
        validate_identifier(&name, "result file name")?;
        Ok(join(&join(self.workflow.ifs_dir(), "out"), &name))
    }

    /// `RUNSQLSTM` over `setup.sql` with the staging library bound.
    pub fn setup_command(&self) -> String {
        self.runsqlstm(SETUP_SCRIPT)
    }

    pub fn teardown_command(&self) -> String {
        self.runsqlstm(TEARDOWN_SCRIPT)
    }

    /// `SBMJOB` calling `{lib}/PROCESS` on the configured job queue.
    pub fn submit_command(&self) -> String {
        let w = &self.workflow;
        format!(
            "system \"SBMJOB CMD(CALL PGM({lib}/PROCESS) PARM('{lib}' '{dir}' '{outq}')) JOBQ({jobq})\"",
            lib = w.lib_stg(),
            dir = w.ifs_dir(),
            outq = w.outq(),
            jobq = w.jobq(),
        )
    }

    fn runsqlstm(&self, script: &str) -> String {
        format!(
            "system \"RUNSQLSTM SRCSTMF('{path}') SETVAR((LIB_STG '{lib}')) COMMIT(*NONE) NAMING(*SQL)\"",
            path = self.script_path(script),
            lib = self.workflow.lib_stg(),
        )
    }
}

/// The five staging directories under `base_dir`, base first.
pub fn plan(base_dir: &str) -> [String; 5] {
    [
        base_dir.to_string(),
        join(base_dir, "in"),
        join(base_dir, "out"),
        join(base_dir, "run"),
        join(base_dir, "scripts"),
    ]
}

pub fn remote_csv_path(base_dir: &str, filename: &str) -> Result<String, StageError> {
    let filename = validate_identifier(filename, "csv file name")?;
    Ok(join(&join(base_dir, "in"), filename))
}

fn join(base: &str, child: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{child}")
    } else {
        format!("{base}/{child}")
    }
}
