//! Command implementations for the pstage binary.

pub mod run;
pub mod teardown;

use crate::Cli;
use pstage_common::config::ConfigOverrides;
use pstage_common::{LoadOptions, StageConfig, StageError, load_config};
use tracing::debug;

/// Resolve configuration from the CLI flags and the environment.
pub fn load(cli: &Cli) -> Result<StageConfig, StageError> {
    let options = LoadOptions {
        env_file: Some(cli.env_file.clone()),
        config_file: cli.config.clone(),
        overrides: ConfigOverrides {
            jobq: cli.jobq.clone(),
            outq: cli.outq.clone(),
            lib_stg: cli.lib_stg.clone(),
            ifs_dir: cli.ifs_dir.clone(),
            allow_auto_hostkey: cli.allow_unknown_host,
            dry_run: cli.dry_run,
        },
    };
    let config = load_config(&options)?;
    debug!(
        host = %config.connection.host,
        user = %config.connection.user,
        lib_stg = %config.workflow.lib_stg,
        ifs_dir = %config.workflow.ifs_dir,
        "configuration loaded"
    );
    Ok(config)
}
