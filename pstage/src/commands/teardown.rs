//! `pstage --teardown`: drop the staging library.

use crate::Cli;
use anyhow::Result;
use pstage_common::{CommandOutput, ConnectionConfig, StageConfig, StageError, ValidatedWorkflow};
use tracing::warn;

pub async fn execute(_cli: &Cli, config: StageConfig) -> Result<()> {
    let workflow = config.validated_workflow()?;
    let lib = workflow.lib_stg().to_string();
    let dry_run = config.connection.dry_run;

    let output = teardown(config.connection, workflow).await?;

    // A failing teardown script is reported but does not fail the command.
    if !output.success() {
        warn!(exit_code = output.exit_code, "teardown command returned non-zero");
        println!("Teardown of {lib} finished with exit code {}", output.exit_code);
    } else if dry_run {
        println!("DRY-RUN teardown of {lib}: no remote actions were performed");
    } else {
        println!("Teardown of {lib} complete");
    }
    Ok(())
}

#[cfg(unix)]
async fn teardown(
    connection: ConnectionConfig,
    workflow: ValidatedWorkflow,
) -> Result<CommandOutput, StageError> {
    use pstage_common::{ExternalConverter, SshConnector, Workflow};

    Workflow::new(SshConnector, ExternalConverter::default(), connection, workflow)
        .teardown()
        .await
}

#[cfg(not(unix))]
async fn teardown(
    connection: ConnectionConfig,
    _workflow: ValidatedWorkflow,
) -> Result<CommandOutput, StageError> {
    Err(StageError::connection(
        connection.host,
        "the OpenSSH transport is only available on Unix hosts",
    ))
}
