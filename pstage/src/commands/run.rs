//! `pstage --file PATH`: stage, submit and wait.

use crate::Cli;
use anyhow::{Context, Result};
use pstage_common::{
    ConnectionConfig, RunOptions, RunReport, StageConfig, StageError, ValidatedWorkflow,
};
use std::path::Path;
use std::time::Duration;

pub async fn execute(cli: &Cli, config: StageConfig) -> Result<()> {
    let input = cli
        .file
        .as_deref()
        .ok_or_else(|| StageError::input("", "--file is required"))?;
    let workflow = config.validated_workflow()?;
    let options = RunOptions {
        sync_scripts: cli.sync,
        fetch_outputs: cli.fetch_outputs,
        timeout: Duration::from_secs(cli.timeout_seconds),
        scripts_dir: cli.scripts_dir.clone(),
        outputs_dir: cli.outputs_dir.clone(),
    };
    let poll_interval = Duration::from_secs(cli.poll_interval_seconds);

    let report = stage(config.connection, workflow, input, &options, poll_interval).await?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("serializing run report")?;
        println!("{json}");
    } else {
        print_summary(&report);
    }
    Ok(())
}

#[cfg(unix)]
async fn stage(
    connection: ConnectionConfig,
    workflow: ValidatedWorkflow,
    input: &Path,
    options: &RunOptions,
    poll_interval: Duration,
) -> Result<RunReport, StageError> {
    use pstage_common::{CompletionPoller, ExternalConverter, SshConnector, Workflow};

    Workflow::new(
        SshConnector,
        ExternalConverter::from_env(),
        connection,
        workflow,
    )
    .with_poller(CompletionPoller::new(poll_interval))
    .run(input, options)
    .await
}

#[cfg(not(unix))]
async fn stage(
    connection: ConnectionConfig,
    _workflow: ValidatedWorkflow,
    _input: &Path,
    _options: &RunOptions,
    _poll_interval: Duration,
) -> Result<RunReport, StageError> {
    Err(StageError::connection(
        connection.host,
        "the OpenSSH transport is only available on Unix hosts",
    ))
}

fn print_summary(report: &RunReport) {
    if report.dry_run {
        println!("DRY-RUN complete ({}): no remote actions were performed", report.run_id);
    } else {
        println!("Run {} completed in {} ms", report.run_id, report.elapsed_ms);
    }
    println!("  local csv:  {}", report.local_csv.display());
    println!("  sha256:     {}", report.sha256);
    println!("  remote csv: {}", report.remote_csv);
    if report.scripts_synced > 0 {
        println!("  scripts:    {} synced", report.scripts_synced);
    }
    if let Some(marker) = &report.marker {
        println!(
            "  marker:     {} ({})",
            marker,
            report.marker_contents.as_deref().unwrap_or("").trim()
        );
    }
    if let Some(result) = &report.result_file {
        println!("  result:     {}", result.display());
    }
}
