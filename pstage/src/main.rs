//! pstage - payroll staging for IBM i
//!
//! Converts a payroll spreadsheet to CSV, stages it on the IBM i IFS over
//! SSH, runs the staging-library setup, submits the batch import and waits
//! for the job's status marker.

#![forbid(unsafe_code)]

mod commands;

use anyhow::Result;
use clap::Parser;
use pstage_common::{LogConfig, StageError, init_logging};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "pstage")]
#[command(author, version, about = "Payroll staging hand-off to a remote IBM i host")]
pub struct Cli {
    /// Payroll input (.csv, .xlsx, .xls or .ods)
    #[arg(long, value_name = "PATH", required_unless_present = "teardown")]
    pub file: Option<PathBuf>,

    /// Upload the control scripts before running
    #[arg(long)]
    pub sync: bool,

    /// Download {stem}_result.csv after a successful run
    #[arg(long)]
    pub fetch_outputs: bool,

    /// Log every remote action without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Seconds to wait for the job's status marker
    #[arg(long, value_name = "N", default_value_t = 600)]
    pub timeout_seconds: u64,

    /// Seconds between status directory listings
    #[arg(long, value_name = "N", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_seconds: u64,

    /// Job queue for SBMJOB (default QSYSNOMAX)
    #[arg(long)]
    pub jobq: Option<String>,

    /// Output queue passed to the batch program (default QPRINT)
    #[arg(long)]
    pub outq: Option<String>,

    /// Staging library
    #[arg(long)]
    pub lib_stg: Option<String>,

    /// IFS staging base directory
    #[arg(long)]
    pub ifs_dir: Option<String>,

    /// Drop the staging library and exit
    #[arg(long)]
    pub teardown: bool,

    /// Environment file with IBMI_* settings
    #[arg(long, value_name = "PATH", default_value = ".env")]
    pub env_file: PathBuf,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Local directory holding setup.sql, apply.sql, process.clp, teardown.sql
    #[arg(long, value_name = "PATH", default_value = "ibmi")]
    pub scripts_dir: PathBuf,

    /// Local directory for status markers and results
    #[arg(long, value_name = "PATH", default_value = "outputs")]
    pub outputs_dir: PathBuf,

    /// Accept and record an unknown host key
    #[arg(long)]
    pub allow_unknown_host: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors exit 1 like every other failure; help and version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // PSTAGE_LOG wins over -v.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let log_config = LogConfig::from_env(default_level).with_stderr();
    let _logging_guards = match init_logging(&log_config) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("pstage: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = commands::load(&cli)?;
    if cli.teardown {
        commands::teardown::execute(&cli, config).await
    } else {
        commands::run::execute(&cli, config).await
    }
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<StageError>() {
        Some(stage) => {
            let code = stage.code();
            error!(code = %code.code_string(), error = %stage, "run failed");
            eprintln!("[{}] {}", code.code_string(), stage);
            for step in code.entry().remediation {
                eprintln!("  - {step}");
            }
        }
        None => {
            error!(error = %err, "run failed");
            eprintln!("error: {err:#}");
        }
    }
}
