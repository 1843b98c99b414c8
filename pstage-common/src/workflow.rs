//! Workflow orchestrator.
//!
//! One [`Workflow::run`] is a strictly sequential chain over a single
//! connection:
//!
//! ```text
//! prepare input -> stage dirs -> [sync scripts] -> upload data
//!   -> remote setup -> submit job -> [await marker -> [fetch result]]
//! ```
//!
//! The connection is closed on every exit path. Nothing is retried.

use crate::convert::{ExternalConverter, SpreadsheetConverter};
use crate::errors::StageError;
use crate::plan::{CONTROL_SCRIPTS, STATUS_SUFFIX, StagingPlan};
use crate::poll::{CompletionPoller, MarkerStatus, classify};
use crate::prepare::{PreparedInput, prepare_input};
use crate::sanitize::{ValidatedWorkflow, validate_argument, validate_identifier};
use crate::ssh::{CommandOutput, Connector, RemoteConnection, RemoteTransport};
use crate::types::{ConnectionConfig, RunOptions, RunReport};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, Span, info, info_span, warn};

/// Per-command timeout for setup, submit and teardown.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Workflow<C: Connector, V: SpreadsheetConverter = ExternalConverter> {
    connector: C,
    converter: V,
    connection: ConnectionConfig,
    plan: StagingPlan,
    poller: CompletionPoller,
    command_timeout: Duration,
    run_id: String,
    span: Span,
}

#[derive(Default)]
struct Completion {
    marker: Option<(String, String)>,
    result_file: Option<PathBuf>,
}

impl<C: Connector, V: SpreadsheetConverter> Workflow<C, V> {
    /// The workflow only accepts identifiers that already passed the sanitizer.
    pub fn new(
        connector: C,
        converter: V,
        connection: ConnectionConfig,
        workflow: ValidatedWorkflow,
    ) -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("pstage_run", run_id = %run_id, host = %connection.host);
        Self {
            connector,
            converter,
            connection,
            plan: StagingPlan::new(workflow),
            poller: CompletionPoller::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            run_id,
            span,
        }
    }

    pub fn with_poller(mut self, poller: CompletionPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Replace the run span. Every stage is recorded inside it.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn plan(&self) -> &StagingPlan {
        &self.plan
    }

    pub async fn run(&self, input: &Path, options: &RunOptions) -> Result<RunReport, StageError> {
        self.run_inner(input, options)
            .instrument(self.span.clone())
            .await
    }

    async fn run_inner(&self, input: &Path, options: &RunOptions) -> Result<RunReport, StageError> {
        let started_at = chrono::Utc::now();
        let start = Instant::now();
        info!(
            input = %input.display(),
            dry_run = self.connection.dry_run,
            sync = options.sync_scripts,
            fetch_outputs = options.fetch_outputs,
            "run started"
        );

        let stage = Instant::now();
        let prepared = prepare_input(input, &self.converter).await?;
        let remote_csv = self.plan.remote_csv_path(&prepared.file_name)?;
        let setup = self.plan.setup_command();
        let submit = self.plan.submit_command();
        validate_argument(&setup, "setup command")?;
        validate_argument(&submit, "submit command")?;
        let scripts = if options.sync_scripts {
            local_scripts(&options.scripts_dir)?
        } else {
            Vec::new()
        };
        stage_done("prepare_input", stage);

        let mut conn = RemoteConnection::open(&self.connector, &self.connection).await?;
        let outcome = self
            .stages(&mut conn, &prepared, &remote_csv, &scripts, &setup, &submit, options)
            .await;
        conn.close().await;
        let completion = outcome?;

        let (marker, marker_contents) = completion.marker.unzip();
        let report = RunReport {
            run_id: self.run_id.clone(),
            started_at,
            dry_run: self.connection.dry_run,
            local_csv: prepared.csv_path,
            sha256: prepared.sha256,
            remote_csv,
            scripts_synced: scripts.len(),
            marker,
            marker_contents,
            result_file: completion.result_file,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(elapsed_ms = report.elapsed_ms, "run finished");
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn stages<T: RemoteTransport>(
        &self,
        conn: &mut RemoteConnection<T>,
        prepared: &PreparedInput,
        remote_csv: &str,
        scripts: &[(PathBuf, &'static str)],
        setup: &str,
        submit: &str,
        options: &RunOptions,
    ) -> Result<Completion, StageError> {
        let stage = Instant::now();
        for dir in self.plan.directories() {
            conn.ensure_dir(&dir).await?;
        }
        stage_done("stage_dirs", stage);

        if !scripts.is_empty() {
            let stage = Instant::now();
            for (local, name) in scripts {
                conn.put(local, &self.plan.script_path(name)).await?;
            }
            stage_done("sync_scripts", stage);
        }

        let stage = Instant::now();
        conn.put(&prepared.csv_path, remote_csv).await?;
        stage_done("upload_data", stage);

        let stage = Instant::now();
        conn.run(setup, self.command_timeout).await?;
        stage_done("remote_setup", stage);

        let stage = Instant::now();
        if !conn.is_dry_run() {
            self.clear_stale_markers(conn).await?;
        }
        conn.run(submit, self.command_timeout).await?;
        stage_done("submit_job", stage);

        if conn.is_dry_run() {
            info!("DRY-RUN: skipping completion polling");
            return Ok(Completion::default());
        }

        let stage = Instant::now();
        let status_dir = self.plan.status_dir();
        let marker = self
            .poller
            .await_marker(conn, &status_dir, options.timeout)
            .await?;
        validate_identifier(&marker, "status marker")?;
        let local_marker = options.outputs_dir.join(&marker);
        conn.get(&format!("{}/{}", status_dir.trim_end_matches('/'), marker), &local_marker)
            .await?;
        let bytes = tokio::fs::read(&local_marker)
            .await
            .map_err(|e| StageError::transfer(local_marker.display().to_string(), e))?;
        let contents = String::from_utf8_lossy(&bytes).into_owned();
        stage_done("await_completion", stage);

        if let MarkerStatus::Failure(reason) = classify(&contents) {
            return Err(StageError::RemoteJob(reason));
        }
        info!(marker = %marker, "remote job completed");

        let result_file = if options.fetch_outputs {
            self.fetch_result(conn, &prepared.stem, &options.outputs_dir)
                .await
        } else {
            None
        };

        Ok(Completion {
            marker: Some((marker, contents)),
            result_file,
        })
    }

    /// Remove markers left in the status directory by an earlier run.
    async fn clear_stale_markers<T: RemoteTransport>(
        &self,
        conn: &mut RemoteConnection<T>,
    ) -> Result<(), StageError> {
        let status_dir = self.plan.status_dir();
        let stale: Vec<String> = conn
            .list_dir(&status_dir)
            .await?
            .into_iter()
            .filter(|name| name.ends_with(STATUS_SUFFIX))
            .collect();
        for name in stale {
            validate_identifier(&name, "status marker")?;
            warn!(marker = %name, "removing stale status marker");
            conn.remove(&format!("{}/{}", status_dir.trim_end_matches('/'), name))
                .await?;
        }
        Ok(())
    }

    /// Best-effort download of `{stem}_result.csv`. Failures only warn.
    async fn fetch_result<T: RemoteTransport>(
        &self,
        conn: &mut RemoteConnection<T>,
        stem: &str,
        outputs_dir: &Path,
    ) -> Option<PathBuf> {
        let remote = match self.plan.result_path(stem) {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "Fetch outputs skipped");
                return None;
            }
        };
        let local = outputs_dir.join(format!("{stem}_result.csv"));
        match conn.get(&remote, &local).await {
            Ok(()) => Some(local),
            Err(e) => {
                warn!(remote = %remote, error = %e, "Fetch outputs skipped");
                None
            }
        }
    }

    /// Run the teardown script. The connection is closed even if the command fails.
    pub async fn teardown(&self) -> Result<CommandOutput, StageError> {
        let command = self.plan.teardown_command();
        async {
            validate_argument(&command, "teardown command")?;
            let mut conn = RemoteConnection::open(&self.connector, &self.connection).await?;
            let result = conn.run(&command, self.command_timeout).await;
            conn.close().await;
            result
        }
        .instrument(self.span.clone())
        .await
    }
}

fn local_scripts(scripts_dir: &Path) -> Result<Vec<(PathBuf, &'static str)>, StageError> {
    CONTROL_SCRIPTS
        .iter()
        .map(|name| {
            let path = scripts_dir.join(name);
            if path.is_file() {
                Ok((path, *name))
            } else {
                Err(StageError::input(path, "control script not found"))
            }
        })
        .collect()
}

fn stage_done(stage: &'static str, started: Instant) {
    info!(
        stage,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "stage complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCall, MockConfig, MockConnector};
    use crate::types::WorkflowConfig;

    struct NoConverter;

    impl SpreadsheetConverter for NoConverter {
        async fn convert(&self, input: &Path, _output: &Path) -> Result<(), StageError> {
            Err(StageError::input(input, "no converter in tests"))
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        csv: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let csv = dir.path().join("payroll.csv");
            std::fs::write(&csv, "id,amount\r\n1,100\r\n").unwrap();
            Self { dir, csv }
        }

        fn options(&self) -> RunOptions {
            RunOptions {
                outputs_dir: self.dir.path().join("outputs"),
                scripts_dir: self.dir.path().join("ibmi"),
                ..RunOptions::default()
            }
        }

        fn write_scripts(&self) {
            let dir = self.dir.path().join("ibmi");
            std::fs::create_dir_all(&dir).unwrap();
            for name in CONTROL_SCRIPTS {
                std::fs::write(dir.join(name), format!("-- {name}\n")).unwrap();
            }
        }
    }

    fn workflow(connector: MockConnector, dry_run: bool) -> Workflow<MockConnector, NoConverter> {
        let mut connection = ConnectionConfig::new("ibmi.test", "payroll");
        connection.dry_run = dry_run;
        let cfg = WorkflowConfig {
            ifs_dir: "/ifs/stage".into(),
            lib_stg: "PAYSTG".into(),
            outq: "QPRINT".into(),
            jobq: "QSYSNOMAX".into(),
        };
        Workflow::new(
            connector,
            NoConverter,
            connection,
            ValidatedWorkflow::new(&cfg).unwrap(),
        )
    }

    fn execs(connector: &MockConnector) -> usize {
        connector
            .state()
            .count(|c| matches!(c, MockCall::Exec { .. }))
    }

    fn closes(connector: &MockConnector) -> usize {
        connector.state().count(|c| matches!(c, MockCall::Close))
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_makes_zero_network_calls() {
        let fx = Fixture::new();
        fx.write_scripts();
        let connector = MockConnector::new(MockConfig::success());
        let wf = workflow(connector.clone(), true);

        let options = RunOptions {
            sync_scripts: true,
            fetch_outputs: true,
            ..fx.options()
        };
        let report = wf.run(&fx.csv, &options).await.unwrap();

        assert!(connector.state().calls().is_empty());
        assert!(report.dry_run);
        assert!(report.marker.is_none());
        assert_eq!(report.remote_csv, "/ifs/stage/in/payroll.csv");
        assert_eq!(report.scripts_synced, 4);
        assert_eq!(std::fs::read_to_string(&fx.csv).unwrap(), "id,amount\n1,100\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_path_uploads_once_and_runs_two_commands() {
        let fx = Fixture::new();
        let connector =
            MockConnector::new(MockConfig::success().with_marker_on(1, "ok.status", "OK"));
        let wf = workflow(connector.clone(), false);

        let report = wf.run(&fx.csv, &fx.options()).await.unwrap();

        {
            let state = connector.state();
            assert_eq!(state.uploads(), vec!["/ifs/stage/in/payroll.csv"]);
            let commands = state.commands();
            assert_eq!(commands.len(), 2);
            assert!(commands[0].contains("RUNSQLSTM"));
            assert!(commands[0].contains("/ifs/stage/scripts/setup.sql"));
            assert!(commands[1].contains("SBMJOB"));
            assert_eq!(
                state.remote_file("/ifs/stage/in/payroll.csv"),
                Some(b"id,amount\n1,100\n".to_vec())
            );
        }
        assert_eq!(closes(&connector), 1);
        assert_eq!(report.marker.as_deref(), Some("ok.status"));
        assert_eq!(report.marker_contents.as_deref(), Some("OK"));
        assert_eq!(report.run_id, wf.run_id());
        assert!(fx.dir.path().join("outputs/ok.status").is_file());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_dirs_created_in_plan_order() {
        let fx = Fixture::new();
        let connector =
            MockConnector::new(MockConfig::success().with_marker_on(1, "ok.status", "OK"));
        let wf = workflow(connector.clone(), false);

        wf.run(&fx.csv, &fx.options()).await.unwrap();

        assert_eq!(
            connector.state().made_dirs(),
            vec![
                "/ifs",
                "/ifs/stage",
                "/ifs/stage/in",
                "/ifs/stage/out",
                "/ifs/stage/run",
                "/ifs/stage/scripts",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_surfaces_marker_text() {
        let fx = Fixture::new();
        let connector = MockConnector::new(MockConfig::success().with_marker_on(
            3,
            "payroll.status",
            "FAILED: insufficient storage\n",
        ));
        let wf = workflow(connector.clone(), false);

        let err = wf.run(&fx.csv, &fx.options()).await.unwrap_err();

        assert!(matches!(err, StageError::RemoteJob(ref reason) if reason.contains("FAILED: insufficient storage")));
        assert_eq!(connector.state().uploads().len(), 1);
        assert_eq!(execs(&connector), 2);
        assert_eq!(connector.state().listings(), 3);
        assert_eq!(closes(&connector), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_marker_is_cleared_before_submit() {
        let fx = Fixture::new();
        let connector = MockConnector::new(
            MockConfig::success()
                .with_remote_file("/ifs/stage/run/process.status", "FAILED: previous run\n")
                .with_marker_on(3, "process.status", "OK"),
        );
        let wf = workflow(connector.clone(), false);

        let report = wf.run(&fx.csv, &fx.options()).await.unwrap();

        assert_eq!(report.marker_contents.as_deref(), Some("OK"));
        let calls = connector.state().calls();
        let removed = calls
            .iter()
            .position(|c| matches!(c, MockCall::Remove { path } if path == "/ifs/stage/run/process.status"))
            .expect("stale marker removed");
        let submitted = calls
            .iter()
            .position(|c| matches!(c, MockCall::Exec { command } if command.contains("SBMJOB")))
            .expect("job submitted");
        assert!(removed < submitted);
        assert_eq!(execs(&connector), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_closes_connection() {
        let fx = Fixture::new();
        let connector = MockConnector::new(MockConfig::success());
        let wf = workflow(connector.clone(), false);

        let options = RunOptions {
            timeout: Duration::from_secs(20),
            ..fx.options()
        };
        let err = wf.run(&fx.csv, &options).await.unwrap_err();

        assert!(matches!(err, StageError::Timeout { .. }));
        assert_eq!(closes(&connector), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_uploads_scripts_before_data() {
        let fx = Fixture::new();
        fx.write_scripts();
        let connector =
            MockConnector::new(MockConfig::success().with_marker_on(1, "ok.status", "OK"));
        let wf = workflow(connector.clone(), false);

        let options = RunOptions {
            sync_scripts: true,
            ..fx.options()
        };
        let report = wf.run(&fx.csv, &options).await.unwrap();

        assert_eq!(
            connector.state().uploads(),
            vec![
                "/ifs/stage/scripts/setup.sql",
                "/ifs/stage/scripts/apply.sql",
                "/ifs/stage/scripts/process.clp",
                "/ifs/stage/scripts/teardown.sql",
                "/ifs/stage/in/payroll.csv",
            ]
        );
        assert_eq!(report.scripts_synced, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_script_fails_before_connecting() {
        let fx = Fixture::new();
        let connector = MockConnector::new(MockConfig::success());
        let wf = workflow(connector.clone(), false);

        let options = RunOptions {
            sync_scripts: true,
            ..fx.options()
        };
        let err = wf.run(&fx.csv, &options).await.unwrap_err();

        assert!(matches!(err, StageError::Input { .. }));
        assert!(connector.state().calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_outputs_failure_is_not_fatal() {
        let fx = Fixture::new();
        let connector =
            MockConnector::new(MockConfig::success().with_marker_on(1, "ok.status", "OK"));
        let wf = workflow(connector.clone(), false);

        let options = RunOptions {
            fetch_outputs: true,
            ..fx.options()
        };
        let report = wf.run(&fx.csv, &options).await.unwrap();

        assert!(report.result_file.is_none());
        assert_eq!(
            connector
                .state()
                .count(|c| matches!(c, MockCall::Download { remote, .. } if remote == "/ifs/stage/out/payroll_result.csv")),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_outputs_downloads_result() {
        let fx = Fixture::new();
        let connector = MockConnector::new(
            MockConfig::success()
                .with_marker_on(1, "ok.status", "OK")
                .with_remote_file("/ifs/stage/out/payroll_result.csv", "id,status\n1,posted\n"),
        );
        let wf = workflow(connector.clone(), false);

        let options = RunOptions {
            fetch_outputs: true,
            ..fx.options()
        };
        let report = wf.run(&fx.csv, &options).await.unwrap();

        let result = report.result_file.unwrap();
        assert_eq!(result, fx.dir.path().join("outputs/payroll_result.csv"));
        assert_eq!(std::fs::read_to_string(result).unwrap(), "id,status\n1,posted\n");
    }

    #[tokio::test]
    async fn test_connection_failure_performs_no_transfers() {
        let fx = Fixture::new();
        let connector = MockConnector::new(MockConfig::connection_failure());
        let wf = workflow(connector.clone(), false);

        let err = wf.run(&fx.csv, &fx.options()).await.unwrap_err();

        assert!(matches!(err, StageError::Connection { .. }));
        assert!(connector.state().uploads().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_runs_one_command() {
        let connector = MockConnector::new(MockConfig::success());
        let wf = workflow(connector.clone(), false);

        let output = wf.teardown().await.unwrap();

        assert!(output.success());
        let commands = connector.state().commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].contains("teardown.sql"));
        assert!(commands[0].contains("PAYSTG"));
        assert_eq!(closes(&connector), 1);
    }

    #[tokio::test]
    async fn test_teardown_closes_once_when_command_fails() {
        let connector = MockConnector::new(MockConfig::success().with_exec_failure());
        let wf = workflow(connector.clone(), false);

        assert!(wf.teardown().await.is_err());
        assert_eq!(execs(&connector), 1);
        assert_eq!(closes(&connector), 1);
    }

    #[tokio::test]
    async fn test_teardown_dry_run_makes_no_calls() {
        let connector = MockConnector::new(MockConfig::success());
        let wf = workflow(connector.clone(), true);

        wf.teardown().await.unwrap();

        assert!(connector.state().calls().is_empty());
    }
}
