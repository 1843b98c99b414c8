//! Shared library for pstage.
//!
//! Stages a payroll CSV on a remote IBM i host over SSH, runs the setup and
//! batch-submission commands, and waits for the remote job's status marker.

pub mod config;
pub mod convert;
pub mod errors;
pub mod logging;
pub mod mock;
pub mod plan;
pub mod poll;
pub mod prepare;
pub mod sanitize;
pub mod ssh;
pub mod types;
pub mod util;
pub mod workflow;

pub use config::{LoadOptions, StageConfig, load_config};
pub use convert::{ExternalConverter, SpreadsheetConverter};
pub use errors::{ErrorCategory, ErrorCode, ErrorEntry, StageError, TimeoutKind};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use plan::StagingPlan;
pub use poll::{CompletionPoller, MarkerStatus, classify};
pub use sanitize::{ValidatedWorkflow, validate_argument, validate_identifier};
pub use ssh::{
    CommandOutput, Connector, KnownHostsPolicy, RemoteConnection, RemoteTransport,
};
#[cfg(unix)]
pub use ssh::{SshConnector, SshTransport};
pub use types::{ConnectionConfig, RunOptions, RunReport, WorkflowConfig};
pub use workflow::Workflow;
