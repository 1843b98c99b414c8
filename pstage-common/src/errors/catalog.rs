//! Error catalog for pstage.
//!
//! Each [`ErrorCode`] has a stable `PST-Exxx` code, a message and the steps
//! an operator should take. The CLI prints the code next to every failure so
//! support requests can be matched to an entry here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering every failure the workflow can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E099)
    // =========================================================================
    /// Configuration could not be loaded
    ConfigLoadError,
    /// A value failed the allow-list grammar
    ConfigValidationError,

    // =========================================================================
    // Network Errors (E100-E199)
    // =========================================================================
    /// SSH connection or authentication failed
    SshConnectionFailed,
    /// A remote command exceeded its timeout
    SshTimeout,

    // =========================================================================
    // Transfer Errors (E200-E299)
    // =========================================================================
    /// Upload, download or remote filesystem operation failed
    TransferFailed,

    // =========================================================================
    // Job Errors (E300-E399)
    // =========================================================================
    /// Remote job wrote a FAILED status marker
    JobFailed,
    /// No status marker appeared before the deadline
    JobCompletionTimeout,

    // =========================================================================
    // Input Errors (E400-E499)
    // =========================================================================
    /// Local input file could not be prepared
    InputPreparationFailed,
}

impl ErrorCode {
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            Self::ConfigLoadError => 1,
            Self::ConfigValidationError => 2,
            Self::SshConnectionFailed => 100,
            Self::SshTimeout => 101,
            Self::TransferFailed => 200,
            Self::JobFailed => 300,
            Self::JobCompletionTimeout => 301,
            Self::InputPreparationFailed => 400,
        }
    }

    /// Returns the formatted error code string (e.g., "PST-E001").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("PST-E{:03}", self.code_number())
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Network,
            200..=299 => ErrorCategory::Transfer,
            300..=399 => ErrorCategory::Job,
            _ => ErrorCategory::Input,
        }
    }

    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigLoadError => "Configuration could not be loaded",
            Self::ConfigValidationError => "A configuration value contains disallowed characters",
            Self::SshConnectionFailed => "Could not open an SSH session to the IBM i host",
            Self::SshTimeout => "A remote command did not finish in time",
            Self::TransferFailed => "Remote file operation failed",
            Self::JobFailed => "The remote batch job reported failure",
            Self::JobCompletionTimeout => "No status marker appeared before the deadline",
            Self::InputPreparationFailed => "Input file could not be prepared for upload",
        }
    }

    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigLoadError => &[
                "Check that IBMI_HOST, IBMI_USER, LIB_STG and IFS_STAGING_DIR are set",
                "Verify the .env file and --config path are readable",
            ],
            Self::ConfigValidationError => &[
                "Identifiers may only contain letters, digits, '_', '.', '/' and '-'",
                "Rename the input file if its name contains spaces or shell characters",
            ],
            Self::SshConnectionFailed => &[
                "Verify the host is reachable: ssh <user>@<host> true",
                "Add the host key to known_hosts or set ALLOW_AUTO_HOSTKEY=true",
                "Configure IBMI_SSH_KEY or load the key into ssh-agent",
            ],
            Self::SshTimeout => &[
                "Check the remote system load and retry",
                "Inspect the job log on the IBM i host",
            ],
            Self::TransferFailed => &[
                "Check permissions on the IFS staging directory",
                "Verify free space on the IFS",
            ],
            Self::JobFailed => &[
                "Read the downloaded status marker in the outputs directory",
                "Inspect the spooled output on the configured output queue",
            ],
            Self::JobCompletionTimeout => &[
                "The job may still be running; check the job queue with WRKJOBQ",
                "Increase --timeout-seconds for large files",
            ],
            Self::InputPreparationFailed => &[
                "Verify the input path exists and is UTF-8 CSV or a spreadsheet",
                "Set PSTAGE_CONVERTER if ssconvert is not installed",
            ],
        }
    }

    /// Returns all defined error codes.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::ConfigLoadError,
            Self::ConfigValidationError,
            Self::SshConnectionFailed,
            Self::SshTimeout,
            Self::TransferFailed,
            Self::JobFailed,
            Self::JobCompletionTimeout,
            Self::InputPreparationFailed,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Configuration and validation errors (E001-E099)
    Config,
    /// SSH connectivity errors (E100-E199)
    Network,
    /// Remote file operation errors (E200-E299)
    Transfer,
    /// Remote job outcome errors (E300-E399)
    Job,
    /// Local input errors (E400-E499)
    Input,
}

impl ErrorCategory {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "Configuration",
            Self::Network => "Network",
            Self::Transfer => "Transfer",
            Self::Job => "Job",
            Self::Input => "Input",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Formats the error for display with full remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n", self.code, self.message);

        if !self.remediation.is_empty() {
            output.push_str("\nRemediation steps:\n");
            for (i, step) in self.remediation.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        output
    }

    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}
