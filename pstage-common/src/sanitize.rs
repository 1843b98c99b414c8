//! Allow-list validation for values that reach a remote shell or remote path.
//!
//! Remote commands are assembled by string interpolation, so every
//! configuration field and every derived path is checked here first. Values
//! are rejected, never escaped.

use crate::errors::StageError;
use crate::types::WorkflowConfig;
use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_./-]+$").expect("identifier grammar is a valid regex")
});

/// Characters that end or chain a shell command.
const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '\r', '\n'];

/// Validate a directory fragment or object name against `^[A-Za-z0-9_./-]+$`.
pub fn validate_identifier<'a>(value: &'a str, field: &str) -> Result<&'a str, StageError> {
    if IDENTIFIER.is_match(value) {
        return Ok(value);
    }
    let reason = match value.chars().find(|c| !is_identifier_char(*c)) {
        Some(c) => format!("character {:?} is not allowed", c),
        None => "value is empty".to_string(),
    };
    Err(StageError::validation(field, reason))
}

/// Validate a free-form command argument: rejects `;`, `&`, `|` and line breaks.
pub fn validate_argument<'a>(value: &'a str, field: &str) -> Result<&'a str, StageError> {
    if value.is_empty() {
        return Err(StageError::validation(field, "value is empty"));
    }
    if let Some(c) = value.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(StageError::validation(
            field,
            format!("shell metacharacter {:?} is not allowed", c),
        ));
    }
    Ok(value)
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-')
}

/// Workflow identifiers that have all passed [`validate_identifier`].
///
/// The only constructor is [`ValidatedWorkflow::new`], so holding one proves
/// every field was checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedWorkflow {
    ifs_dir: String,
    lib_stg: String,
    outq: String,
    jobq: String,
}

impl ValidatedWorkflow {
    pub fn new(config: &WorkflowConfig) -> Result<Self, StageError> {
        let ifs_dir = validate_identifier(&config.ifs_dir, "ifs_dir")?;
        let lib_stg = validate_identifier(&config.lib_stg, "lib_stg")?;
        let outq = validate_identifier(&config.outq, "outq")?;
        let jobq = validate_identifier(&config.jobq, "jobq")?;

        let trimmed = ifs_dir.trim_end_matches('/');
        let ifs_dir = if trimmed.is_empty() { "/" } else { trimmed };

        Ok(Self {
            ifs_dir: ifs_dir.to_string(),
            lib_stg: lib_stg.to_string(),
            outq: outq.to_string(),
            jobq: jobq.to_string(),
        })
    }

    pub fn ifs_dir(&self) -> &str {
        &self.ifs_dir
    }

    pub fn lib_stg(&self) -> &str {
        &self.lib_stg
    }

    pub fn outq(&self) -> &str {
        &self.outq
    }

    pub fn jobq(&self) -> &str {
        &self.jobq
    }
}
