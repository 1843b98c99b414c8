//! Spreadsheet to CSV conversion.
//!
//! Parsing workbooks is delegated to an external program; pstage only needs
//! a CSV file at the end of it.

use crate::errors::StageError;
use std::path::Path;
use tracing::{debug, info};

/// Extensions handed to the converter instead of being uploaded as-is.
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls", "ods"];

const DEFAULT_CONVERTER: &str = "ssconvert {input} {output}";

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Converts the first sheet of a workbook to CSV.
#[allow(async_fn_in_trait)]
pub trait SpreadsheetConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), StageError>;
}

/// Runs an external command such as `ssconvert {input} {output}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalConverter {
    program: String,
    args: Vec<String>,
}

impl Default for ExternalConverter {
    fn default() -> Self {
        Self::parse(DEFAULT_CONVERTER).expect("default converter template is non-empty")
    }
}

impl ExternalConverter {
    /// Parse a whitespace-separated template. `{input}` and `{output}` are
    /// substituted per argument.
    pub fn parse(template: &str) -> Option<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Template from `PSTAGE_CONVERTER`, falling back to `ssconvert`.
    pub fn from_env() -> Self {
        std::env::var("PSTAGE_CONVERTER")
            .ok()
            .and_then(|t| Self::parse(&t))
            .unwrap_or_default()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn render_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.display().to_string();
        let output = output.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }
}

impl SpreadsheetConverter for ExternalConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), StageError> {
        let args = self.render_args(input, output);
        info!(program = %self.program, input = %input.display(), output = %output.display(), "converting spreadsheet");
        debug!(?args, "converter arguments");

        let result = tokio::process::Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| StageError::input(input, format!("cannot run {}: {}", self.program, e)))?;

        if !result.status.success() {
            return Err(StageError::input(
                input,
                format!(
                    "{} exited with {}: {}",
                    self.program,
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            ));
        }
        if !output.exists() {
            return Err(StageError::input(
                input,
                format!("{} did not produce {}", self.program, output.display()),
            ));
        }
        Ok(())
    }
}
