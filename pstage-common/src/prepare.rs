//! Local input preparation: conversion, line-ending normalization, digest.

use crate::convert::{SpreadsheetConverter, is_spreadsheet};
use crate::errors::StageError;
use crate::sanitize::validate_identifier;
use crate::util::{normalize_line_endings, sha256_hex};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A CSV ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInput {
    pub csv_path: PathBuf,
    /// Validated file name used for the remote path.
    pub file_name: String,
    pub stem: String,
    pub sha256: String,
    pub bytes: u64,
}

/// Produce a UTF-8, LF-terminated CSV from `input` and fingerprint it.
///
/// Spreadsheets are converted to a sibling `.csv`. The CSV is rewritten in
/// place only when its line endings change.
pub async fn prepare_input<C: SpreadsheetConverter>(
    input: &Path,
    converter: &C,
) -> Result<PreparedInput, StageError> {
    if !input.is_file() {
        return Err(StageError::input(input, "file not found"));
    }

    let csv_path = if is_spreadsheet(input) {
        let csv_path = input.with_extension("csv");
        converter.convert(input, &csv_path).await?;
        csv_path
    } else {
        input.to_path_buf()
    };

    let file_name = csv_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StageError::input(&csv_path, "file name is not valid UTF-8"))?;
    let file_name = validate_identifier(file_name, "csv file name")?.to_string();
    let stem = csv_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&file_name)
        .to_string();

    let raw = tokio::fs::read(&csv_path)
        .await
        .map_err(|e| StageError::input(&csv_path, e))?;
    let text = String::from_utf8(raw).map_err(|_| StageError::input(&csv_path, "CSV is not valid UTF-8"))?;

    let normalized = normalize_line_endings(&text);
    if let Cow::Owned(ref rewritten) = normalized {
        debug!(path = %csv_path.display(), "normalizing line endings");
        tokio::fs::write(&csv_path, rewritten.as_bytes())
            .await
            .map_err(|e| StageError::input(&csv_path, e))?;
    }

    let sha256 = sha256_hex(normalized.as_bytes());
    info!(path = %csv_path.display(), sha256 = %sha256, "Local SHA256");

    Ok(PreparedInput {
        bytes: normalized.len() as u64,
        csv_path,
        file_name,
        stem,
        sha256,
    })
}
