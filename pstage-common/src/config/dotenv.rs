//! `.env` file parsing.
//!
//! Values are returned as a map and layered by [`super::EnvParser`]; the
//! process environment is never modified.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DotenvError {
    #[error("{path}:{line}: {message}")]
    Syntax {
        path: String,
        line: usize,
        message: String,
    },

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read `path`. A missing file yields `Ok(None)`.
pub fn load_file(path: &Path) -> Result<Option<HashMap<String, String>>, DotenvError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(DotenvError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };
    parse(&content, &path.display().to_string()).map(Some)
}

/// Parse `KEY=VALUE` lines.
///
/// Supports `#` comments, an optional `export ` prefix, single quotes
/// (literal) and double quotes (with `\n`, `\"` and `\\` escapes). Unquoted
/// values end at ` #`.
pub fn parse(content: &str, origin: &str) -> Result<HashMap<String, String>, DotenvError> {
    let mut vars = HashMap::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let syntax = |message: &str| DotenvError::Syntax {
            path: origin.to_string(),
            line: idx + 1,
            message: message.to_string(),
        };

        let (key, value) = line.split_once('=').ok_or_else(|| syntax("expected KEY=VALUE"))?;
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(syntax("invalid variable name"));
        }
        let value = parse_value(value.trim()).ok_or_else(|| syntax("unterminated quote"))?;
        vars.insert(key.to_string(), value);
    }
    Ok(vars)
}

fn parse_value(value: &str) -> Option<String> {
    if let Some(rest) = value.strip_prefix('\'') {
        let end = rest.find('\'')?;
        return Some(rest[..end].to_string());
    }
    if let Some(rest) = value.strip_prefix('"') {
        let mut out = String::new();
        let mut chars = rest.chars();
        while let Some(c) = chars.next() {
            match c {
                '"' => return Some(out),
                '\\' => match chars.next()? {
                    'n' => out.push('\n'),
                    other => out.push(other),
                },
                c => out.push(c),
            }
        }
        return None;
    }
    let value = match value.find(" #") {
        Some(pos) => &value[..pos],
        None => value,
    };
    Some(value.trim_end().to_string())
}
