//! Shared utilities for pstage.

use sha2::{Digest, Sha256};

fn find_value_end(s: &str) -> usize {
    let mut end = 0;
    let mut in_quote = None;
    let mut escaped = false;

    for c in s.chars() {
        let char_len = c.len_utf8();

        if escaped {
            escaped = false;
            end += char_len;
            continue;
        }

        if c == '\\' {
            escaped = true;
            end += char_len;
            continue;
        }

        if let Some(q) = in_quote {
            if c == q {
                in_quote = None;
            }
            end += char_len;
            continue;
        }

        if c == '"' || c == '\'' {
            in_quote = Some(c);
            end += char_len;
            continue;
        }

        if c.is_whitespace() || c == ')' {
            break;
        }

        end += char_len;
    }
    end
}

/// Mask credentials in a command string before logging.
///
/// Covers environment assignments, long options and the `PASSWORD(...)`
/// style parameters CL commands accept.
pub fn mask_sensitive_command(cmd: &str) -> String {
    let patterns = [
        ("IBMI_PASSWORD=", "IBMI_PASSWORD=***"),
        ("PASSWORD=", "PASSWORD=***"),
        ("PASSWD=", "PASSWD=***"),
        ("PWD=", "PWD=***"),
        ("TOKEN=", "TOKEN=***"),
        ("PASSWORD(", "PASSWORD(***"),
        ("PWD(", "PWD(***"),
        ("--password ", "--password ***"),
        ("--password=", "--password=***"),
    ];

    let mut result = cmd.to_string();
    for (pattern, replacement) in patterns {
        // The replacement contains the pattern, so resume after it.
        let mut search_start = 0;
        while search_start < result.len() {
            let Some(start) = result[search_start..].find(pattern) else {
                break;
            };
            let abs_start = search_start + start;
            let value_start = abs_start + pattern.len();
            if result[value_start..].starts_with("***") {
                search_start = value_start + 3;
                continue;
            }
            let value_end = value_start + find_value_end(&result[value_start..]);

            result = format!(
                "{}{}{}",
                &result[..abs_start],
                replacement,
                &result[value_end..]
            );
            search_start = abs_start + replacement.len();
        }
    }

    result
}

/// Hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Convert `\r\n` and lone `\r` to `\n`.
pub fn normalize_line_endings(text: &str) -> std::borrow::Cow<'_, str> {
    if text.contains('\r') {
        std::borrow::Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        std::borrow::Cow::Borrowed(text)
    }
}
