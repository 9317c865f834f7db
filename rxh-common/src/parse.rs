//! Response parsing: turn raw command output into structured records.
//!
//! Parsers only keep what an explicit pattern matched. Text that matches
//! nothing is dropped; text that must have a shape (table rows, JSON) and
//! does not is reported as [`HelperError::MalformedOutput`].

use regex::Regex;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::errors::{HelperError, Result};
use crate::types::{FieldValue, ParsedRecord};

/// `Key:"value"` or `Key:null` pairs, as printed by Go tools such as
/// `helm version` (`version.BuildInfo{Version:"v3.12.0", GitCommit:"..."}`).
pub static KEY_VALUE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+):(?:"([^"]*)"|(null))"#).expect("key/value pattern is valid")
});

/// Success requires a zero exit code, some output, and no captured exception.
pub fn evaluate_success(exit_code: i32, output: &str, has_exception: bool) -> bool {
    exit_code == 0 && !output.trim().is_empty() && !has_exception
}

/// Extract `(key, value)` pairs with `pattern`.
///
/// Group 1 is the key; the value is the first later group that took part in
/// the match. Values `null`, `true` and `false` are classified, everything
/// else is kept as text. A repeated key keeps its last value.
pub fn parse_keyvalue(output: &str, pattern: &Regex) -> Result<BTreeMap<String, FieldValue>> {
    if pattern.captures_len() < 3 {
        return Err(HelperError::malformed(
            pattern.as_str(),
            "pattern must capture a key and a value",
        ));
    }

    let mut fields = BTreeMap::new();
    for caps in pattern.captures_iter(output) {
        let Some(key) = caps.get(1) else {
            continue;
        };
        let Some(value) = (2..caps.len()).find_map(|i| caps.get(i)) else {
            continue;
        };
        fields.insert(key.as_str().to_string(), FieldValue::from_raw(value.as_str()));
    }
    Ok(fields)
}

/// Parse `Key <separator> Value` lines, e.g. `Node Name : nodeA`.
///
/// Lines without the separator or with an empty key are ignored. Keys and
/// values are trimmed; an empty value is recorded as [`FieldValue::Null`].
pub fn parse_key_value_lines(output: &str, separator: char) -> BTreeMap<String, FieldValue> {
    output
        .lines()
        .filter_map(|line| line.split_once(separator))
        .filter_map(|(key, value)| {
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = if value.is_empty() {
                FieldValue::Null
            } else {
                FieldValue::from_raw(value)
            };
            Some((key.to_string(), value))
        })
        .collect()
}

/// Parse a whitespace-separated listing into `(first, second)` column pairs.
///
/// Blank lines are ignored. With `skip_header`, the first non-blank line is
/// treated as the header. Every remaining line must have at least two
/// tokens.
pub fn parse_tabular(output: &str, skip_header: bool) -> Result<Vec<(String, String)>> {
    let mut lines = output.lines().filter(|line| !line.trim().is_empty());
    if skip_header {
        lines.next();
    }

    lines
        .map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(first), Some(second)) => Ok((first.to_string(), second.to_string())),
                _ => Err(HelperError::malformed(
                    line.trim(),
                    "expected at least two columns",
                )),
            }
        })
        .collect()
}

/// Deserialize JSON output (for tools invoked with `--output json`).
pub fn parse_json<T: DeserializeOwned>(output: &str) -> Result<T> {
    serde_json::from_str(output.trim()).map_err(|err| {
        let first_line = output.lines().next().unwrap_or_default();
        HelperError::malformed(first_line, format!("invalid JSON: {err}"))
    })
}

/// Rule that turns command output into a [`ParsedRecord`].
#[derive(Debug, Clone)]
pub enum RecordParser {
    /// [`parse_keyvalue`] with the given pattern.
    KeyValue(Regex),
    /// [`parse_key_value_lines`] with the given separator.
    KeyValueLines(char),
    /// [`parse_tabular`].
    Tabular { skip_header: bool },
}

impl RecordParser {
    /// Key/value rule from pattern source.
    ///
    /// Fails with [`HelperError::InvalidPattern`] if `pattern` does not compile.
    pub fn key_value(pattern: &str) -> Result<Self> {
        Ok(Self::KeyValue(Regex::new(pattern)?))
    }

    pub fn parse(&self, output: &str) -> Result<ParsedRecord> {
        match self {
            Self::KeyValue(pattern) => parse_keyvalue(output, pattern).map(ParsedRecord::Map),
            Self::KeyValueLines(separator) => {
                Ok(ParsedRecord::Map(parse_key_value_lines(output, *separator)))
            }
            Self::Tabular { skip_header } => {
                parse_tabular(output, *skip_header).map(ParsedRecord::Rows)
            }
        }
    }
}
