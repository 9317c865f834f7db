//! Shared utilities for RXH.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

use crate::types::OsFlavor;

// Flag (`--password value`, `--token=value`) or assignment key naming a
// secret (`PASSWORD=x`, `auth.rootPassword=x`).
const SECRET_KEY: &str = r"(?:--(?:password|token|secret|api-key)(?:=|\s+)|[\w.-]*(?:password|passwd|secret|token|api_key|apikey)[\w.-]*=)";

// Quoted bodies as `quote_arg` writes them: `'\''` and `'\!'` inside single
// quotes, backslash escapes inside double quotes.
const SINGLE_QUOTED_REST: &str = r"(?:[^']|'\\.')*'";
const DOUBLE_QUOTED_REST: &str = r#"(?:[^"\\]|\\.)*""#;

// A whole quoted argument starting with a secret key, or a bare key followed
// by its (possibly quoted) value.
static SENSITIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)'(?P<single>{SECRET_KEY}){SINGLE_QUOTED_REST}|"(?P<double>{SECRET_KEY}){DOUBLE_QUOTED_REST}|(?P<key>{SECRET_KEY})(?:'{SINGLE_QUOTED_REST}|"{DOUBLE_QUOTED_REST}|\S+)"#
    ))
    .expect("sensitive pattern is valid")
});

/// Mask sensitive values in a command string before logging.
///
/// Keeps the flag or key and replaces its value with `***`, so a masked
/// command still shows which options were passed. A quoted argument keeps
/// its quotes.
pub fn mask_sensitive_command(cmd: &str) -> String {
    SENSITIVE_RE
        .replace_all(cmd, |caps: &Captures<'_>| {
            if let Some(key) = caps.name("single") {
                format!("'{}***'", key.as_str())
            } else if let Some(key) = caps.name("double") {
                format!("\"{}***\"", key.as_str())
            } else {
                format!("{}***", &caps["key"])
            }
        })
        .into_owned()
}

/// Quote one argument for the shell of the given flavor.
///
/// Safe arguments are returned unchanged.
pub fn quote_arg(flavor: OsFlavor, value: &str) -> String {
    let value = Cow::Borrowed(value);
    match flavor {
        OsFlavor::Unix => shell_escape::unix::escape(value).into_owned(),
        OsFlavor::Windows => shell_escape::windows::escape(value).into_owned(),
    }
}
