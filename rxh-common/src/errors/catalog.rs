//! Error Catalog for Remote Execution Helper
//!
//! Each error carries a stable code in the `RXH-Exxx` format, a category,
//! and remediation steps that test reports can print next to the failure.
//!
//! # Error Code Ranges
//!
//! | Range      | Category  | Description                              |
//! |------------|-----------|------------------------------------------|
//! | E001-E009  | Config    | Configuration file and environment       |
//! | E010-E099  | Build     | Command template construction            |
//! | E100-E199  | Transport | Reaching the target and spawning         |
//! | E200-E299  | Execution | Command ran but did not succeed          |
//! | E300-E399  | Parse     | Output did not have the expected shape   |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering all RXH error scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E009)
    // =========================================================================
    /// Configuration file or environment override is invalid
    ConfigInvalid,

    // =========================================================================
    // Build Errors (E010-E099)
    // =========================================================================
    /// A template placeholder had no value
    MissingParameter,
    /// No template registered for the operation and OS flavor
    UnknownOperation,
    /// OS descriptor did not name a known flavor
    UnknownOs,
    /// The command text was empty
    EmptyCommand,

    // =========================================================================
    // Transport Errors (E100-E199)
    // =========================================================================
    /// Target unreachable or credentials rejected
    ConnectionFailed,
    /// Local process could not be spawned or read
    ProcessIo,

    // =========================================================================
    // Execution Errors (E200-E299)
    // =========================================================================
    /// Command completed but the success evaluation failed
    CommandFailed,
    /// Release listings disagree
    ReleaseMismatch,

    // =========================================================================
    // Parse Errors (E300-E399)
    // =========================================================================
    /// Output text did not match the expected structure
    MalformedOutput,
    /// A parse pattern failed to compile
    InvalidPattern,
}

/// Broad grouping of error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Config,
    Build,
    Transport,
    Execution,
    Parse,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Build => "build",
            Self::Transport => "transport",
            Self::Execution => "execution",
            Self::Parse => "parse",
        };
        f.write_str(name)
    }
}

/// Static description of one catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct ErrorEntry {
    pub code: &'static str,
    pub category: ErrorCategory,
    pub message: &'static str,
    pub remediation: &'static [&'static str],
}

impl ErrorCode {
    /// Look up the catalog entry for this code.
    pub fn entry(&self) -> ErrorEntry {
        match self {
            Self::ConfigInvalid => ErrorEntry {
                code: "RXH-E001",
                category: ErrorCategory::Config,
                message: "Configuration is invalid",
                remediation: &[
                    "Check the TOML syntax of the config file",
                    "Check RXH_* environment variables for typos and value ranges",
                ],
            },
            Self::MissingParameter => ErrorEntry {
                code: "RXH-E010",
                category: ErrorCategory::Build,
                message: "Command template placeholder has no value",
                remediation: &["Pass a value for every {placeholder} in the template"],
            },
            Self::UnknownOperation => ErrorEntry {
                code: "RXH-E011",
                category: ErrorCategory::Build,
                message: "No command template for operation",
                remediation: &[
                    "Register the operation for the target's OS flavor",
                    "Verify the operation name is spelled correctly",
                ],
            },
            Self::UnknownOs => ErrorEntry {
                code: "RXH-E012",
                category: ErrorCategory::Build,
                message: "Unrecognised OS descriptor",
                remediation: &["Set target.os to a value containing 'windows' or 'unix'"],
            },
            Self::EmptyCommand => ErrorEntry {
                code: "RXH-E013",
                category: ErrorCategory::Build,
                message: "Command text is empty",
                remediation: &["Build the command from a template before executing it"],
            },
            Self::ConnectionFailed => ErrorEntry {
                code: "RXH-E100",
                category: ErrorCategory::Transport,
                message: "Could not reach the target",
                remediation: &[
                    "Verify the hostname resolves and the SSH port is open",
                    "Verify the username and password or identity file",
                    "Install sshpass when using password authentication",
                ],
            },
            Self::ProcessIo => ErrorEntry {
                code: "RXH-E101",
                category: ErrorCategory::Transport,
                message: "Local process I/O failed",
                remediation: &["Check that the shell or client binary exists and is executable"],
            },
            Self::CommandFailed => ErrorEntry {
                code: "RXH-E200",
                category: ErrorCategory::Execution,
                message: "Command did not succeed",
                remediation: &[
                    "Inspect the captured output and exception text",
                    "Re-run with debug enabled for verbose tool output",
                ],
            },
            Self::ReleaseMismatch => ErrorEntry {
                code: "RXH-E201",
                category: ErrorCategory::Execution,
                message: "Release listings do not agree",
                remediation: &["Compare per-namespace and cluster-wide listings"],
            },
            Self::MalformedOutput => ErrorEntry {
                code: "RXH-E300",
                category: ErrorCategory::Parse,
                message: "Output did not have the expected shape",
                remediation: &["Check the tool version; its output format may have changed"],
            },
            Self::InvalidPattern => ErrorEntry {
                code: "RXH-E301",
                category: ErrorCategory::Parse,
                message: "Parse pattern is invalid",
                remediation: &["Fix the regular expression syntax"],
            },
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.entry().code
    }

    pub fn category(&self) -> ErrorCategory {
        self.entry().category
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: &[ErrorCode] = &[
        ErrorCode::ConfigInvalid,
        ErrorCode::MissingParameter,
        ErrorCode::UnknownOperation,
        ErrorCode::UnknownOs,
        ErrorCode::EmptyCommand,
        ErrorCode::ConnectionFailed,
        ErrorCode::ProcessIo,
        ErrorCode::CommandFailed,
        ErrorCode::ReleaseMismatch,
        ErrorCode::MalformedOutput,
        ErrorCode::InvalidPattern,
    ];

    #[test]
    fn test_codes_are_unique_and_well_formed() {
        let re = regex::Regex::new(r"^RXH-E\d{3}$").unwrap();
        let mut seen = HashSet::new();
        for code in ALL {
            let s = code.code_str();
            assert!(re.is_match(s), "bad code format: {s}");
            assert!(seen.insert(s), "duplicate code: {s}");
        }
    }

    #[test]
    fn test_every_entry_has_remediation() {
        for code in ALL {
            assert!(!code.entry().remediation.is_empty(), "{code:?}");
        }
    }

    #[test]
    fn test_code_ranges_match_category() {
        for code in ALL {
            let number: u32 = code.code_str()[5..].parse().unwrap();
            let expected = match number {
                1..=9 => ErrorCategory::Config,
                10..=99 => ErrorCategory::Build,
                100..=199 => ErrorCategory::Transport,
                200..=299 => ErrorCategory::Execution,
                _ => ErrorCategory::Parse,
            };
            assert_eq!(code.category(), expected, "{code:?}");
        }
    }
}
