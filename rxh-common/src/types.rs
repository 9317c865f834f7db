//! Common types used across RXH components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::parse::evaluate_success;

/// Default SSH port for remote targets.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// OS family of a target, selecting which command template variant applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFlavor {
    /// Unix-like systems (Linux, macOS, AIX, ...).
    Unix,
    /// Microsoft Windows.
    Windows,
}

impl OsFlavor {
    /// Detect the flavor from a free-form OS descriptor such as
    /// `"Windows Server 2019"` or `"UNIX (Linux x86_64)"`.
    ///
    /// Matching is a case-insensitive substring test.
    pub fn detect(descriptor: &str) -> Option<Self> {
        let lower = descriptor.to_lowercase();
        if lower.contains("windows") {
            Some(Self::Windows)
        } else if lower.contains("unix") || lower.contains("linux") || lower.contains("darwin") {
            Some(Self::Unix)
        } else {
            None
        }
    }

    /// Flavor of the machine this process runs on.
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unix => "unix",
            Self::Windows => "windows",
        }
    }
}

impl std::fmt::Display for OsFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection details for a remote host.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHost {
    pub hostname: String,
    pub username: String,
    /// Password authentication (requires `sshpass` on the local machine).
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Private key used instead of, or in addition to, the password.
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl RemoteHost {
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
            password: None,
            identity_file: None,
            port: DEFAULT_SSH_PORT,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `user@host` destination string for the SSH client.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.hostname)
    }
}

// Hand-written so credentials never end up in logs.
impl std::fmt::Debug for RemoteHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteHost")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("identity_file", &self.identity_file)
            .field("port", &self.port)
            .finish()
    }
}

/// Where a command runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
    /// The machine running this process.
    #[default]
    Local,
    /// A host reached over SSH.
    Remote(RemoteHost),
}

impl Target {
    /// Short identifier for logs and error messages.
    pub fn label(&self) -> &str {
        match self {
            Self::Local => "local",
            Self::Remote(host) => &host.hostname,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What to do when the success evaluation of a call comes out false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Surface the failure as [`crate::HelperError::CommandExecution`].
    #[default]
    Raise,
    /// Hand the failed result back to the caller instead of raising.
    Sentinel,
}

/// One invocation: a fully built command plus where and how to run it.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub command: String,
    pub target: Target,
    pub timeout: Option<Duration>,
    pub policy: FailurePolicy,
}

impl ExecutionRequest {
    pub fn new(command: impl Into<String>, target: Target) -> Self {
        Self {
            command: command.into(),
            target,
            timeout: None,
            policy: FailurePolicy::Raise,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Outcome of running a command on a machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    /// Raw standard output.
    pub output: String,
    /// Raw error text (standard error, or a timeout note). `None` when empty.
    pub exception: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    #[serde(default)]
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Build a result that finished just now with no timing information.
    pub fn new(exit_code: i32, output: impl Into<String>, exception: Option<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
            exception: exception.filter(|text| !text.trim().is_empty()),
            started_at: Utc::now(),
            duration: Duration::ZERO,
            timed_out: false,
        }
    }

    /// Output split into trimmed, non-empty lines.
    pub fn formatted_output(&self) -> Vec<String> {
        self.output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// First non-empty line of the exception text.
    pub fn exception_message(&self) -> Option<&str> {
        self.exception
            .as_deref()
            .and_then(|text| text.lines().map(str::trim).find(|line| !line.is_empty()))
    }

    pub fn has_exception(&self) -> bool {
        self.exception.is_some()
    }

    /// Exit code zero, non-empty output, and no exception text.
    pub fn is_success(&self) -> bool {
        evaluate_success(self.exit_code, &self.output, self.has_exception())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// A single value extracted from command output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
    Null,
}

impl FieldValue {
    /// Classify raw matched text: `null` and booleans are recognised, anything
    /// else is kept verbatim.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "null" => Self::Null,
            "true" => Self::Flag(true),
            "false" => Self::Flag(false),
            other => Self::Text(other.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Structured data extracted from command output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsedRecord {
    Map(BTreeMap<String, FieldValue>),
    Rows(Vec<(String, String)>),
}

impl ParsedRecord {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Map(map) => map.is_empty(),
            Self::Rows(rows) => rows.is_empty(),
        }
    }
}
