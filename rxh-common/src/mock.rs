//! Scripted machine for tests.
//!
//! `MockMachine` never spawns a process. Each command is matched against the
//! registered rules (first rule whose needle is a substring of the command
//! wins) and the rule's canned response is returned. Every executed command
//! is recorded so tests can assert on exactly what a helper sent.

use std::sync::Mutex;
use std::time::Duration;

use crate::errors::{HelperError, Result};
use crate::machine::Machine;
use crate::types::{ExecutionResult, OsFlavor};

/// Canned reply for a matched command.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Command ran; report this result.
    Completed {
        exit_code: i32,
        output: String,
        exception: Option<String>,
    },
    /// Transport failure before the command could run.
    ConnectionFailure(String),
}

impl MockResponse {
    /// Exit code 0 with the given output.
    pub fn ok(output: impl Into<String>) -> Self {
        Self::Completed {
            exit_code: 0,
            output: output.into(),
            exception: None,
        }
    }

    /// Nonzero exit with an exception message and no output.
    pub fn failure(exit_code: i32, exception: impl Into<String>) -> Self {
        Self::Completed {
            exit_code,
            output: String::new(),
            exception: Some(exception.into()),
        }
    }

    pub fn completed(exit_code: i32, output: impl Into<String>, exception: Option<&str>) -> Self {
        Self::Completed {
            exit_code,
            output: output.into(),
            exception: exception.map(str::to_string),
        }
    }

    pub fn connection_failure(message: impl Into<String>) -> Self {
        Self::ConnectionFailure(message.into())
    }
}

#[derive(Debug)]
pub struct MockMachine {
    flavor: OsFlavor,
    name: String,
    rules: Vec<(String, MockResponse)>,
    default: MockResponse,
    history: Mutex<Vec<String>>,
}

impl MockMachine {
    /// A mock whose unmatched commands succeed with output `ok`.
    pub fn new(flavor: OsFlavor) -> Self {
        Self {
            flavor,
            name: "mock".to_string(),
            rules: Vec::new(),
            default: MockResponse::ok("ok"),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reply with `response` to commands containing `needle`.
    pub fn respond(mut self, needle: impl Into<String>, response: MockResponse) -> Self {
        self.rules.push((needle.into(), response));
        self
    }

    /// Reply for commands no rule matches.
    pub fn with_default(mut self, response: MockResponse) -> Self {
        self.default = response;
        self
    }

    /// Commands executed so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }

    /// The most recent command, if any.
    pub fn last_command(&self) -> Option<String> {
        self.commands().pop()
    }

    fn lookup(&self, command: &str) -> &MockResponse {
        self.rules
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, response)| response)
            .unwrap_or(&self.default)
    }
}

impl Machine for MockMachine {
    fn execute_command(&self, command: &str, _timeout: Option<Duration>) -> Result<ExecutionResult> {
        if command.trim().is_empty() {
            return Err(HelperError::EmptyCommand);
        }
        if let Ok(mut history) = self.history.lock() {
            history.push(command.to_string());
        }

        match self.lookup(command) {
            MockResponse::Completed {
                exit_code,
                output,
                exception,
            } => Ok(ExecutionResult::new(
                *exit_code,
                output.clone(),
                exception.clone(),
            )),
            MockResponse::ConnectionFailure(message) => Err(HelperError::Connection {
                host: self.name.clone(),
                message: message.clone(),
            }),
        }
    }

    fn os_flavor(&self) -> OsFlavor {
        self.flavor
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
