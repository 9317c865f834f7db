//! The generic build → execute → evaluate flow shared by every helper.

use std::time::Duration;
use tracing::{debug, warn};

use rxh_common::{
    ExecutionRequest, ExecutionResult, FailurePolicy, HelperError, Machine, OsFlavor, Parameters,
    ParsedRecord, RecordParser, Result, TemplateSet, machine_for, mask_sensitive_command,
};

/// Options fixed for the lifetime of a helper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperOptions {
    /// Appended verbatim, in order, to every command built from a template.
    pub suffixes: Vec<String>,
    /// Per-command timeout.
    pub timeout: Option<Duration>,
}

impl HelperOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffixes.push(suffix.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of a call whose failure was not raised.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded(ExecutionResult),
    Failed(ExecutionResult),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn result(&self) -> &ExecutionResult {
        match self {
            Self::Succeeded(result) | Self::Failed(result) => result,
        }
    }

    pub fn into_result(self) -> ExecutionResult {
        match self {
            Self::Succeeded(result) | Self::Failed(result) => result,
        }
    }
}

/// Drives one external tool on one machine.
pub struct CommandHelper {
    templates: TemplateSet,
    machine: Box<dyn Machine>,
    options: HelperOptions,
}

impl CommandHelper {
    pub fn new(templates: TemplateSet, machine: Box<dyn Machine>, options: HelperOptions) -> Self {
        Self {
            templates,
            machine,
            options,
        }
    }

    pub fn machine(&self) -> &dyn Machine {
        self.machine.as_ref()
    }

    pub fn flavor(&self) -> OsFlavor {
        self.machine.os_flavor()
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    pub fn options(&self) -> &HelperOptions {
        &self.options
    }

    /// Build the full command line for `name`, suffixes included.
    pub fn build(&self, name: &str, params: &Parameters) -> Result<String> {
        let command = self.templates.build(name, params, self.flavor())?;
        Ok(self.append_suffixes(&command))
    }

    /// Append the configured suffixes to an already built command.
    pub fn append_suffixes(&self, command: &str) -> String {
        let mut command = command.to_string();
        for suffix in &self.options.suffixes {
            command.push_str(suffix);
        }
        command
    }

    /// Build, run and evaluate a templated operation.
    ///
    /// Build and transport errors are returned under either policy. Only the
    /// success evaluation is subject to `policy`.
    pub fn execute_operation(
        &self,
        name: &str,
        params: &Parameters,
        policy: FailurePolicy,
    ) -> Result<Outcome> {
        let command = self.build(name, params)?;
        self.run_command(name, &command, policy)
    }

    /// Run an already built command line under `label`.
    pub fn run_command(&self, label: &str, command: &str, policy: FailurePolicy) -> Result<Outcome> {
        debug!(
            operation = label,
            machine = %self.machine.describe(),
            command = %mask_sensitive_command(command),
            "Executing command"
        );
        let result = self.machine.execute_command(command, self.options.timeout)?;
        evaluate(label, result, policy)
    }

    /// Raising form of [`execute_operation`](Self::execute_operation).
    pub fn run_operation(&self, name: &str, params: &Parameters) -> Result<ExecutionResult> {
        self.execute_operation(name, params, FailurePolicy::Raise)
            .map(Outcome::into_result)
    }

    /// Run an operation and hand its output to `parser`.
    pub fn run_and_parse<T, F>(&self, name: &str, params: &Parameters, parser: F) -> Result<T>
    where
        F: FnOnce(&str) -> Result<T>,
    {
        let result = self.run_operation(name, params)?;
        parser(&result.output)
    }

    /// Run an operation and extract a [`ParsedRecord`] with `parser`.
    pub fn run_parsed(
        &self,
        name: &str,
        params: &Parameters,
        parser: &RecordParser,
    ) -> Result<ParsedRecord> {
        self.run_and_parse(name, params, |output| parser.parse(output))
    }

    /// Whether an operation succeeds. A failed evaluation is `Ok(false)`.
    pub fn probe_exists(&self, name: &str, params: &Parameters) -> Result<bool> {
        self.execute_operation(name, params, FailurePolicy::Sentinel)
            .map(|outcome| outcome.is_success())
    }
}

impl std::fmt::Debug for CommandHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHelper")
            .field("machine", &self.machine.describe())
            .field("flavor", &self.flavor())
            .field("templates", &self.templates.len())
            .field("options", &self.options)
            .finish()
    }
}

/// Run a one-off request against its own target.
///
/// Remote targets are treated as Unix hosts.
pub fn execute_request(request: &ExecutionRequest) -> Result<Outcome> {
    let machine = machine_for(&request.target, OsFlavor::Unix);
    debug!(
        destination = %request.target,
        command = %mask_sensitive_command(&request.command),
        "Executing request"
    );
    let result = machine.execute_command(&request.command, request.timeout)?;
    evaluate(&request.command, result, request.policy)
}

fn evaluate(label: &str, result: ExecutionResult, policy: FailurePolicy) -> Result<Outcome> {
    if result.is_success() {
        return Ok(Outcome::Succeeded(result));
    }

    let operation = mask_sensitive_command(label);
    warn!(
        %operation,
        exit_code = result.exit_code,
        timed_out = result.timed_out,
        exception = result.exception_message().unwrap_or_default(),
        "Command did not succeed"
    );
    match policy {
        FailurePolicy::Sentinel => Ok(Outcome::Failed(result)),
        FailurePolicy::Raise => Err(HelperError::CommandExecution {
            operation,
            exit_code: result.exit_code,
            output: result.output,
            exception: result.exception,
        }),
    }
}
