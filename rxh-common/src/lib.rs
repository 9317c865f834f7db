//! Shared building blocks for Remote Execution Helper.
//!
//! A helper drives an external command-line tool in three steps:
//!
//! 1. [`template`] turns a named, OS-flavored command template and a set of
//!    parameters into a fully substituted command line.
//! 2. [`machine`] runs the command line locally or over SSH and captures the
//!    exit code, output and exception text as an [`ExecutionResult`].
//! 3. [`parse`] extracts structured records from the output and decides
//!    whether the call succeeded.

pub mod config;
pub mod errors;
pub mod logging;
pub mod machine;
pub mod mock;
pub mod parse;
pub mod template;
pub mod types;
pub mod util;

pub use config::{EnvError, EnvParser, FailoverConfig, HelmConfig, RxhConfig, TargetConfig};
pub use errors::{ErrorCategory, ErrorCode, HelperError, Result};
pub use logging::{LogSettings, init_logging};
pub use machine::{LocalMachine, Machine, SshMachine, detect_os_flavor, execute, machine_for};
pub use mock::{MockMachine, MockResponse};
pub use parse::{
    KEY_VALUE_PATTERN, RecordParser, evaluate_success, parse_json, parse_key_value_lines,
    parse_keyvalue, parse_tabular,
};
pub use template::{CommandTemplate, Parameters, TemplateSet};
pub use types::{
    ExecutionRequest, ExecutionResult, FailurePolicy, FieldValue, OsFlavor, ParsedRecord,
    RemoteHost, Target,
};
pub use util::{mask_sensitive_command, quote_arg};
