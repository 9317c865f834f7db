//! Command execution on local and remote machines.
//!
//! A nonzero exit code is never an error here: it is reported in the
//! [`ExecutionResult`] and interpreted by the caller. Only transport problems
//! (empty command, unreachable host, rejected credentials, local spawn
//! failures) are returned as errors.
//!
//! Timeouts kill the local child together with its process group (on Unix)
//! and bound the wait for its output. For remote targets that child is the
//! SSH client; a command already started on the remote host may keep running.

use chrono::Utc;
use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::errors::{HelperError, Result};
use crate::types::{ExecutionResult, OsFlavor, RemoteHost, Target};
use crate::util::mask_sensitive_command;

/// Exit code reported for commands killed by a timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code the OpenSSH client uses for its own (connection) errors.
pub const SSH_CONNECTION_EXIT_CODE: i32 = 255;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const POLL_INTERVAL: Duration = Duration::from_millis(10);
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Something that can run a command line and report what happened.
pub trait Machine: Send + Sync {
    /// Run `command` and capture exit code, output and exception text.
    fn execute_command(&self, command: &str, timeout: Option<Duration>) -> Result<ExecutionResult>;

    /// OS flavor used to pick command templates for this machine.
    fn os_flavor(&self) -> OsFlavor;

    /// Short description for logs (`local`, `user@host`).
    fn describe(&self) -> String;
}

impl<M: Machine + ?Sized> Machine for Arc<M> {
    fn execute_command(&self, command: &str, timeout: Option<Duration>) -> Result<ExecutionResult> {
        (**self).execute_command(command, timeout)
    }

    fn os_flavor(&self) -> OsFlavor {
        (**self).os_flavor()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Runs commands through the local shell.
#[derive(Debug, Clone)]
pub struct LocalMachine {
    flavor: OsFlavor,
}

impl LocalMachine {
    pub fn new() -> Self {
        Self {
            flavor: OsFlavor::host(),
        }
    }
}

impl Default for LocalMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine for LocalMachine {
    fn execute_command(&self, command: &str, timeout: Option<Duration>) -> Result<ExecutionResult> {
        ensure_not_empty(command)?;
        debug!(command = %mask_sensitive_command(command), "Executing locally");

        let mut cmd = match self.flavor {
            OsFlavor::Windows => {
                let mut cmd = Command::new("cmd");
                cmd.arg("/C").arg(command);
                cmd
            }
            OsFlavor::Unix => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(command);
                cmd
            }
        };
        run_with_timeout(&mut cmd, timeout)
    }

    fn os_flavor(&self) -> OsFlavor {
        self.flavor
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}

/// Runs commands on a remote host through the system `ssh` client.
///
/// Password authentication wraps the client in `sshpass -e`; the password is
/// handed over in the `SSHPASS` environment variable and never appears on a
/// command line.
#[derive(Debug, Clone)]
pub struct SshMachine {
    host: RemoteHost,
    flavor: OsFlavor,
    connect_timeout: Duration,
}

impl SshMachine {
    pub fn new(host: RemoteHost, flavor: OsFlavor) -> Self {
        Self {
            host,
            flavor,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn host(&self) -> &RemoteHost {
        &self.host
    }

    /// Assemble the client invocation for `command`.
    fn client_command(&self, command: &str) -> Command {
        let mut cmd = match &self.host.password {
            Some(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg("ssh").env("SSHPASS", password);
                cmd
            }
            None => Command::new("ssh"),
        };

        let batch_mode = if self.host.password.is_some() { "no" } else { "yes" };
        cmd.arg("-o").arg(format!("BatchMode={batch_mode}"));
        cmd.arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)));
        cmd.arg("-o").arg("StrictHostKeyChecking=accept-new");
        if let Some(identity) = &self.host.identity_file {
            cmd.arg("-i").arg(identity);
        }
        if self.host.port != crate::types::DEFAULT_SSH_PORT {
            cmd.arg("-p").arg(self.host.port.to_string());
        }
        cmd.arg(self.host.destination());
        cmd.arg(command);
        cmd
    }

    fn connection_error(&self, message: impl Into<String>) -> HelperError {
        HelperError::Connection {
            host: self.host.hostname.clone(),
            message: message.into(),
        }
    }
}

impl Machine for SshMachine {
    fn execute_command(&self, command: &str, timeout: Option<Duration>) -> Result<ExecutionResult> {
        ensure_not_empty(command)?;
        debug!(
            host = %self.host.hostname,
            command = %mask_sensitive_command(command),
            "Executing over SSH"
        );

        let mut cmd = self.client_command(command);
        let result = match run_with_timeout(&mut cmd, timeout) {
            Ok(result) => result,
            Err(HelperError::Io(err)) => {
                let client = if self.host.password.is_some() { "sshpass" } else { "ssh" };
                return Err(self.connection_error(format!("failed to start {client}: {err}")));
            }
            Err(other) => return Err(other),
        };

        if result.exit_code == SSH_CONNECTION_EXIT_CODE && !result.timed_out {
            let message = result
                .exception_message()
                .unwrap_or("ssh exited with status 255")
                .to_string();
            warn!(host = %self.host.hostname, %message, "SSH connection failed");
            return Err(self.connection_error(message));
        }
        // sshpass reports a rejected password with exit code 5.
        if self.host.password.is_some() && result.exit_code == 5 && result.output.is_empty() {
            return Err(self.connection_error("password rejected"));
        }

        Ok(result)
    }

    fn os_flavor(&self) -> OsFlavor {
        self.flavor
    }

    fn describe(&self) -> String {
        self.host.destination()
    }
}

/// Pick the machine implementation for a target.
pub fn machine_for(target: &Target, flavor: OsFlavor) -> Box<dyn Machine> {
    match target {
        Target::Local => Box::new(LocalMachine::new()),
        Target::Remote(host) => Box::new(SshMachine::new(host.clone(), flavor)),
    }
}

/// Run one command against a target.
///
/// Remote targets are assumed to be Unix-like; use [`SshMachine`] directly
/// (or [`detect_os_flavor`]) for Windows hosts.
pub fn execute(command: &str, target: &Target, timeout: Option<Duration>) -> Result<ExecutionResult> {
    machine_for(target, OsFlavor::Unix).execute_command(command, timeout)
}

/// Probe which OS family a machine runs.
///
/// Tries `uname -s` first and falls back to `cmd /c ver`.
pub fn detect_os_flavor(machine: &dyn Machine) -> Result<OsFlavor> {
    let uname = machine.execute_command("uname -s", None)?;
    if uname.is_success() {
        return Ok(OsFlavor::Unix);
    }

    let ver = machine.execute_command("cmd /c ver", None)?;
    if ver.exit_code == 0 && ver.output.to_lowercase().contains("windows") {
        return Ok(OsFlavor::Windows);
    }

    Err(HelperError::UnknownOs(format!(
        "{}: uname exited {}, ver exited {}",
        machine.describe(),
        uname.exit_code,
        ver.exit_code
    )))
}

fn ensure_not_empty(command: &str) -> Result<()> {
    if command.trim().is_empty() {
        return Err(HelperError::EmptyCommand);
    }
    Ok(())
}

/// Spawn `cmd`, collect stdout/stderr, and kill it if `timeout` elapses.
///
/// The pipes are drained on reader threads so a chatty child cannot block on
/// a full pipe buffer while we poll for exit. On Unix the child leads its own
/// process group, and a timeout kills the whole group so grandchildren
/// (`sh -c` pipelines, `ssh` under `sshpass`) do not outlive it.
fn run_with_timeout(cmd: &mut Command, timeout: Option<Duration>) -> Result<ExecutionResult> {
    let started_at = Utc::now();
    let start = Instant::now();

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout_reader = child.stdout.take().map(PipeReader::spawn);
    let stderr_reader = child.stderr.take().map(PipeReader::spawn);

    let mut timed_out = false;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if let Some(limit) = timeout
            && start.elapsed() >= limit
        {
            timed_out = true;
            kill_process_tree(&mut child);
            break child.wait().ok();
        }
        thread::sleep(POLL_INTERVAL);
    };

    // After a timeout, a descendant we could not kill may still hold the
    // pipes open; take what has been read so far instead of waiting for EOF.
    let drain_deadline = timed_out.then(|| Instant::now() + DRAIN_GRACE);
    let output = PipeReader::finish(stdout_reader, drain_deadline);
    let mut exception = PipeReader::finish(stderr_reader, drain_deadline);
    let duration = start.elapsed();

    if timed_out {
        if !exception.is_empty() && !exception.ends_with('\n') {
            exception.push('\n');
        }
        exception.push_str(&format!(
            "Command timed out after {}",
            humantime::format_duration(timeout.unwrap_or(duration))
        ));
        warn!(elapsed_ms = duration.as_millis() as u64, "Command timed out");
    }

    let exit_code = if timed_out {
        TIMEOUT_EXIT_CODE
    } else {
        status.and_then(|status| status.code()).unwrap_or(-1)
    };

    let mut result = ExecutionResult::new(exit_code, output, Some(exception));
    result.started_at = started_at;
    result.duration = duration;
    result.timed_out = timed_out;

    debug!(
        exit_code = result.exit_code,
        duration_ms = duration.as_millis() as u64,
        timed_out,
        "Command completed"
    );
    Ok(result)
}

/// Kill `child` and, on Unix, every process in its group.
fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        match Command::new("kill")
            .args(["-KILL", "--", group.as_str()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => {}
            Ok(status) => debug!(%group, ?status, "Process group kill failed"),
            Err(e) => debug!(%group, error = %e, "Failed to run kill for process group"),
        }
    }
    let _ = child.kill();
}

/// Background reader for one child pipe.
///
/// Bytes are appended to a shared buffer as they arrive, so a caller that
/// stops waiting early still sees everything read up to that point.
struct PipeReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(mut pipe: R) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done) = mpsc::channel();
        let sink = Arc::clone(&buffer);
        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Ok(mut buffer) = sink.lock() {
                            buffer.extend_from_slice(&chunk[..n]);
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            let _ = done_tx.send(());
        });
        Self { buffer, done }
    }

    /// Wait for EOF (or until `deadline`) and return the text read.
    fn finish(reader: Option<Self>, deadline: Option<Instant>) -> String {
        let Some(reader) = reader else {
            return String::new();
        };
        match deadline {
            Some(deadline) => {
                let _ = reader
                    .done
                    .recv_timeout(deadline.saturating_duration_since(Instant::now()));
            }
            None => {
                let _ = reader.done.recv();
            }
        }
        reader
            .buffer
            .lock()
            .map(|buffer| String::from_utf8_lossy(&buffer).into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockMachine, MockResponse};

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_ssh_client_command_key_auth() {
        let host = RemoteHost::new("worker1", "ubuntu").with_identity_file("/keys/id_ed25519");
        let machine = SshMachine::new(host, OsFlavor::Unix);
        let cmd = machine.client_command("helm list -A");

        assert_eq!(cmd.get_program(), "ssh");
        let args = args_of(&cmd);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
        assert!(args.windows(2).any(|w| w == ["-i", "/keys/id_ed25519"]));
        assert!(!args.contains(&"-p".to_string()));
        assert_eq!(args[args.len() - 2], "ubuntu@worker1");
        assert_eq!(args[args.len() - 1], "helm list -A");
    }

    #[test]
    fn test_ssh_client_command_password_auth() {
        let host = RemoteHost::new("worker1", "admin")
            .with_password("s3cret")
            .with_port(2222);
        let machine = SshMachine::new(host, OsFlavor::Unix);
        let cmd = machine.client_command("uname -s");

        assert_eq!(cmd.get_program(), "sshpass");
        let args = args_of(&cmd);
        assert_eq!(&args[..2], ["-e", "ssh"]);
        assert!(args.contains(&"BatchMode=no".to_string()));
        assert!(args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(!args.iter().any(|a| a.contains("s3cret")));

        let env: Vec<_> = cmd.get_envs().collect();
        assert!(env.iter().any(|(k, v)| *k == "SSHPASS" && v.is_some()));
    }

    #[test]
    fn test_empty_command_rejected() {
        let err = LocalMachine::new().execute_command("   ", None).unwrap_err();
        assert!(matches!(err, HelperError::EmptyCommand));
    }

    #[test]
    fn test_detect_os_flavor_unix() {
        let machine = MockMachine::new(OsFlavor::Unix).respond("uname -s", MockResponse::ok("Linux\n"));
        assert_eq!(detect_os_flavor(&machine).unwrap(), OsFlavor::Unix);
    }

    #[test]
    fn test_detect_os_flavor_windows() {
        let machine = MockMachine::new(OsFlavor::Windows)
            .respond("uname -s", MockResponse::failure(1, "'uname' is not recognized"))
            .respond("ver", MockResponse::ok("\nMicrosoft Windows [Version 10.0.17763.1]\n"));
        assert_eq!(detect_os_flavor(&machine).unwrap(), OsFlavor::Windows);
    }

    #[test]
    fn test_detect_os_flavor_unknown() {
        let machine = MockMachine::new(OsFlavor::Unix).with_default(MockResponse::failure(127, "not found"));
        assert!(matches!(detect_os_flavor(&machine), Err(HelperError::UnknownOs(_))));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        #[test]
        fn test_local_success() {
            let result = LocalMachine::new().execute_command("echo hello", None).unwrap();
            assert_eq!(result.exit_code, 0);
            assert_eq!(result.output.trim(), "hello");
            assert!(result.exception.is_none());
            assert!(result.is_success());
        }

        #[test]
        fn test_local_nonzero_exit_is_not_an_error() {
            let result = LocalMachine::new()
                .execute_command("echo oops >&2; exit 3", None)
                .unwrap();
            assert_eq!(result.exit_code, 3);
            assert_eq!(result.exception_message(), Some("oops"));
            assert!(!result.is_success());
        }

        #[test]
        fn test_local_timeout() {
            let result = LocalMachine::new()
                .execute_command("sleep 5", Some(Duration::from_millis(100)))
                .unwrap();
            assert!(result.timed_out);
            assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
            assert!(result.exception.as_deref().unwrap().contains("timed out"));
            assert!(result.duration < Duration::from_secs(5));
        }

        #[test]
        fn test_local_timeout_kills_compound_command() {
            let start = Instant::now();
            let result = LocalMachine::new()
                .execute_command("sleep 3; echo done", Some(Duration::from_millis(200)))
                .unwrap();
            let wall = start.elapsed();

            assert!(result.timed_out);
            assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
            assert!(wall < Duration::from_secs(2), "waited {wall:?}");
            assert!(result.duration <= wall);
            assert!(!result.output.contains("done"));
        }

        #[test]
        fn test_local_timeout_keeps_partial_output() {
            let result = LocalMachine::new()
                .execute_command("echo started; sleep 3; echo finished", Some(Duration::from_millis(300)))
                .unwrap();
            assert!(result.timed_out);
            assert_eq!(result.output.trim(), "started");
        }

        #[test]
        fn test_execute_local_target() {
            let result = execute("printf 'a b\\nc d\\n'", &Target::Local, None).unwrap();
            assert_eq!(result.formatted_output(), vec!["a b", "c d"]);
        }
    }
}
