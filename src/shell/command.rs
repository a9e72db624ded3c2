//! Process execution.
//!
//! All subprocess invocation goes through the [`ProcessRunner`] capability.
//! Platform quirks (hidden console windows on Windows) live in
//! [`SystemRunner`]; callers only describe what to run and for how long.

use crate::error::{ProvisionError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// `CREATE_NO_WINDOW` process creation flag.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of executing a process.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal or timed out).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether the process exited with code 0.
    pub success: bool,

    /// Whether the process was killed for exceeding its timeout.
    pub timed_out: bool,
}

impl CommandResult {
    /// Create a success result.
    pub fn success(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            duration,
            success: true,
            timed_out: false,
        }
    }

    /// Create a failure result.
    pub fn failure(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            success: false,
            timed_out: false,
        }
    }

    /// Create a result for a process killed at its deadline.
    pub fn timeout(duration: Duration) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration,
            success: false,
            timed_out: true,
        }
    }
}

/// Description of a process to run.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// Program to execute (looked up on PATH when not absolute).
    pub program: PathBuf,

    /// Arguments, passed verbatim without shell interpretation.
    pub args: Vec<String>,

    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Hard ceiling on run time (None = wait indefinitely).
    pub timeout: Option<Duration>,

    /// Suppress the console window on Windows.
    pub hide_window: bool,
}

impl CommandSpec {
    /// Create a spec for `program` with no arguments and a hidden window.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            hide_window: true,
            ..Default::default()
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Show the process window instead of hiding it.
    pub fn visible(mut self) -> Self {
        self.hide_window = false;
        self
    }

    /// Human-readable command line, used for logging and errors.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Capability for running external processes.
pub trait ProcessRunner {
    /// Run a process to completion (or its timeout) capturing output.
    ///
    /// Returns `Err(CommandFailed)` only when the process could not be
    /// started; non-zero exits and timeouts are reported in the result.
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult>;

    /// Start a process without waiting for it, returning its pid.
    fn spawn(&self, spec: &CommandSpec) -> Result<u32>;
}

/// [`ProcessRunner`] backed by `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult> {
        let start = Instant::now();

        let mut cmd = build_command(spec);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            tracing::debug!("Failed to start '{}': {}", spec.display(), e);
            spawn_error(spec, &e)
        })?;

        // Drain both pipes on their own threads so a chatty child can't
        // block on a full pipe while we poll for exit.
        let stdout = PipeReader::start(child.stdout.take());
        let stderr = PipeReader::start(child.stderr.take());

        let status = wait_with_deadline(&mut child, spec.timeout, start)?;
        let duration = start.elapsed();

        let Some(status) = status else {
            // Grandchildren may still hold the pipes open; leave the readers behind.
            tracing::warn!(
                "'{}' exceeded {:?} and was killed",
                spec.display(),
                spec.timeout.unwrap_or_default()
            );
            return Ok(CommandResult::timeout(duration));
        };

        // A grandchild that inherited the pipes can keep them open after the
        // child exits. Collect against the same deadline, never past it.
        let deadline = spec.timeout.map(|limit| start + limit);
        let stdout = stdout.collect(deadline);
        let stderr = stderr.collect(deadline);
        let duration = start.elapsed();

        if status.success() {
            Ok(CommandResult::success(stdout, stderr, duration))
        } else {
            Ok(CommandResult::failure(
                status.code(),
                stdout,
                stderr,
                duration,
            ))
        }
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<u32> {
        let mut cmd = build_command(spec);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        let child = cmd.spawn().map_err(|e| spawn_error(spec, &e))?;
        Ok(child.id())
    }
}

/// Run a command and report whether it exited 0.
pub fn execute_check(runner: &dyn ProcessRunner, spec: &CommandSpec) -> bool {
    runner.run(spec).map(|r| r.success).unwrap_or(false)
}

fn build_command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args);

    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        if spec.hide_window {
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
    }

    cmd
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
    start: Instant,
) -> Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if let Some(limit) = timeout {
            if start.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_error(spec: &CommandSpec, err: &std::io::Error) -> ProvisionError {
    ProvisionError::CommandFailed {
        command: spec.display(),
        code: None,
        message: err.to_string(),
    }
}

/// Reads a child pipe on a background thread into a shared buffer.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl PipeReader {
    fn start<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        let shared = Arc::clone(&buf);

        thread::spawn(move || {
            if let Some(mut pipe) = pipe {
                let mut chunk = [0u8; 4096];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if let Ok(mut buf) = shared.lock() {
                                buf.extend_from_slice(&chunk[..n]);
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
            }
            let _ = tx.send(());
        });

        Self { buf, done }
    }

    /// Wait for end-of-stream until `deadline`, then return what was read.
    ///
    /// A reader still blocked at the deadline is left behind.
    fn collect(self, deadline: Option<Instant>) -> String {
        let finished = match deadline {
            Some(deadline) => self
                .done
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                .is_ok(),
            None => self.done.recv().is_ok(),
        };
        if !finished {
            tracing::debug!("Output pipe still open at deadline; keeping partial output");
        }

        let bytes = self.buf.lock().map(|buf| buf.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Name of the file at `path`, or the whole path if it has none.
pub fn program_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn run_successful_command() {
        let result = SystemRunner.run(&sh("echo hello")).unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.contains("hello"));
        assert!(!result.timed_out);
    }

    #[test]
    fn run_failing_command_keeps_exit_code() {
        let result = SystemRunner.run(&sh("echo oops >&2; exit 3")).unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert!(result.stderr.contains("oops"));
    }

    #[test]
    fn run_with_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        let spec = CommandSpec::new("pwd").cwd(temp.path());

        let result = SystemRunner.run(&spec).unwrap();

        assert!(result.success);
        let name = temp.path().file_name().unwrap().to_string_lossy();
        assert!(result.stdout.contains(name.as_ref()));
    }

    #[test]
    fn run_kills_process_at_timeout() {
        let spec = sh("sleep 5").timeout(Duration::from_millis(200));

        let result = SystemRunner.run(&spec).unwrap();

        assert!(result.timed_out);
        assert!(!result.success);
        assert!(result.duration < Duration::from_secs(4));
    }

    #[test]
    fn run_missing_program_is_command_failed() {
        let spec = CommandSpec::new("definitely-not-a-real-program-xyz");

        let err = SystemRunner.run(&spec).unwrap_err();

        match err {
            ProvisionError::CommandFailed { code, message, .. } => {
                assert_eq!(code, None);
                assert!(!message.is_empty());
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[test]
    fn spawn_missing_program_carries_reason() {
        let spec = CommandSpec::new("definitely-not-a-real-program-xyz");

        let err = SystemRunner.spawn(&spec).unwrap_err();

        assert!(err.to_string().contains("definitely-not-a-real-program-xyz"));
        assert!(
            matches!(err, ProvisionError::CommandFailed { ref message, .. } if !message.is_empty())
        );
    }

    #[test]
    fn run_returns_at_deadline_when_grandchild_holds_pipes() {
        let spec = sh("sleep 6 & echo started").timeout(Duration::from_secs(1));
        let start = Instant::now();

        let result = SystemRunner.run(&spec).unwrap();

        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(result.success);
        assert!(result.stdout.contains("started"));
    }

    #[test]
    fn execute_check_returns_bool() {
        assert!(execute_check(&SystemRunner, &sh("exit 0")));
        assert!(!execute_check(&SystemRunner, &sh("exit 1")));
    }

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("setup.exe").args(["/S", "/D=C:\\App"]);
        assert_eq!(spec.display(), "setup.exe /S /D=C:\\App");
    }

    #[test]
    fn program_name_uses_file_name() {
        assert_eq!(
            program_name(Path::new("/downloads/python-3.11.9-amd64.exe")),
            "python-3.11.9-amd64.exe"
        );
    }
}
