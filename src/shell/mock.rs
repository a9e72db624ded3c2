//! Scripted process runner for testing.
//!
//! Responses are matched by substring against the rendered command line,
//! first registered match wins. Unmatched commands behave like a program
//! that is not installed.

use std::cell::RefCell;
use std::time::Duration;

use super::command::{CommandResult, CommandSpec, ProcessRunner};
use crate::error::{ProvisionError, Result};

/// Canned behaviour for a matched command.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Process exits with the given code and output.
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// Process is killed at its deadline.
    Timeout,
    /// Process cannot be started.
    SpawnError,
}

impl MockResponse {
    /// Exit 0 with the given stdout.
    pub fn ok(stdout: &str) -> Self {
        MockResponse::Exit {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// Exit with `code` and the given stderr.
    pub fn fail(code: i32, stderr: &str) -> Self {
        MockResponse::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

/// A [`ProcessRunner`] that replays scripted responses and records calls.
#[derive(Debug, Default)]
pub struct MockRunner {
    responses: Vec<(String, MockResponse)>,
    calls: RefCell<Vec<String>>,
}

impl MockRunner {
    /// Create a runner where every command fails to start.
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond with `response` to any command line containing `pattern`.
    pub fn on(mut self, pattern: &str, response: MockResponse) -> Self {
        self.responses.push((pattern.to_string(), response));
        self
    }

    /// Every command line run or spawned, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Number of recorded command lines containing `pattern`.
    pub fn call_count(&self, pattern: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.contains(pattern))
            .count()
    }

    fn respond(&self, spec: &CommandSpec) -> MockResponse {
        let line = spec.display();
        self.calls.borrow_mut().push(line.clone());
        self.responses
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or(MockResponse::SpawnError)
    }
}

impl ProcessRunner for MockRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult> {
        let duration = Duration::from_millis(1);
        match self.respond(spec) {
            MockResponse::Exit {
                code: 0,
                stdout,
                stderr,
            } => Ok(CommandResult::success(stdout, stderr, duration)),
            MockResponse::Exit {
                code,
                stdout,
                stderr,
            } => Ok(CommandResult::failure(Some(code), stdout, stderr, duration)),
            MockResponse::Timeout => Ok(CommandResult::timeout(
                spec.timeout.unwrap_or(duration),
            )),
            MockResponse::SpawnError => Err(ProvisionError::CommandFailed {
                command: spec.display(),
                code: None,
                message: "program not found".to_string(),
            }),
        }
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<u32> {
        match self.respond(spec) {
            MockResponse::Exit { code: 0, .. } => Ok(4242),
            _ => Err(ProvisionError::CommandFailed {
                command: spec.display(),
                code: None,
                message: "program not found".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_pattern_wins() {
        let runner = MockRunner::new()
            .on("--version", MockResponse::ok("Python 3.11.9"))
            .on("python", MockResponse::fail(1, "nope"));

        let result = runner
            .run(&CommandSpec::new("python").arg("--version"))
            .unwrap();
        assert!(result.success);
        assert_eq!(result.stdout, "Python 3.11.9");
    }

    #[test]
    fn unmatched_command_fails_to_start() {
        let runner = MockRunner::new();
        let err = runner.run(&CommandSpec::new("reg")).unwrap_err();
        assert!(matches!(err, ProvisionError::CommandFailed { .. }));
        assert_eq!(runner.call_count("reg"), 1);
    }

    #[test]
    fn timeout_response_marks_result() {
        let runner = MockRunner::new().on("setup", MockResponse::Timeout);
        let spec = CommandSpec::new("setup.exe").timeout(Duration::from_secs(600));
        let result = runner.run(&spec).unwrap();
        assert!(result.timed_out);
        assert_eq!(result.duration, Duration::from_secs(600));
    }

    #[test]
    fn spawn_succeeds_only_for_zero_exit() {
        let runner = MockRunner::new()
            .on("good", MockResponse::ok(""))
            .on("bad", MockResponse::fail(1, ""));
        assert_eq!(runner.spawn(&CommandSpec::new("good")).unwrap(), 4242);
        assert!(runner.spawn(&CommandSpec::new("bad")).is_err());
    }
}
