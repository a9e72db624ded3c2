//! Waiting for a fresh runtime install to become usable.
//!
//! Installers update PATH in the registry, but new processes may not see the
//! change immediately. After a runtime install the pipeline waits until a
//! minimum time has passed since the install finished, then checks the
//! runtime command once.

use std::thread;
use std::time::{Duration, Instant};

use crate::probe::runtime_version_command;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::shell::{execute_check, ProcessRunner};

/// Default granularity of waits.
pub const WAIT_SLICE: Duration = Duration::from_millis(200);

/// Default extra wait after a failed check.
pub const EXTRA_WAIT: Duration = Duration::from_secs(5);

/// Polls for the runtime command after an install.
pub struct ReadinessWaiter<'a> {
    runner: &'a dyn ProcessRunner,
    sink: &'a dyn ProgressSink,
    slice: Duration,
    extra_wait: Duration,
}

impl<'a> ReadinessWaiter<'a> {
    /// Create a waiter with the default slice and extra wait.
    pub fn new(runner: &'a dyn ProcessRunner, sink: &'a dyn ProgressSink) -> Self {
        Self {
            runner,
            sink,
            slice: WAIT_SLICE,
            extra_wait: EXTRA_WAIT,
        }
    }

    /// Override the sleep granularity.
    pub fn with_slice(mut self, slice: Duration) -> Self {
        self.slice = slice;
        self
    }

    /// Override the extra wait after a failed check.
    pub fn with_extra_wait(mut self, extra_wait: Duration) -> Self {
        self.extra_wait = extra_wait;
        self
    }

    /// Wait for the runtime installed at `installed_at` to be usable.
    ///
    /// Sleeps until `min_wait` has passed since the install; skips waiting
    /// entirely once `max_wait` has passed. Runs the version command once.
    /// If it fails after an initial wait, waits `extra_wait` more without
    /// checking again. Returns the check result.
    pub fn await_ready(
        &self,
        installed_at: Instant,
        min_wait: Duration,
        max_wait: Duration,
    ) -> bool {
        let elapsed = installed_at.elapsed();
        let mut waited = false;

        if elapsed < min_wait {
            self.sink.detail("Waiting for environment changes to take effect");
            waited = self.sleep_in_slices(min_wait - elapsed);
        } else if elapsed > max_wait {
            tracing::debug!(
                "{:.1}s since install, skipping wait",
                elapsed.as_secs_f64()
            );
        }

        self.sink.detail("Checking python --version");
        let ready = execute_check(self.runner, &runtime_version_command());

        if ready {
            tracing::info!("Runtime command is available");
            self.sink.detail("Python is ready");
        } else {
            tracing::warn!("Runtime command not available yet");
            if waited {
                self.sink.detail(&format!(
                    "Python not reachable yet, waiting {:.1}s more",
                    self.extra_wait.as_secs_f64()
                ));
                self.sleep_in_slices(self.extra_wait);
            }
        }
        ready
    }

    /// Sleep for `total`, reporting remaining seconds. Returns false if
    /// cancelled before the first slice.
    fn sleep_in_slices(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        let mut last_reported = None;
        let mut slept = false;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || self.sink.should_cancel() {
                break;
            }

            let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            if last_reported != Some(secs) {
                self.sink.on_progress(&ProgressEvent::Waiting {
                    remaining_secs: secs,
                });
                last_reported = Some(secs);
            }

            thread::sleep(self.slice.min(remaining));
            slept = true;
        }
        slept
    }
}
