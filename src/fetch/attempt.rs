//! Source attempt state machine.
//!
//! Sources are tried strictly in order, one at a time:
//!
//! ```text
//! Pending ──begin──▶ Trying(0) ──fail──▶ Trying(1) ──fail──▶ … ──fail──▶ Exhausted
//!                        │                   │
//!                     succeed             succeed
//!                        ▼                   ▼
//!                   Succeeded(0)        Succeeded(1)
//! ```
//!
//! Transitions that don't apply to the current state leave it unchanged.

/// Position in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// No source tried yet.
    Pending,
    /// Currently downloading from source `i`.
    Trying(usize),
    /// Source `i` delivered the artifact.
    Succeeded(usize),
    /// Every source failed (or there were none).
    Exhausted,
}

/// Drives [`AttemptState`] over a fixed number of sources.
#[derive(Debug, Clone)]
pub struct SourceAttempts {
    state: AttemptState,
    source_count: usize,
    attempts: usize,
}

impl SourceAttempts {
    /// Machine over `source_count` sources, in [`AttemptState::Pending`].
    pub fn new(source_count: usize) -> Self {
        Self {
            state: AttemptState::Pending,
            source_count,
            attempts: 0,
        }
    }

    /// Start with the first source.
    pub fn begin(&mut self) -> AttemptState {
        if self.state == AttemptState::Pending {
            self.state = self.enter(0);
        }
        self.state
    }

    /// The current source failed; move to the next one.
    pub fn fail(&mut self) -> AttemptState {
        if let AttemptState::Trying(i) = self.state {
            self.state = self.enter(i + 1);
        }
        self.state
    }

    /// The current source delivered.
    pub fn succeed(&mut self) -> AttemptState {
        if let AttemptState::Trying(i) = self.state {
            self.state = AttemptState::Succeeded(i);
        }
        self.state
    }

    /// Current state.
    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// Number of sources started so far.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    fn enter(&mut self, index: usize) -> AttemptState {
        if index < self.source_count {
            self.attempts += 1;
            AttemptState::Trying(index)
        } else {
            AttemptState::Exhausted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_pending() {
        let machine = SourceAttempts::new(3);
        assert_eq!(machine.state(), AttemptState::Pending);
        assert_eq!(machine.attempts(), 0);
    }

    #[test]
    fn success_on_third_source_counts_three_attempts() {
        let mut machine = SourceAttempts::new(3);
        assert_eq!(machine.begin(), AttemptState::Trying(0));
        assert_eq!(machine.fail(), AttemptState::Trying(1));
        assert_eq!(machine.fail(), AttemptState::Trying(2));
        assert_eq!(machine.succeed(), AttemptState::Succeeded(2));
        assert_eq!(machine.attempts(), 3);
    }

    #[test]
    fn failing_every_source_exhausts() {
        let mut machine = SourceAttempts::new(2);
        machine.begin();
        machine.fail();
        assert_eq!(machine.fail(), AttemptState::Exhausted);
        assert_eq!(machine.attempts(), 2);
    }

    #[test]
    fn no_sources_exhausts_immediately() {
        let mut machine = SourceAttempts::new(0);
        assert_eq!(machine.begin(), AttemptState::Exhausted);
        assert_eq!(machine.attempts(), 0);
    }

    #[test]
    fn terminal_states_ignore_further_events() {
        let mut machine = SourceAttempts::new(2);
        machine.begin();
        machine.succeed();
        assert_eq!(machine.fail(), AttemptState::Succeeded(0));
        assert_eq!(machine.begin(), AttemptState::Succeeded(0));

        let mut machine = SourceAttempts::new(1);
        machine.begin();
        machine.fail();
        assert_eq!(machine.succeed(), AttemptState::Exhausted);
    }

    #[test]
    fn succeed_before_begin_is_ignored() {
        let mut machine = SourceAttempts::new(1);
        assert_eq!(machine.succeed(), AttemptState::Pending);
    }
}
