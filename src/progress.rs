//! Progress reporting.
//!
//! Every pipeline component receives a [`ProgressSink`] at construction and
//! reports through it; there is no global callback. The sink is also the
//! place where a host frontend can request cooperative cancellation between
//! discrete steps (chunks, archive entries, packages, wait slices).
//!
//! # Example
//!
//! ```
//! use hostprep::progress::{ProgressEvent, ProgressSink, RecordingSink};
//!
//! let sink = RecordingSink::new();
//! sink.detail("Checking runtime");
//! sink.on_progress(&ProgressEvent::Stage { percent: 10.0, status: "Probing".into() });
//! assert!(sink.has_detail("runtime"));
//! ```

use std::cell::{Cell, RefCell};

/// A single progress notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Overall pipeline position (0-100) with a short status line.
    Stage { percent: f32, status: String },

    /// Free-form detail line.
    Detail(String),

    /// Bytes written so far for a download; `total` is 0 when unknown.
    Transfer {
        package: String,
        bytes: u64,
        total: u64,
    },

    /// Archive expansion position.
    Extract {
        archive: String,
        done: usize,
        total: usize,
    },

    /// Seconds left while waiting for the environment to converge.
    Waiting { remaining_secs: u64 },
}

/// Receives progress from pipeline components.
pub trait ProgressSink {
    /// Handle a progress event.
    fn on_progress(&self, event: &ProgressEvent);

    /// Whether the caller wants the pipeline to stop at the next step boundary.
    fn should_cancel(&self) -> bool {
        false
    }

    /// Convenience for a detail line.
    fn detail(&self, message: &str) {
        self.on_progress(&ProgressEvent::Detail(message.to_string()));
    }

    /// Convenience for a stage update.
    fn stage(&self, percent: f32, status: &str) {
        self.on_progress(&ProgressEvent::Stage {
            percent,
            status: status.to_string(),
        });
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Forwards stage and detail events to `tracing`.
///
/// Transfer and extract events are only emitted at trace level since they
/// fire once per chunk.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Stage { percent, status } => {
                tracing::info!("[{:>3.0}%] {}", percent, status)
            }
            ProgressEvent::Detail(msg) => tracing::info!("{}", msg),
            ProgressEvent::Transfer {
                package,
                bytes,
                total,
            } => tracing::trace!("{}: {}/{} bytes", package, bytes, total),
            ProgressEvent::Extract {
                archive,
                done,
                total,
            } => tracing::debug!("{}: {}/{} entries", archive, done, total),
            ProgressEvent::Waiting { remaining_secs } => {
                tracing::debug!("waiting, ~{}s remaining", remaining_secs)
            }
        }
    }
}

/// Records every event for later inspection.
///
/// Used by tests and by frontends that render a log after the run. Can be
/// armed to request cancellation after a number of events.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<ProgressEvent>>,
    cancel_after: Cell<Option<usize>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation once `count` events have been recorded.
    pub fn cancel_after(&self, count: usize) {
        self.cancel_after.set(Some(count));
    }

    /// All recorded events, in order.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.borrow().clone()
    }

    /// All recorded detail lines, in order.
    pub fn details(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Detail(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether any detail line contains `needle`.
    pub fn has_detail(&self, needle: &str) -> bool {
        self.details().iter().any(|d| d.contains(needle))
    }

    /// Number of transfer events recorded.
    pub fn transfer_count(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Transfer { .. }))
            .count()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.borrow_mut().push(event.clone());
    }

    fn should_cancel(&self) -> bool {
        match self.cancel_after.get() {
            Some(limit) => self.events.borrow().len() >= limit,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.detail("first");
        sink.stage(50.0, "halfway");
        sink.detail("second");

        assert_eq!(sink.details(), vec!["first", "second"]);
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn recording_sink_counts_transfers() {
        let sink = RecordingSink::new();
        for bytes in [10, 20, 30] {
            sink.on_progress(&ProgressEvent::Transfer {
                package: "a.bin".into(),
                bytes,
                total: 30,
            });
        }
        assert_eq!(sink.transfer_count(), 3);
    }

    #[test]
    fn cancel_after_trips_once_limit_reached() {
        let sink = RecordingSink::new();
        sink.cancel_after(2);
        sink.detail("one");
        assert!(!sink.should_cancel());
        sink.detail("two");
        assert!(sink.should_cancel());
    }

    #[test]
    fn null_sink_never_cancels() {
        let sink = NullSink;
        sink.detail("ignored");
        assert!(!sink.should_cancel());
    }
}
