//! Terminal progress display.

use std::cell::RefCell;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::Theme;
use crate::progress::{ProgressEvent, ProgressSink};

/// Renders pipeline progress with `indicatif` bars.
///
/// One bar tracks the overall stage percentage; a second bar appears while a
/// download or an archive expansion is running. Detail lines are printed
/// above the bars.
pub struct TerminalSink {
    multi: MultiProgress,
    stage: ProgressBar,
    item: RefCell<Option<(String, ProgressBar)>>,
    theme: Theme,
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new(Theme::detect())
    }
}

impl TerminalSink {
    pub fn new(theme: Theme) -> Self {
        let multi = MultiProgress::new();
        let stage = multi.add(ProgressBar::new(100));
        stage.set_style(style("{bar:30.magenta/dim} {pos:>3}% {msg}"));
        stage.enable_steady_tick(Duration::from_millis(120));

        Self {
            multi,
            stage,
            item: RefCell::new(None),
            theme,
        }
    }

    /// Remove all bars from the terminal.
    pub fn finish(&self) {
        self.clear_item();
        self.stage.finish_and_clear();
    }

    /// Bar for `key`, creating it (and dropping any other) on first use.
    fn item_bar(&self, key: &str, template: &str, len: u64) -> ProgressBar {
        let mut item = self.item.borrow_mut();
        if let Some((current, bar)) = item.as_ref() {
            if current == key {
                return bar.clone();
            }
            bar.finish_and_clear();
        }

        let bar = self.multi.add(ProgressBar::new(len));
        bar.set_style(style(template));
        bar.set_message(key.to_string());
        *item = Some((key.to_string(), bar.clone()));
        bar
    }

    fn clear_item(&self) {
        if let Some((_, bar)) = self.item.borrow_mut().take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for TerminalSink {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Stage { percent, status } => {
                self.stage.set_position(percent.clamp(0.0, 100.0) as u64);
                self.stage.set_message(status.clone());
            }
            ProgressEvent::Detail(message) => {
                tracing::debug!("{}", message);
                let line = format!("  {}", self.theme.dim.apply_to(message));
                if self.multi.println(&line).is_err() {
                    eprintln!("{}", line);
                }
            }
            ProgressEvent::Transfer {
                package,
                bytes,
                total,
            } => {
                let bar = self.item_bar(
                    package,
                    "  {msg} {bytes}/{total_bytes} ({bytes_per_sec})",
                    *total,
                );
                if *total > 0 {
                    bar.set_length(*total);
                }
                bar.set_position(*bytes);
                if *total > 0 && bytes >= total {
                    self.clear_item();
                }
            }
            ProgressEvent::Extract {
                archive,
                done,
                total,
            } => {
                let bar = self.item_bar(archive, "  {msg} {pos}/{len} entries", *total as u64);
                bar.set_position(*done as u64);
                if done >= total {
                    self.clear_item();
                }
            }
            ProgressEvent::Waiting { remaining_secs } => {
                self.stage
                    .set_message(format!("Waiting for environment ({}s)", remaining_secs));
            }
        }
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        self.finish();
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}

/// Format a byte count with a binary unit.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_milliseconds() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
    }

    #[test]
    fn format_duration_seconds() {
        assert_eq!(format_duration(Duration::from_secs_f64(1.5)), "1.5s");
    }

    #[test]
    fn format_duration_minutes() {
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(10), "10 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(26_214_400), "25.0 MiB");
    }

    #[test]
    fn terminal_sink_handles_every_event() {
        let sink = TerminalSink::new(Theme::plain());
        sink.stage(10.0, "Checking");
        sink.detail("detail line");
        for bytes in [5, 10] {
            sink.on_progress(&ProgressEvent::Transfer {
                package: "a.bin".into(),
                bytes,
                total: 10,
            });
        }
        sink.on_progress(&ProgressEvent::Extract {
            archive: "b.zip".into(),
            done: 1,
            total: 2,
        });
        sink.on_progress(&ProgressEvent::Waiting { remaining_secs: 3 });
        assert!(!sink.should_cancel());
        sink.finish();
    }
}
