//! Run-time measurement helpers for the long pipeline stages.

use std::time::Instant;

/// Format a duration in seconds the way stage summaries print it.
pub fn format_seconds(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;
    if days > 0 {
        format!("{days} days {hours:02}:{minutes:02}:{secs:02}")
    } else if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02} hours")
    } else if minutes > 0 {
        format!("{minutes}:{secs:02} min")
    } else {
        format!("{seconds:.1} s")
    }
}

/// Wall-clock timer for one pipeline stage.
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Stop and return the elapsed time, human formatted.
    pub fn stop(self) -> String {
        format_seconds(self.elapsed_seconds())
    }
}
