//! Progress reporting for long phases (rebuild, sweeps, scans).
//!
//! On a terminal a phase draws an indicatif bar or spinner. In log-only mode
//! the bar is hidden and the phase emits periodic tracing lines instead, for
//! tail-friendly output.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// One reported phase of work.
pub struct Phase {
    name: &'static str,
    bar: ProgressBar,
    total: u64,
    log_interval: u64,
    start: Instant,
}

impl Phase {
    /// Phase with a known number of steps.
    pub fn bar(name: &'static str, total: u64) -> Self {
        let bar = ProgressBar::new(total);
        if is_log_only() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
                    .unwrap()
                    .progress_chars("=> "),
            );
        }
        bar.set_message(name);
        Self {
            name,
            bar,
            total,
            log_interval: (total / 10).max(1),
            start: Instant::now(),
        }
    }

    /// Phase of unknown length.
    pub fn spinner(name: &'static str) -> Self {
        let bar = ProgressBar::new_spinner();
        if is_log_only() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{msg} {spinner} [{elapsed_precise}]")
                    .unwrap(),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
        }
        bar.set_message(name);
        Self {
            name,
            bar,
            total: 0,
            log_interval: u64::MAX,
            start: Instant::now(),
        }
    }

    /// Advance by one step. Safe to call from rayon workers.
    pub fn inc(&self) {
        self.bar.inc(1);
        if is_log_only() && self.total > 0 {
            let current = self.bar.position();
            if current % self.log_interval == 0 || current == self.total {
                let pct = 100.0 * current as f64 / self.total as f64;
                tracing::info!(phase = self.name, current, total = self.total, "{:.1}%", pct);
            }
        }
    }

    pub fn finish(&self, msg: String) {
        tracing::info!(
            phase = self.name,
            elapsed = %format_duration(self.start.elapsed()),
            "{}",
            msg
        );
        self.bar.finish_with_message(msg);
    }

    pub fn abandon(&self, msg: String) {
        tracing::warn!(phase = self.name, "{}", msg);
        self.bar.abandon_with_message(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_phase_counts_steps() {
        let phase = Phase::bar("test", 3);
        phase.inc();
        phase.inc();
        assert_eq!(phase.bar.position(), 2);
        phase.finish("done".to_string());
    }
}
