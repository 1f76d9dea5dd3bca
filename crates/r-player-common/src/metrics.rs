//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the player runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Result of closing one measurement window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSummary {
    pub samples: u64,
    pub elapsed: Duration,
    pub rate_per_sec: f64,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    samples: u64,
    last_rate: Option<f64>,
}

/// Counts events over fixed windows and reports the achieved rate.
#[derive(Debug)]
pub struct ThroughputMonitor {
    window: Duration,
    state: Mutex<Window>,
}

impl ThroughputMonitor {
    pub fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: Duration, started: Instant) -> Self {
        Self {
            window,
            state: Mutex::new(Window {
                started,
                samples: 0,
                last_rate: None,
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn record(&self) {
        self.state.lock().samples += 1;
    }

    /// Close the current window if it has elapsed at `now`.
    pub fn poll_at(&self, now: Instant) -> Option<ThroughputSummary> {
        let mut state = self.state.lock();
        let elapsed = now.saturating_duration_since(state.started);
        if elapsed < self.window || elapsed.is_zero() {
            return None;
        }
        let rate_per_sec = state.samples as f64 / elapsed.as_secs_f64();
        let summary = ThroughputSummary {
            samples: state.samples,
            elapsed,
            rate_per_sec,
        };
        state.started = now;
        state.samples = 0;
        state.last_rate = Some(rate_per_sec);
        Some(summary)
    }

    /// Rate measured by the most recently closed window.
    pub fn last_rate(&self) -> Option<f64> {
        self.state.lock().last_rate
    }

    pub fn reset_at(&self, now: Instant) {
        let mut state = self.state.lock();
        state.started = now;
        state.samples = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_closes_only_after_interval() {
        let start = Instant::now();
        let monitor = ThroughputMonitor::starting_at(Duration::from_secs(10), start);
        for _ in 0..50 {
            monitor.record();
        }
        assert!(monitor.poll_at(start + Duration::from_secs(5)).is_none());
        let summary = monitor.poll_at(start + Duration::from_secs(10)).unwrap();
        assert_eq!(summary.samples, 50);
        assert!((summary.rate_per_sec - 5.0).abs() < 1e-9);
        assert_eq!(monitor.last_rate(), Some(summary.rate_per_sec));
    }

    #[test]
    fn closing_a_window_resets_the_count() {
        let start = Instant::now();
        let monitor = ThroughputMonitor::starting_at(Duration::from_secs(1), start);
        monitor.record();
        monitor.poll_at(start + Duration::from_secs(1)).unwrap();
        let next = monitor.poll_at(start + Duration::from_secs(2)).unwrap();
        assert_eq!(next.samples, 0);
    }
}
