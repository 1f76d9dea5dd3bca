//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Proportional tick period correction for simulated points."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

// Correction factor bounds per monitor window.
const MIN_STEP: f64 = 0.5;
const MAX_STEP: f64 = 1.5;

/// Tick period of one simulated point, nudged towards its target rate.
#[derive(Debug, Clone, PartialEq)]
pub struct RateController {
    target_hz: f64,
    period: Duration,
    gain: f64,
    floor: Duration,
    ceiling: Duration,
}

impl RateController {
    pub fn new(target_hz: u32, gain: f64, max_frequency_hz: u32) -> Self {
        let target_hz = f64::from(target_hz.clamp(1, max_frequency_hz.max(1)));
        let nominal = Duration::from_secs_f64(1.0 / target_hz);
        Self {
            target_hz,
            period: nominal,
            gain,
            floor: Duration::from_secs_f64(1.0 / f64::from(max_frequency_hz.max(1))),
            ceiling: nominal * 2,
        }
    }

    pub fn target_hz(&self) -> f64 {
        self.target_hz
    }

    /// Delay between two ticks.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Scale the period by the ratio of achieved to target rate and return it.
    ///
    /// A point running slow gets a shorter period, one running fast a longer
    /// one. Windows without samples leave the period unchanged.
    pub fn correct(&mut self, achieved_hz: f64) -> Duration {
        if !achieved_hz.is_finite() || achieved_hz <= 0.0 {
            return self.period;
        }
        let error = achieved_hz / self.target_hz - 1.0;
        let step = (1.0 + self.gain * error).clamp(MIN_STEP, MAX_STEP);
        let corrected = self.period.as_secs_f64() * step;
        self.period = Duration::from_secs_f64(corrected).clamp(self.floor, self.ceiling);
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(duration: Duration) -> f64 {
        duration.as_secs_f64() * 1_000.0
    }

    #[test]
    fn nominal_period_matches_frequency() {
        let rate = RateController::new(10, 1.0, 10_000);
        assert_eq!(rate.period(), Duration::from_millis(100));
    }

    #[test]
    fn slow_point_gets_shorter_period() {
        let mut rate = RateController::new(10, 1.0, 10_000);
        let period = rate.correct(8.0);
        assert!((millis(period) - 80.0).abs() < 1e-6);
    }

    #[test]
    fn fast_point_gets_longer_period_with_partial_gain() {
        let mut rate = RateController::new(10, 0.5, 10_000);
        let period = rate.correct(12.0);
        assert!((millis(period) - 110.0).abs() < 1e-6);
    }

    #[test]
    fn period_stays_within_bounds() {
        let mut rate = RateController::new(10, 1.0, 20);
        for _ in 0..10 {
            rate.correct(1.0);
        }
        assert_eq!(rate.period(), Duration::from_millis(50));
        for _ in 0..10 {
            rate.correct(1_000.0);
        }
        assert_eq!(rate.period(), Duration::from_millis(200));
    }

    #[test]
    fn empty_window_leaves_period_alone() {
        let mut rate = RateController::new(4, 1.0, 10_000);
        assert_eq!(rate.correct(0.0), Duration::from_millis(250));
    }
}
