//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Replay pipeline for recorded measurement files."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use parking_lot::Mutex;
use r_player_model::RunState;

/// Offset between recorded time and the current run, shared by the replay
/// stream and the state machine that clears it on Stop.
#[derive(Debug, Clone, Default)]
pub struct TimeShift {
    inner: Arc<Mutex<Option<TimeDelta>>>,
}

impl TimeShift {
    /// Create an unset shift.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current shift, if a run has established one.
    pub fn get(&self) -> Option<TimeDelta> {
        *self.inner.lock()
    }

    /// Return the current shift, establishing `now - original` when unset.
    pub fn establish(&self, original: NaiveDateTime, now: NaiveDateTime) -> TimeDelta {
        *self.inner.lock().get_or_insert(now - original)
    }

    /// Forget the shift so the next record establishes a new one.
    pub fn clear(&self) {
        *self.inner.lock() = None;
    }
}

/// Time to wait before a record shifted to `shifted` is due.
///
/// Backward runs mirror the delay and fast runs divide it by `fast_forward_factor`.
pub fn compute_delay(
    shifted: NaiveDateTime,
    now: NaiveDateTime,
    state: RunState,
    fast_forward_factor: u32,
) -> TimeDelta {
    let mut delay = shifted - now;
    if state.is_backward() {
        delay = -delay;
    }
    if state.is_fast() {
        let factor = i32::try_from(fast_forward_factor.max(1)).unwrap_or(i32::MAX);
        delay = delay / factor;
    }
    delay
}
