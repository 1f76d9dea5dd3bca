//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the player runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{FixedOffset, Local, NaiveDateTime, TimeDelta, Timelike};

/// Timestamp layout used by replay data files and the sample log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// Parsing accepts any number of fractional digits, including none.
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse a `yyyy-MM-dd HH:mm:ss.SSS` timestamp.
pub fn parse_timestamp(raw: &str) -> chrono::ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_PARSE_FORMAT)
}

/// Render a timestamp with millisecond precision.
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Wall-clock time in the local zone, without offset.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Offset of the local zone right now.
pub fn local_offset() -> FixedOffset {
    *Local::now().offset()
}

/// Fractional-second part of a timestamp, in `[0, 1)`.
pub fn fractional_second(timestamp: &NaiveDateTime) -> f64 {
    // leap seconds report nanoseconds above one billion
    f64::from(timestamp.nanosecond().min(999_999_999)) / 1_000_000_000.0
}

/// Convert a signed delay into a sleepable duration; `None` when already due.
pub fn positive_duration(delta: TimeDelta) -> Option<Duration> {
    if delta <= TimeDelta::zero() {
        return None;
    }
    delta.to_std().ok()
}
