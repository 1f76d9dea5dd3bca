//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Replay pipeline for recorded measurement files."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Chronological replay of recorded measurement files.
//!
//! Records are transposed to the current wall clock with a [`TimeShift`]
//! established by the first record of a run, then paced so that their
//! original spacing is preserved (halved in fast modes, mirrored backwards).

#![warn(missing_docs)]

pub mod record;
pub mod shift;
pub mod source;

pub use record::ReplayRecord;
pub use shift::{compute_delay, TimeShift};
pub use source::{ChronologicalReplaySource, Delivery, ReplayStream};

/// Result alias used throughout the replay crate.
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Error type for the replay subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Wrapper for IO errors encountered while reading the data file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A data line does not have the four expected columns.
    #[error("expected 4 columns, found {0}")]
    ColumnCount(usize),
    /// The measurement point column is not an integer.
    #[error("invalid measurement point id {0:?}")]
    InvalidPointId(String),
    /// The timestamp column does not match `yyyy-MM-dd HH:mm:ss.SSS`.
    #[error("invalid timestamp {raw:?}: {source}")]
    InvalidTimestamp {
        /// Text found in the timestamp column.
        raw: String,
        /// Underlying parse failure.
        source: chrono::ParseError,
    },
    /// The first record of the source could not establish the time shift.
    #[error("first record on line {line} has no usable timestamp: {reason}")]
    FirstRecord {
        /// One-based line number of the offending record.
        line: u64,
        /// Parse failure reported for that line.
        reason: Box<ReplayError>,
    },
}
