//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Sample queueing and flat-file sample logging."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Output side of the player: a bounded queue between sample producers and a
//! consumer thread writing the `Timestamp, Tag, Value` sample log.

/// Result alias used throughout the persistence crate.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Error type for the persistence subsystem.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Wrapper for IO errors encountered while writing the sample log.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The consumer thread could not be started or ended by panicking.
    #[error("sample log writer thread failed: {0}")]
    Worker(String),
}

pub mod queue;
pub mod sample_log;

pub use queue::{PushOutcome, SampleQueue};
pub use sample_log::{FileSampleLogger, SampleRecord, SAMPLE_LOG_HEADER};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_error_display() {
        let err = PersistenceError::Worker("panicked".into());
        assert_eq!(format!("{err}"), "sample log writer thread failed: panicked");
    }
}
