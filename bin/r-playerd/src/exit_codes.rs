//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Process exit codes of the player daemon."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Exit codes let supervisors tell bootstrap failures apart without parsing logs.

use r_player_core::BootstrapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Shut down after a termination signal.
    Normal = 0,
    /// Asset configuration missing or unreadable.
    ConfigFileError = 1,
    /// Replay data file missing or unreadable.
    DataFileError = 2,
    /// Sample log could not be created.
    SinkFileError = 3,
    /// Settings file or CLI overrides rejected.
    InvalidConfiguration = 4,
    Internal = 99,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Pick the code for an error returned by the daemon.
    pub fn classify(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<BootstrapError>() {
            Some(BootstrapError::ConfigFile { .. }) => ExitCode::ConfigFileError,
            Some(BootstrapError::DataFile { .. }) => ExitCode::DataFileError,
            Some(BootstrapError::SinkFile { .. }) => ExitCode::SinkFileError,
            Some(BootstrapError::InvalidConfiguration(_)) => ExitCode::InvalidConfiguration,
            Some(BootstrapError::Driver(_)) | None => ExitCode::Internal,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
