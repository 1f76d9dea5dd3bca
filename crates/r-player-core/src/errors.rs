//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Startup failures of the player runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;

use r_player_model::ModelError;
use r_player_persistence::PersistenceError;

/// Result alias for player bootstrap.
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Reasons the player cannot start.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("unable to read asset configuration {}: {source}", .path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
    #[error("unable to read data file {}: {source}", .path.display())]
    DataFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to open sample log {}: {source}", .path.display())]
    SinkFile {
        path: PathBuf,
        #[source]
        source: PersistenceError,
    },
    #[error("unable to start replay driver: {0}")]
    Driver(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_file() {
        let err = BootstrapError::DataFile {
            path: PathBuf::from("data/missing.csv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "unable to read data file data/missing.csv: not found");
    }
}
