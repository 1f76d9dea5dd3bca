//! ---
//! ems_section: "02-measurement-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Error types for the measurement model."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use thiserror::Error;

use crate::value::DataType;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot convert {raw:?} to {data_type}")]
    Conversion { raw: String, data_type: DataType },
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: &'static str, found: usize },
    #[error("invalid {field} {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("empty {0}")]
    EmptyField(&'static str),
    #[error("formula {formula:?} could not be evaluated: {reason}")]
    Evaluation { formula: String, reason: String },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    pub(crate) fn invalid(field: &'static str, value: &str) -> Self {
        ModelError::InvalidField {
            field,
            value: value.to_owned(),
        }
    }
}
