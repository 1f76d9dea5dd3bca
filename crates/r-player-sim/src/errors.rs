//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Error types for formula parsing and simulation."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use r_player_model::ModelError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimulationError>;

/// Problems found while parsing or evaluating an arithmetic expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("unexpected character {ch:?} at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },
    #[error("unexpected {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },
    #[error("expression ends unexpectedly")]
    UnexpectedEnd,
    #[error("undeclared variable {0:?}")]
    UnknownVariable(String),
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("function {function} takes {expected} argument(s), got {found}")]
    ArgumentCount {
        function: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("no value bound for variable {0:?}")]
    UnboundVariable(String),
    #[error("division by zero")]
    DivisionByZero,
}

/// Problems with the `#name(vars)[hz]:expression` declaration itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("name does not start with the simulation marker")]
    MissingMarker,
    #[error("display name before the variable list is empty")]
    EmptyDisplayName,
    #[error("missing parenthesized variable list")]
    MissingVariableList,
    #[error("invalid variable name {0:?}")]
    InvalidVariable(String),
    #[error("missing bracketed update frequency")]
    MissingFrequency,
    #[error("update frequency {0:?} is not a positive integer")]
    InvalidFrequency(String),
    #[error("missing ':' followed by an expression")]
    MissingExpression,
    #[error("expression: {0}")]
    Expression(#[from] ExpressionError),
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Formula(#[from] FormulaError),
    #[error("variable {variable:?} does not name a measurement point (looked for {path:?})")]
    UnresolvedVariable { variable: String, path: String },
    #[error("part of a dependency cycle: {0}")]
    Cycle(String),
    #[error("dependency {0:?} is no longer available")]
    DependencyGone(String),
    #[error("dependency {0:?} has no numeric value")]
    NonNumericDependency(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}
