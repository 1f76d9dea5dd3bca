//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Formula-driven measurement simulation."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Formula-driven measurement points.
//!
//! A point whose configured name reads `#name(vars)[hz]:expression` is
//! computed from the wall clock (`t`) and from other points instead of being
//! fed by the replay file. [`prepare_simulation`] parses and validates the
//! declarations once at startup; [`SimulationEngine`] evaluates the survivors
//! at their declared rates.

pub mod errors;
pub mod expression;
pub mod formula;
pub mod graph;
pub mod rate;
pub mod scheduler;

pub use errors::{ExpressionError, FormulaError, Result, SimulationError};
pub use expression::Expression;
pub use formula::{parse_declaration, FormulaDeclaration, TIME_VARIABLE};
pub use graph::{prepare_simulation, variable_path, SimulationSetup};
pub use rate::RateController;
pub use scheduler::{compute_and_store, SimulationEngine};
