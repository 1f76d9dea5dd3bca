//! ---
//! ems_section: "02-measurement-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Asset hierarchy and measurement point model."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Asset hierarchy, measurement points and their samples.
//!
//! Configuration rows are turned into an [`AssetTree`] by the
//! [`AssetHierarchyBuilder`]; the resulting [`MeasurementRegistry`] is created
//! once at startup and shared by the replay driver and the formula scheduler.

pub mod asset;
pub mod errors;
pub mod hierarchy;
pub mod point;
pub mod registry;
pub mod sample;
pub mod state;
pub mod types;
pub mod value;

pub use asset::{Asset, AssetIndex, AssetTree};
pub use errors::{ModelError, Result};
pub use hierarchy::AssetHierarchyBuilder;
pub use point::{
    display_name, Formula, MeasurementPoint, MeasurementPointBuilder, SampleSink,
    SimulationDescriptor, SIMULATION_MARKER,
};
pub use registry::MeasurementRegistry;
pub use sample::{MeasurementSample, Quality};
pub use state::{Admission, Direction, RunState, RunTicket, SharedRunState};
pub use types::{AccessRight, BaseUnitOfMeasure, PhysicalQuantity, UnitPrefix};
pub use value::{DataType, Value};
