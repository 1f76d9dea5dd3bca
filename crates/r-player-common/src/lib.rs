//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the player runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Shared primitives for the player workspace.
//! This crate exposes configuration loading, tracing bootstrap, timestamp
//! helpers, and throughput measurement consumed across the workspace.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod time;

pub use config::{
    AppConfig, LoadedAppConfig, LoggingConfig, OverflowPolicy, PlayerConfig, SimulationConfig,
    SinkConfig,
};
pub use logging::{init_tracing, LogFormat, LogRotation};
pub use metrics::{ThroughputMonitor, ThroughputSummary};
