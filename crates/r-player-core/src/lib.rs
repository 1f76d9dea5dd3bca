//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Run-state machine, replay driver and player lifecycle."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Playback control for the measurement player.
//!
//! [`ReplayStateMachine`] owns the run state and applies remote control
//! commands, the replay driver thread follows that state through the data
//! file, and [`Player`] wires both to the registry, simulation and sink.

pub mod driver;
pub mod errors;
pub mod player;
pub mod state_machine;

pub use driver::{spawn_driver, DriverHandle, DriverTiming};
pub use errors::{BootstrapError, Result};
pub use player::Player;
pub use state_machine::{
    Command, ReplayStateMachine, RunStateEvent, RunStateObserver, COMMAND_ACCEPTED,
    COMMAND_REJECTED,
};
