//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Run-state machine driven by remote control commands."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use r_player_logging::{log_system_event, LogContext, SystemEventOutcome};
use r_player_model::{MeasurementRegistry, RunState, SharedRunState};
use r_player_replay::TimeShift;
use r_player_sim::SimulationEngine;
use strum::{Display, EnumString};
use tracing::info;

/// Remote control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Command {
    Play,
    PlayFast,
    Backward,
    BackwardFast,
    Pause,
    Stop,
    #[strum(to_string = "toggle-endless", serialize = "endless")]
    ToggleEndless,
}

impl Command {
    /// Decode the integer command code used by remote clients.
    pub fn from_code(code: i32) -> Option<Command> {
        let command = match code {
            1 => Command::Play,
            2 => Command::PlayFast,
            3 => Command::Backward,
            4 => Command::BackwardFast,
            5 => Command::Pause,
            6 => Command::Stop,
            7 => Command::ToggleEndless,
            _ => return None,
        };
        Some(command)
    }

    pub fn code(self) -> i32 {
        match self {
            Command::Play => 1,
            Command::PlayFast => 2,
            Command::Backward => 3,
            Command::BackwardFast => 4,
            Command::Pause => 5,
            Command::Stop => 6,
            Command::ToggleEndless => 7,
        }
    }
}

/// Reply code for an accepted command.
pub const COMMAND_ACCEPTED: i32 = 1;
/// Reply code for an unknown command code.
pub const COMMAND_REJECTED: i32 = 0;

/// A run state change, published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStateEvent {
    pub from: RunState,
    pub to: RunState,
}

/// Receives every run state change, including the initial announcement.
pub trait RunStateObserver: Send + Sync {
    fn on_run_state(&self, event: &RunStateEvent);
}

/// Owns the playback state and applies the effects of commands.
///
/// Commands are serialized; the replay driver and the simulation scheduler
/// only read the shared state.
pub struct ReplayStateMachine {
    run_state: Arc<SharedRunState>,
    registry: Arc<MeasurementRegistry>,
    time_shift: TimeShift,
    simulation: Option<Arc<SimulationEngine>>,
    endless: AtomicBool,
    pre_paused: Mutex<Option<RunState>>,
    observer: RwLock<Option<Arc<dyn RunStateObserver>>>,
    commands: Mutex<()>,
}

impl std::fmt::Debug for ReplayStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayStateMachine")
            .field("run_state", &self.run_state.load())
            .field("endless", &self.is_endless())
            .field("pre_paused", &*self.pre_paused.lock())
            .finish()
    }
}

impl ReplayStateMachine {
    pub fn new(
        registry: Arc<MeasurementRegistry>,
        run_state: Arc<SharedRunState>,
        time_shift: TimeShift,
        endless: bool,
    ) -> Self {
        Self {
            run_state,
            registry,
            time_shift,
            simulation: None,
            endless: AtomicBool::new(endless),
            pre_paused: Mutex::new(None),
            observer: RwLock::new(None),
            commands: Mutex::new(()),
        }
    }

    /// Start the simulation scheduler when playing and stop it on Stop.
    pub fn with_simulation(mut self, simulation: Arc<SimulationEngine>) -> Self {
        self.simulation = Some(simulation);
        self
    }

    pub fn set_run_state_observer(&self, observer: Arc<dyn RunStateObserver>) {
        *self.observer.write() = Some(observer);
    }

    pub fn run_state(&self) -> RunState {
        self.run_state.load()
    }

    pub fn shared_run_state(&self) -> Arc<SharedRunState> {
        self.run_state.clone()
    }

    pub fn time_shift(&self) -> &TimeShift {
        &self.time_shift
    }

    pub fn is_endless(&self) -> bool {
        self.endless.load(Ordering::Acquire)
    }

    pub fn set_endless(&self, endless: bool) {
        self.endless.store(endless, Ordering::Release);
    }

    /// State stored by Pause, restored by the next Pause.
    pub fn pre_paused_state(&self) -> Option<RunState> {
        *self.pre_paused.lock()
    }

    /// Apply an integer command code; returns [`COMMAND_ACCEPTED`] or [`COMMAND_REJECTED`].
    pub fn remote_control(&self, code: i32) -> i32 {
        match Command::from_code(code) {
            Some(command) => {
                self.apply(command);
                COMMAND_ACCEPTED
            }
            None => {
                log_system_event(
                    None,
                    "remote_control.rejected",
                    &format!("unknown command code {code}"),
                    SystemEventOutcome::Fault,
                );
                COMMAND_REJECTED
            }
        }
    }

    /// Apply `command` and return the resulting state.
    pub fn apply(&self, command: Command) -> RunState {
        let _serialized = self.commands.lock();
        let current = self.run_state.load();
        let next = match command {
            Command::Play if current == RunState::PlayForward => RunState::PlayFastForward,
            Command::Play => RunState::PlayForward,
            Command::PlayFast => RunState::PlayFastForward,
            Command::Backward if current == RunState::PlayBackward => RunState::PlayFastBackward,
            Command::Backward => RunState::PlayBackward,
            Command::BackwardFast => RunState::PlayFastBackward,
            Command::Pause => {
                let mut pre_paused = self.pre_paused.lock();
                if current == RunState::Paused {
                    pre_paused.take().unwrap_or(RunState::Initialized)
                } else {
                    *pre_paused = Some(current);
                    RunState::Paused
                }
            }
            Command::Stop => {
                self.run_state.end_run(|| {
                    self.halt();
                    self.time_shift.clear();
                    self.registry.clear_all();
                });
                RunState::Initialized
            }
            Command::ToggleEndless => {
                let endless = !self.endless.fetch_xor(true, Ordering::AcqRel);
                info!(endless, "endless mode toggled");
                return current;
            }
        };
        if command != Command::Pause {
            self.pre_paused.lock().take();
        }
        self.transition(current, next, &command.to_string());
        next
    }

    /// Leave playback after the replay source ran out or failed to open.
    pub fn finish_run(&self, reason: &str) -> RunState {
        let _serialized = self.commands.lock();
        let current = self.run_state.load();
        self.run_state.end_run(|| self.halt());
        self.pre_paused.lock().take();
        self.transition(current, RunState::Initialized, reason);
        RunState::Initialized
    }

    /// Publish the current state to the observer without changing it.
    pub fn announce(&self) {
        let state = self.run_state.load();
        self.publish(RunStateEvent {
            from: state,
            to: state,
        });
    }

    fn halt(&self) {
        self.run_state.store(RunState::Initialized);
        if let Some(simulation) = &self.simulation {
            simulation.stop();
        }
    }

    fn transition(&self, from: RunState, to: RunState, cause: &str) {
        self.run_state.store(to);
        if to.is_playing() {
            if let Some(simulation) = &self.simulation {
                simulation.start();
            }
        }
        let state = to.to_string();
        let ctx = LogContext::new().with_state(&state);
        log_system_event(
            Some(&ctx),
            "run_state.transition",
            &format!("{cause}: {from} -> {to}"),
            SystemEventOutcome::Success,
        );
        self.publish(RunStateEvent { from, to });
    }

    fn publish(&self, event: RunStateEvent) {
        let observer = self.observer.read().clone();
        if let Some(observer) = observer {
            observer.on_run_state(&event);
        }
    }
}
