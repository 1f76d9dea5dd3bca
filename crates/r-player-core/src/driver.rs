//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Replay driver thread following the run state."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use r_player_logging::{log_system_event, LogContext, SystemEventOutcome};
use r_player_model::{Direction, MeasurementRegistry, RunState, RunTicket};
use r_player_replay::{ChronologicalReplaySource, Delivery, ReplayStream};
use tracing::{debug, info};

use crate::state_machine::ReplayStateMachine;

/// How a pass over the data file ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassEnd {
    Exhausted,
    Stopped,
    DirectionChanged,
    Shutdown,
}

/// Timing knobs of the driver loop.
#[derive(Debug, Clone, Copy)]
pub struct DriverTiming {
    /// Sleep between checks while idle or paused.
    pub idle_poll: Duration,
    /// Pause between passes in endless mode.
    pub loop_pause: Duration,
}

/// Handle to the running replay driver thread.
#[derive(Debug)]
pub struct DriverHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DriverHandle {
    /// Ask the driver to exit at its next check.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Stop the driver and wait for the thread to end.
    pub fn join(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                debug!("replay driver thread panicked");
            }
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the driver loop on its own thread.
///
/// Without a `source` the driver only announces the initial state and idles;
/// formulas still run when playback is commanded.
pub fn spawn_driver(
    machine: Arc<ReplayStateMachine>,
    registry: Arc<MeasurementRegistry>,
    source: Option<ChronologicalReplaySource>,
    timing: DriverTiming,
) -> std::io::Result<DriverHandle> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let thread = {
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("replay-driver".into())
            .spawn(move || {
                let driver = ReplayDriver {
                    machine,
                    registry,
                    source,
                    timing,
                    shutdown,
                };
                driver.run();
            })?
    };
    Ok(DriverHandle {
        shutdown,
        thread: Some(thread),
    })
}

struct ReplayDriver {
    machine: Arc<ReplayStateMachine>,
    registry: Arc<MeasurementRegistry>,
    source: Option<ChronologicalReplaySource>,
    timing: DriverTiming,
    shutdown: Arc<AtomicBool>,
}

impl ReplayDriver {
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn run(&self) {
        self.machine.announce();
        info!("replay driver started");
        while !self.is_shutdown() {
            let state = self.machine.run_state();
            let Some(source) = self.source.as_ref().filter(|_| state != RunState::Initialized) else {
                thread::sleep(self.timing.idle_poll);
                continue;
            };
            let Some(direction) = self.playback_direction(state) else {
                thread::sleep(self.timing.idle_poll);
                continue;
            };
            let ticket = self.machine.shared_run_state().ticket(direction);
            let stream = match source.open(direction) {
                Ok(stream) => stream,
                Err(err) => {
                    let path = source.path().display().to_string();
                    let ctx = LogContext::new().with_source(&path);
                    log_system_event(
                        Some(&ctx),
                        "replay.open",
                        &format!("replay source failed to open: {err}"),
                        SystemEventOutcome::Fault,
                    );
                    self.machine.finish_run("replay source unavailable");
                    continue;
                }
            };
            match self.play_stream(source, stream, &ticket) {
                PassEnd::Exhausted if !self.machine.shared_run_state().is_current(&ticket) => {
                    debug!("run reset while the pass ended");
                }
                PassEnd::Exhausted => {
                    self.registry.clear_all();
                    source.time_shift().clear();
                    if self.machine.is_endless() {
                        debug!("replay source exhausted, restarting");
                        thread::sleep(self.timing.loop_pause);
                    } else {
                        self.machine.finish_run("replay source exhausted");
                    }
                }
                PassEnd::DirectionChanged => {
                    source.time_shift().clear();
                }
                PassEnd::Stopped => {}
                PassEnd::Shutdown => break,
            }
        }
        info!("replay driver finished");
    }

    /// Direction to stream in, following the state that was active before a pause.
    fn playback_direction(&self, state: RunState) -> Option<Direction> {
        match state {
            RunState::Initialized => None,
            RunState::Paused => self
                .machine
                .pre_paused_state()
                .filter(|previous| previous.is_playing())
                .map(RunState::direction),
            playing => Some(playing.direction()),
        }
    }

    fn play_stream(
        &self,
        source: &ChronologicalReplaySource,
        mut stream: ReplayStream,
        ticket: &RunTicket,
    ) -> PassEnd {
        let direction = ticket.direction();
        let run_state = self.machine.shared_run_state();
        let mut delivered = 0u64;
        loop {
            if let Some(end) = self.wait_while_paused(direction) {
                return end;
            }
            let Some(record) = stream.next_record() else {
                if stream.is_interrupted() {
                    return self.cancelled_pass(direction);
                }
                debug!(delivered, "replay pass complete");
                return PassEnd::Exhausted;
            };
            loop {
                match source.deliver_live(&record, &self.registry, &run_state, ticket) {
                    Delivery::Applied => delivered += 1,
                    Delivery::Held => {
                        if let Some(end) = self.wait_while_paused(direction) {
                            return end;
                        }
                        continue;
                    }
                    Delivery::Cancelled => return self.cancelled_pass(direction),
                    Delivery::UnknownPoint | Delivery::Simulated | Delivery::Rejected => {}
                }
                break;
            }
        }
    }

    /// Why a pass whose record was cancelled must end.
    fn cancelled_pass(&self, direction: Direction) -> PassEnd {
        if self.is_shutdown() {
            return PassEnd::Shutdown;
        }
        match self.machine.run_state() {
            playing if playing.is_playing() && playing.direction() != direction => {
                PassEnd::DirectionChanged
            }
            _ => PassEnd::Stopped,
        }
    }

    /// Block while paused. Returns why the pass must end, if it must.
    fn wait_while_paused(&self, direction: Direction) -> Option<PassEnd> {
        loop {
            if self.is_shutdown() {
                return Some(PassEnd::Shutdown);
            }
            let state = self.machine.run_state();
            match state {
                RunState::Initialized => return Some(PassEnd::Stopped),
                RunState::Paused => thread::sleep(self.timing.idle_poll),
                playing if playing.direction() != direction => {
                    return Some(PassEnd::DirectionChanged)
                }
                _ => return None,
            }
        }
    }
}
