//! ---
//! ems_section: "02-measurement-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Process-wide playback run state."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use parking_lot::Mutex;
use strum::{Display, EnumString};

/// Playback state shared by the replay driver and the simulation scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[repr(u8)]
pub enum RunState {
    #[default]
    Initialized = 0,
    PlayForward = 1,
    PlayFastForward = 2,
    PlayBackward = 3,
    PlayFastBackward = 4,
    Paused = 5,
}

/// Order in which the replay source is streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Direction {
    Forward,
    Backward,
}

impl RunState {
    pub fn is_playing(self) -> bool {
        matches!(
            self,
            RunState::PlayForward
                | RunState::PlayFastForward
                | RunState::PlayBackward
                | RunState::PlayFastBackward
        )
    }

    pub fn is_backward(self) -> bool {
        matches!(self, RunState::PlayBackward | RunState::PlayFastBackward)
    }

    pub fn is_fast(self) -> bool {
        matches!(self, RunState::PlayFastForward | RunState::PlayFastBackward)
    }

    pub fn direction(self) -> Direction {
        if self.is_backward() {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }

    fn from_u8(raw: u8) -> RunState {
        match raw {
            1 => RunState::PlayForward,
            2 => RunState::PlayFastForward,
            3 => RunState::PlayBackward,
            4 => RunState::PlayFastBackward,
            5 => RunState::Paused,
            _ => RunState::Initialized,
        }
    }
}

/// Run a replay pass was opened for.
///
/// Taken just before the source is opened; every record of the pass is
/// checked against it before being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    epoch: u64,
    direction: Direction,
}

impl RunTicket {
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Answer of [`SharedRunState::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission<R> {
    /// The ticket is still current; carries the result of the apply closure.
    Admitted(R),
    /// Playback is paused; try again once it resumes.
    Paused,
    /// The run was stopped or changed direction since the ticket was taken.
    Revoked,
}

/// Cell holding the current [`RunState`] and the epoch of the current run.
///
/// The state is read lock-free once per loop iteration. Ending a run bumps
/// the epoch under the same gate that replayed records are applied under,
/// so no record of an ended run lands after its reset.
#[derive(Debug, Default)]
pub struct SharedRunState {
    raw: AtomicU8,
    epoch: AtomicU64,
    gate: Mutex<()>,
}

impl SharedRunState {
    pub fn new(initial: RunState) -> Self {
        Self {
            raw: AtomicU8::new(initial as u8),
            ..Self::default()
        }
    }

    pub fn load(&self) -> RunState {
        RunState::from_u8(self.raw.load(Ordering::Acquire))
    }

    pub fn store(&self, state: RunState) {
        self.raw.store(state as u8, Ordering::Release);
    }

    /// Store `state` and return the previous one.
    pub fn swap(&self, state: RunState) -> RunState {
        RunState::from_u8(self.raw.swap(state as u8, Ordering::AcqRel))
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Ticket for a pass streamed in `direction` during the current run.
    pub fn ticket(&self, direction: Direction) -> RunTicket {
        RunTicket {
            epoch: self.epoch(),
            direction,
        }
    }

    /// Whether a pass holding `ticket` may keep waiting for its next record.
    pub fn is_current(&self, ticket: &RunTicket) -> bool {
        if self.epoch() != ticket.epoch {
            return false;
        }
        match self.load() {
            RunState::Paused => true,
            state => state.is_playing() && state.direction() == ticket.direction,
        }
    }

    /// Run `apply` under the gate if `ticket` is current and playback is running.
    pub fn admit<R>(&self, ticket: &RunTicket, apply: impl FnOnce() -> R) -> Admission<R> {
        let _gate = self.gate.lock();
        if !self.is_current(ticket) {
            return Admission::Revoked;
        }
        if self.load() == RunState::Paused {
            return Admission::Paused;
        }
        Admission::Admitted(apply())
    }

    /// End the current run: revoke every ticket and run `reset` under the gate.
    pub fn end_run<R>(&self, reset: impl FnOnce() -> R) -> R {
        let _gate = self.gate.lock();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        reset()
    }
}
