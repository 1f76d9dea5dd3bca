//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Replay pipeline for recorded measurement files."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{NaiveDateTime, TimeDelta};
use r_player_common::time::{local_now, local_offset, positive_duration};
use r_player_logging::{player_debug, player_error, player_warn, LogContext};
use r_player_model::{
    Admission, Direction, MeasurementPoint, MeasurementRegistry, Quality, RunState, RunTicket,
    SharedRunState,
};
use tracing::debug;

use crate::record::{descending_by_timestamp, ReplayRecord};
use crate::shift::{compute_delay, TimeShift};
use crate::{ReplayError, Result};

type NumberedLines = Box<dyn Iterator<Item = io::Result<(u64, String)>> + Send>;

// Longest uninterrupted sleep while a live record waits to become due.
const WAIT_SLICE: Duration = Duration::from_millis(20);

/// Outcome of handing one record to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The point received a new sample.
    Applied,
    /// No point matches the record's asset and point ids.
    UnknownPoint,
    /// The point is fed by its formula and ignores recorded values.
    Simulated,
    /// The value could not be converted to the point's data type.
    Rejected,
    /// Playback was paused when the record became due; deliver it again on resume.
    Held,
    /// The run was stopped or changed direction before the record was applied.
    Cancelled,
}

/// Replays a `assetId;measurementPointId;timestamp;value` file against the registry.
#[derive(Debug, Clone)]
pub struct ChronologicalReplaySource {
    path: PathBuf,
    source_name: String,
    time_shift: TimeShift,
    fast_forward_factor: u32,
}

impl ChronologicalReplaySource {
    /// Create a source reading `path`; `time_shift` is shared with whoever clears it on Stop.
    pub fn new(path: impl Into<PathBuf>, time_shift: TimeShift, fast_forward_factor: u32) -> Self {
        let path = path.into();
        Self {
            source_name: path.display().to_string(),
            path,
            time_shift,
            fast_forward_factor: fast_forward_factor.max(1),
        }
    }

    /// Data file being replayed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shift applied to the records of the current run.
    pub fn time_shift(&self) -> &TimeShift {
        &self.time_shift
    }

    /// Open a stream in `direction`.
    ///
    /// Forward streams read lazily in file order. Backward streams read the whole
    /// file and order the data lines newest first. The first record is read
    /// eagerly to establish the time shift; if its timestamp cannot be parsed
    /// the open fails.
    pub fn open(&self, direction: Direction) -> Result<ReplayStream> {
        let lines: NumberedLines = match direction {
            Direction::Forward => {
                let file = File::open(&self.path)?;
                Box::new(
                    BufReader::new(file)
                        .lines()
                        .enumerate()
                        .map(|(index, line)| line.map(|text| (index as u64 + 1, text))),
                )
            }
            Direction::Backward => {
                let contents = fs::read_to_string(&self.path)?;
                let mut lines: Vec<(u64, String)> = contents
                    .lines()
                    .enumerate()
                    .map(|(index, text)| (index as u64 + 1, text.to_owned()))
                    .collect();
                let header = if lines.is_empty() {
                    None
                } else {
                    Some(lines.remove(0))
                };
                lines.sort_by(|(_, left), (_, right)| descending_by_timestamp(left, right));
                if let Some(header) = header {
                    lines.insert(0, header);
                }
                Box::new(lines.into_iter().map(Ok))
            }
        };
        let mut stream = ReplayStream {
            lines,
            source: self.source_name.clone(),
            time_shift: self.time_shift.clone(),
            shift: None,
            pending: None,
            previous: None,
            interrupted: false,
        };
        stream.skip_header();
        stream.prime()?;
        debug!(source = %self.source_name, direction = %direction, shift = ?self.time_shift.get(), "replay source opened");
        Ok(stream)
    }

    /// Wait until `record` is due under `state`, then store it on its point.
    ///
    /// The wait blocks the calling thread.
    pub fn deliver(
        &self,
        record: &ReplayRecord,
        registry: &MeasurementRegistry,
        state: RunState,
    ) -> Delivery {
        let point_label = record.point_id.to_string();
        let ctx = record_context(&self.source_name, record, &point_label);
        let point = match self.target(record, registry, &ctx) {
            Ok(point) => point,
            Err(skipped) => return skipped,
        };
        if let Some(wait) = self.delay(record, state) {
            std::thread::sleep(wait);
        }
        apply(point, record, &ctx)
    }

    /// Deliver under the live run state for the pass holding `ticket`.
    ///
    /// The wait ends early once the ticket is revoked. The record is applied
    /// under the run state's gate, so a Stop either sees it applied before
    /// resetting the points or revokes it.
    pub fn deliver_live(
        &self,
        record: &ReplayRecord,
        registry: &MeasurementRegistry,
        run_state: &SharedRunState,
        ticket: &RunTicket,
    ) -> Delivery {
        let point_label = record.point_id.to_string();
        let ctx = record_context(&self.source_name, record, &point_label);
        let point = match self.target(record, registry, &ctx) {
            Ok(point) => point,
            Err(skipped) => return skipped,
        };
        if let Some(wait) = self.delay(record, run_state.load()) {
            let deadline = Instant::now() + wait;
            loop {
                if !run_state.is_current(ticket) {
                    return Delivery::Cancelled;
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                std::thread::sleep((deadline - now).min(WAIT_SLICE));
            }
        }
        match run_state.admit(ticket, || apply(point, record, &ctx)) {
            Admission::Admitted(delivery) => delivery,
            Admission::Paused => Delivery::Held,
            Admission::Revoked => Delivery::Cancelled,
        }
    }

    fn target<'r>(
        &self,
        record: &ReplayRecord,
        registry: &'r MeasurementRegistry,
        ctx: &LogContext<'_>,
    ) -> std::result::Result<&'r MeasurementPoint, Delivery> {
        let Some(point) = registry.find_point(&record.asset_id, record.point_id) else {
            player_warn!(context = *ctx, "no measurement point for replay record");
            return Err(Delivery::UnknownPoint);
        };
        if point.is_simulated() {
            player_debug!(context = *ctx, "replay record ignored for simulated point");
            return Err(Delivery::Simulated);
        }
        Ok(&**point)
    }

    fn delay(&self, record: &ReplayRecord, state: RunState) -> Option<Duration> {
        positive_duration(compute_delay(
            record.shifted_timestamp,
            local_now(),
            state,
            self.fast_forward_factor,
        ))
    }
}

fn record_context<'a>(source: &'a str, record: &'a ReplayRecord, point: &'a str) -> LogContext<'a> {
    LogContext::new()
        .with_source(source)
        .with_line(record.line)
        .with_asset(&record.asset_id)
        .with_point(point)
}

fn apply(point: &MeasurementPoint, record: &ReplayRecord, ctx: &LogContext<'_>) -> Delivery {
    match point.set_raw_value(
        Some(&record.value),
        Quality::Good,
        record.shifted_timestamp,
        local_offset(),
    ) {
        Ok(()) => Delivery::Applied,
        Err(err) => {
            player_warn!(context = *ctx, "replay value rejected: {}", err);
            Delivery::Rejected
        }
    }
}

#[derive(Debug, Clone)]
struct Delivered {
    record: ReplayRecord,
    shifted: NaiveDateTime,
}

/// Ordered, time-shifted records of one pass over the data file.
pub struct ReplayStream {
    lines: NumberedLines,
    source: String,
    time_shift: TimeShift,
    shift: Option<TimeDelta>,
    pending: Option<ReplayRecord>,
    previous: Option<Delivered>,
    interrupted: bool,
}

impl ReplayStream {
    fn skip_header(&mut self) {
        if let Some(Err(err)) = self.lines.next() {
            let ctx = LogContext::new().with_source(&self.source).with_line(1);
            player_error!(context = ctx, "unable to read replay header: {}", err);
        }
    }

    fn prime(&mut self) -> Result<()> {
        while let Some(item) = self.lines.next() {
            let (line, text) = item?;
            if text.trim().is_empty() {
                continue;
            }
            match ReplayRecord::parse(&text) {
                Ok(mut record) => {
                    record.line = line;
                    self.shift = Some(
                        self.time_shift
                            .establish(record.original_timestamp, local_now()),
                    );
                    self.pending = Some(record);
                    return Ok(());
                }
                Err(err @ ReplayError::InvalidTimestamp { .. }) => {
                    return Err(ReplayError::FirstRecord {
                        line,
                        reason: Box::new(err),
                    });
                }
                Err(err) => {
                    let ctx = LogContext::new().with_source(&self.source).with_line(line);
                    player_warn!(context = ctx, "replay record dropped: {}", err);
                }
            }
        }
        Ok(())
    }

    fn read_record(&mut self) -> Option<ReplayRecord> {
        loop {
            let (line, text) = match self.lines.next()? {
                Ok(item) => item,
                Err(err) => {
                    let ctx = LogContext::new().with_source(&self.source);
                    player_error!(context = ctx, "replay source read failed: {}", err);
                    return None;
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            match ReplayRecord::parse(&text) {
                Ok(mut record) => {
                    record.line = line;
                    return Some(record);
                }
                Err(err) => {
                    let ctx = LogContext::new().with_source(&self.source).with_line(line);
                    player_warn!(context = ctx, "replay record dropped: {}", err);
                }
            }
        }
    }

    /// Next record with its shifted timestamp, or `None` at end of stream.
    ///
    /// A record repeating the previous record's asset, point and shifted
    /// timestamp is moved one millisecond past the previous delivery. Once the
    /// shared shift is cleared or replaced the stream ends early and
    /// [`is_interrupted`](Self::is_interrupted) reports it.
    pub fn next_record(&mut self) -> Option<ReplayRecord> {
        if self.interrupted {
            return None;
        }
        let shift = self.shift?;
        if self.time_shift.get() != Some(shift) {
            debug!(source = %self.source, "time shift reset, ending replay pass");
            self.interrupted = true;
            return None;
        }
        let mut record = match self.pending.take() {
            Some(record) => record,
            None => self.read_record()?,
        };
        record.apply_shift(shift);
        let as_read = record.clone();
        if let Some(previous) = &self.previous {
            if previous.record.same_key(&record) {
                record.shifted_timestamp = previous.shifted + TimeDelta::milliseconds(1);
            }
        }
        self.previous = Some(Delivered {
            record: as_read,
            shifted: record.shifted_timestamp,
        });
        Some(record)
    }

    /// Whether the pass ended because its run was reset rather than at end of file.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }
}

impl Iterator for ReplayStream {
    type Item = ReplayRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}
