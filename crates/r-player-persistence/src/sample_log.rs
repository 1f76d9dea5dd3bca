//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "File sink writing every stored sample as a text line."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use r_player_common::time::format_timestamp;
use r_player_common::SinkConfig;
use r_player_model::{MeasurementPoint, MeasurementSample, SampleSink};
use tracing::{debug, info, warn};

use crate::queue::{PushOutcome, SampleQueue};
use crate::{PersistenceError, Result};

/// First line of every sample log.
pub const SAMPLE_LOG_HEADER: &str = "Timestamp, Tag, Value";

const QUEUE_REPORT_EVERY: u64 = 100;
const POP_TIMEOUT: Duration = Duration::from_millis(100);

/// One line of the sample log.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    /// Sample timestamp.
    pub timestamp: NaiveDateTime,
    /// Full hierarchical name of the point.
    pub tag: String,
    /// Rendered value.
    pub value: String,
}

impl SampleRecord {
    /// Capture `sample` as stored on `point`.
    pub fn capture(point: &MeasurementPoint, sample: &MeasurementSample) -> Self {
        Self {
            timestamp: sample.timestamp(),
            tag: point.full_name().to_owned(),
            value: sample.value().to_string(),
        }
    }

    /// `<timestamp>, <tag>, <value>`
    pub fn to_line(&self) -> String {
        format!("{}, {}, {}", format_timestamp(&self.timestamp), self.tag, self.value)
    }
}

/// [`SampleSink`] that queues samples for a consumer thread appending them to a file.
pub struct FileSampleLogger {
    path: PathBuf,
    queue: Arc<SampleQueue<SampleRecord>>,
    worker: Mutex<Option<JoinHandle<Result<u64>>>>,
    drain_timeout: Duration,
    drain_poll: Duration,
}

impl std::fmt::Debug for FileSampleLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSampleLogger")
            .field("path", &self.path)
            .field("queued", &self.queue.len())
            .field("dropped", &self.queue.dropped())
            .finish()
    }
}

impl FileSampleLogger {
    /// Create the output file, write the header and start the consumer thread.
    pub fn open(config: &SinkConfig) -> Result<Self> {
        let path = config.output_file.clone();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{SAMPLE_LOG_HEADER}")?;
        writer.flush()?;

        let queue = Arc::new(SampleQueue::new(config.capacity, config.overflow));
        let worker = {
            let queue = queue.clone();
            thread::Builder::new()
                .name("sample-log".into())
                .spawn(move || write_samples(writer, &queue))
                .map_err(|err| PersistenceError::Worker(err.to_string()))?
        };
        info!(
            path = %path.display(),
            capacity = config.capacity,
            overflow = ?config.overflow,
            "sample log opened"
        );
        Ok(Self {
            path,
            queue,
            worker: Mutex::new(Some(worker)),
            drain_timeout: config.drain_timeout,
            drain_poll: config.drain_poll,
        })
    }

    /// Output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples waiting to be written.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Samples lost to the overflow policy.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// Wait up to the drain timeout for the queue to empty, then close the
    /// file. Returns the number of lines written after the header.
    pub fn shutdown(&self) -> Result<u64> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(0);
        };
        let deadline = Instant::now() + self.drain_timeout;
        while !self.queue.is_empty() && Instant::now() < deadline {
            debug!(queued = self.queue.len(), "waiting for sample log to drain");
            thread::sleep(self.drain_poll);
        }
        let abandoned = self.queue.len();
        if abandoned > 0 {
            warn!(abandoned, "sample log drain timed out");
        }
        self.queue.close();
        let written = worker
            .join()
            .map_err(|_| PersistenceError::Worker("writer thread panicked".into()))??;
        info!(
            path = %self.path.display(),
            written,
            dropped = self.queue.dropped(),
            "sample log closed"
        );
        Ok(written)
    }
}

impl SampleSink for FileSampleLogger {
    fn on_sample(&self, point: &MeasurementPoint, sample: &MeasurementSample) {
        match self.queue.push(SampleRecord::capture(point, sample)) {
            PushOutcome::Queued | PushOutcome::Closed => {}
            PushOutcome::DroppedOldest | PushOutcome::DroppedNewest => {
                let dropped = self.queue.dropped();
                if dropped == 1 || dropped % 1_000 == 0 {
                    warn!(dropped, capacity = self.queue.capacity(), "sample queue full, samples dropped");
                }
            }
        }
    }
}

impl Drop for FileSampleLogger {
    fn drop(&mut self) {
        self.queue.close();
    }
}

fn write_samples(mut writer: BufWriter<File>, queue: &SampleQueue<SampleRecord>) -> Result<u64> {
    let mut written = 0u64;
    loop {
        match queue.pop_timeout(POP_TIMEOUT) {
            Some(record) => {
                writeln!(writer, "{}", record.to_line())?;
                written += 1;
                if written % QUEUE_REPORT_EVERY == 0 {
                    debug!(written, queued = queue.len(), "sample log progress");
                }
            }
            None if queue.is_closed() && queue.is_empty() => break,
            None => writer.flush()?,
        }
    }
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_player_common::time::{local_offset, parse_timestamp};
    use r_player_model::{BaseUnitOfMeasure, PhysicalQuantity, Quality, UnitPrefix};

    fn point() -> MeasurementPoint {
        MeasurementPoint::builder(1, "Pressure")
            .asset_path("Line1.Sensor1", ".")
            .physical_quantity(PhysicalQuantity::Force)
            .base_unit(BaseUnitOfMeasure::Newton)
            .unit_prefix(UnitPrefix::NoPrefix)
            .build()
            .unwrap()
    }

    #[test]
    fn record_line_format() {
        let point = point();
        let ts = parse_timestamp("2024-01-01 00:00:00.000").unwrap();
        point
            .set_raw_value(Some("1.5"), Quality::Good, ts, local_offset())
            .unwrap();
        let record = SampleRecord::capture(&point, &point.current_sample());
        assert_eq!(record.to_line(), "2024-01-01 00:00:00.000, Line1.Sensor1.Pressure, 1.5");
    }

    #[test]
    fn logger_writes_header_and_samples() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = SinkConfig {
            enabled: true,
            output_file: dir.path().join("out").join("samples.log"),
            drain_poll: Duration::from_millis(10),
            ..SinkConfig::default()
        };
        let logger = Arc::new(FileSampleLogger::open(&config)?);
        let point = point();
        point.attach_sink(logger.clone());
        let ts = parse_timestamp("2024-01-01 00:00:00.000")?;
        for raw in ["1", "2", "3"] {
            point.set_raw_value(Some(raw), Quality::Good, ts, local_offset())?;
        }
        assert_eq!(logger.shutdown()?, 3);
        let content = fs::read_to_string(&config.output_file)?;
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], SAMPLE_LOG_HEADER);
        assert_eq!(lines[3], "2024-01-01 00:00:00.000, Line1.Sensor1.Pressure, 3.0");
        assert_eq!(lines.len(), 4);
        Ok(())
    }
}
