//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "tests"
//! ems_type: "source"
//! ems_scope: "test"
//! ems_description: "Integration tests for the file sample logger."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use r_player_common::time::{local_now, local_offset};
use r_player_common::{OverflowPolicy, SinkConfig};
use r_player_model::{AssetHierarchyBuilder, Quality};
use r_player_persistence::{FileSampleLogger, SAMPLE_LOG_HEADER};
use tempfile::tempdir;

#[test]
fn concurrent_producers_are_all_logged() -> Result<()> {
    let dir = tempdir()?;
    let config = SinkConfig {
        enabled: true,
        output_file: dir.path().join("samples.log"),
        drain_poll: Duration::from_millis(10),
        ..SinkConfig::default()
    };
    let mut builder = AssetHierarchyBuilder::new(".");
    builder.add_row(2, &["A1", "Line1", "1", "Current", "Current", "Ampere", "NoPrefix", "Read"])?;
    builder.add_row(3, &["A1", "Line1", "2", "Running", "NoQuantity", "NoUoM", "NoPrefix", "Read"])?;
    let registry = Arc::new(builder.build());
    let logger = Arc::new(FileSampleLogger::open(&config)?);
    registry.attach_sink(logger.clone());

    let producers: Vec<_> = [(1, "1.25"), (2, "1")]
        .into_iter()
        .map(|(id, raw)| {
            let registry = registry.clone();
            thread::spawn(move || {
                let point = registry.find_point("A1", id).expect("configured point");
                for _ in 0..250 {
                    point
                        .set_raw_value(Some(raw), Quality::Good, local_now(), local_offset())
                        .expect("valid value");
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer thread");
    }

    assert_eq!(logger.shutdown()?, 500);
    assert_eq!(logger.dropped(), 0);
    let content = fs::read_to_string(&config.output_file)?;
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some(SAMPLE_LOG_HEADER));
    let body: Vec<_> = lines.collect();
    assert_eq!(body.len(), 500);
    assert_eq!(body.iter().filter(|l| l.ends_with(", Line1.Running, true")).count(), 250);
    assert_eq!(body.iter().filter(|l| l.ends_with(", Line1.Current, 1.25")).count(), 250);
    Ok(())
}

#[test]
fn tiny_queue_drops_instead_of_blocking_producers() -> Result<()> {
    let dir = tempdir()?;
    let config = SinkConfig {
        enabled: true,
        output_file: dir.path().join("samples.log"),
        capacity: 1,
        overflow: OverflowPolicy::DropNewest,
        drain_poll: Duration::from_millis(10),
        ..SinkConfig::default()
    };
    let mut builder = AssetHierarchyBuilder::new(".");
    builder.add_row(2, &["A1", "Line1", "1", "Current", "Current", "Ampere", "NoPrefix", "Read"])?;
    let registry = builder.build();
    let logger = Arc::new(FileSampleLogger::open(&config)?);
    registry.attach_sink(logger.clone());
    let point = registry.find_point("A1", 1).expect("configured point");
    for value in 0..10_000 {
        point.set_raw_value(Some(&value.to_string()), Quality::Good, local_now(), local_offset())?;
    }
    let written = logger.shutdown()?;
    assert_eq!(written + logger.dropped(), 10_000);
    Ok(())
}
