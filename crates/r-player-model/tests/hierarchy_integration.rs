//! ---
//! ems_section: "02-measurement-model"
//! ems_subsection: "tests"
//! ems_type: "source"
//! ems_scope: "test"
//! ems_description: "Integration tests for building the asset hierarchy from files."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::io::Write;

use anyhow::Result;
use r_player_model::{AssetHierarchyBuilder, DataType, ModelError};
use tempfile::NamedTempFile;

#[test]
fn depth_matches_segment_count_for_every_row() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "assetId;assetName;pointId;pointName;quantity;unit;prefix;access")?;
    writeln!(file, "P1;Plant;1;Power;Power;Voltage;Mega;Read")?;
    writeln!(file, "L1;Plant.Line1;1;Current;Current;Ampere;NoPrefix;Read")?;
    writeln!(file, "S1;Plant.Line1.Sensor1;1;Pressure;Force;Newton;Kilo;Read")?;
    writeln!(file, "S2;Plant.Line1.Sensor2;1;Length;Length;Meter;Milli;Write")?;
    writeln!(file, "S3;Plant.Line2.Sensor1;1;Weight;Mass;Gram;NoPrefix;Both")?;
    file.flush()?;

    let registry = AssetHierarchyBuilder::new(".").read_path(file.path())?.build();
    let tree = registry.tree();
    for index in registry.flattened() {
        let asset = tree.get(*index);
        let segments = asset.name().split('.').count();
        assert_eq!(tree.depth(*index), segments, "asset {}", asset.name());
    }
    assert_eq!(tree.roots().len(), 1);
    assert_eq!(tree.len(), 6);
    assert_eq!(registry.points().count(), 5);
    assert_eq!(
        registry.find_point("s3", 1).map(|p| p.full_name().to_owned()),
        Some("Plant.Line2.Sensor1.Weight".to_owned())
    );
    Ok(())
}

#[test]
fn custom_separator_is_honoured() -> Result<()> {
    let input = "h1;h2;h3;h4;h5;h6;h7;h8\nA1;Site/Pump;3;Flow;Length;Meter;NoPrefix;Read;Float\n";
    let mut builder = AssetHierarchyBuilder::new("/");
    builder.read_from(input.as_bytes())?;
    let registry = builder.build();
    let point = registry.find_by_path("Site/Pump/Flow").expect("point by path");
    assert_eq!(point.data_type(), DataType::Float);
    Ok(())
}

#[test]
fn missing_file_is_a_bootstrap_error() {
    let result = AssetHierarchyBuilder::new(".").read_path("does/not/exist.csv".as_ref());
    assert!(matches!(result, Err(ModelError::Io(_))));
}
