//! ---
//! ems_section: "15-testing-qa-runbook"
//! ems_subsection: "integration-tests"
//! ems_type: "source"
//! ems_scope: "test"
//! ems_description: "Validation of the configuration files shipped under configs/."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use r_player_common::AppConfig;
use r_player_model::AssetHierarchyBuilder;
use r_player_replay::ReplayRecord;

fn repo_path(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join(path)
}

fn read(path: &str) -> String {
    let full = repo_path(path);
    fs::read_to_string(&full)
        .unwrap_or_else(|err| panic!("failed to read {}: {}", full.display(), err))
}

#[test]
fn player_settings_parse_and_point_at_shipped_files() {
    let config: AppConfig = read("configs/player.toml")
        .parse()
        .expect("configs/player.toml is valid");
    assert_eq!(config.player.config_file, PathBuf::from("configs/assets.csv"));
    assert_eq!(config.player.data_file, Some(PathBuf::from("configs/data.csv")));
    assert!(config.player.endless);
}

#[test]
fn shipped_assets_build_without_dropped_rows() {
    let mut builder = AssetHierarchyBuilder::new(".");
    builder
        .read_from(read("configs/assets.csv").as_bytes())
        .expect("assets readable");
    assert_eq!(builder.dropped_rows(), 0);
    let registry = builder.build();
    assert_eq!(registry.points().count(), 6);
    assert_eq!(registry.formula_points().count(), 2);
    assert!(registry.find_by_path("Line1.Feeder.power").is_some());
}

#[test]
fn shipped_data_is_sorted_and_addresses_configured_points() {
    let mut builder = AssetHierarchyBuilder::new(".");
    builder
        .read_from(read("configs/assets.csv").as_bytes())
        .expect("assets readable");
    let registry = builder.build();

    let data = read("configs/data.csv");
    let records: Vec<_> = data
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| ReplayRecord::parse(line).unwrap_or_else(|err| panic!("{line}: {err}")))
        .collect();
    assert!(!records.is_empty());
    for pair in records.windows(2) {
        assert!(pair[0].original_timestamp <= pair[1].original_timestamp);
    }
    for record in &records {
        let point = registry
            .find_point(&record.asset_id, record.point_id)
            .unwrap_or_else(|| panic!("no point {}/{}", record.asset_id, record.point_id));
        assert!(!point.declares_formula());
    }
}
