//! ---
//! ems_section: "15-testing-qa-runbook"
//! ems_subsection: "integration-tests"
//! ems_type: "source"
//! ems_scope: "test"
//! ems_description: "End-to-end playback scenarios across the player stack."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::TimeDelta;
use r_player_common::time::{local_now, local_offset, parse_timestamp};
use r_player_common::AppConfig;
use r_player_core::{Command, Player};
use r_player_model::{AssetHierarchyBuilder, Quality, RunState, SharedRunState, Value};
use r_player_replay::{ChronologicalReplaySource, TimeShift};
use tempfile::TempDir;
use tokio::runtime::Handle;

const HEADER: &str =
    "assetId;assetName;measurementPointId;measurementPointName;physicalQuantity;unitOfMeasure;prefix;accessRight";

fn player_config(dir: &Path, assets: &[&str], data: Option<&[&str]>) -> Result<AppConfig> {
    r_player_logging::init();
    let assets_path = dir.join("assets.csv");
    fs::write(&assets_path, format!("{HEADER}\n{}\n", assets.join("\n")))?;
    let mut config = AppConfig::default();
    config.player.config_file = assets_path;
    if let Some(data) = data {
        let data_path = dir.join("data.csv");
        fs::write(
            &data_path,
            format!("assetId;measurementPointId;timestamp;value\n{}\n", data.join("\n")),
        )?;
        config.player.data_file = Some(data_path);
    }
    config.player.endless = false;
    config.player.idle_poll = Duration::from_millis(10);
    config.player.loop_pause = Duration::from_millis(10);
    Ok(config)
}

async fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[test]
fn sensor_rows_share_one_two_level_branch() -> Result<()> {
    let input = format!(
        "{HEADER}\nA1;Line1.Sensor1;1;Pressure;Force;Newton;NoPrefix;Read\nA1;Line1.Sensor1;2;Temp;Mass;Gram;NoPrefix;Read\n"
    );
    let mut builder = AssetHierarchyBuilder::new(".");
    builder.read_from(input.as_bytes())?;
    let registry = builder.build();
    let tree = registry.tree();

    assert_eq!(tree.len(), 2);
    let line = tree.roots()[0];
    assert_eq!(tree.get(line).name(), "Line1");
    let sensor = tree.get(line).children()[0];
    assert_eq!(tree.get(sensor).short_name(), "Sensor1");
    assert_eq!(tree.depth(sensor), 2);
    let points: Vec<_> = tree
        .get(sensor)
        .measurement_points()
        .iter()
        .map(|point| point.display_name().to_owned())
        .collect();
    assert_eq!(points, vec!["Pressure", "Temp"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_records_are_logged_one_millisecond_apart() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = player_config(
        dir.path(),
        &["A1;Line1.Sensor1;1;Pressure;Force;Newton;NoPrefix;Read"],
        Some(&[
            "A1;1;2024-01-01 00:00:00.000;1,5",
            "A1;1;2024-01-01 00:00:00.000;2,5",
        ]),
    )?;
    config.sink.enabled = true;
    config.sink.output_file = dir.path().join("samples.log");
    config.sink.drain_poll = Duration::from_millis(10);
    let output = config.sink.output_file.clone();

    let player = Player::bootstrap(config, Handle::current())?;
    player.start()?;
    player.machine().apply(Command::Play);
    let machine = player.machine().clone();
    assert!(wait_until(Duration::from_secs(5), || machine.run_state() == RunState::Initialized).await);
    player.shutdown().await;

    let content = fs::read_to_string(output)?;
    let replayed: Vec<_> = content
        .lines()
        .filter(|line| line.ends_with(", 1.5") || line.ends_with(", 2.5"))
        .map(|line| {
            let (timestamp, _) = line.split_once(", ").expect("timestamp column");
            parse_timestamp(timestamp).expect("logged timestamp")
        })
        .collect();
    assert_eq!(replayed.len(), 2);
    assert_eq!(replayed[1] - replayed[0], TimeDelta::milliseconds(1));
    Ok(())
}

#[test]
fn first_record_is_transposed_to_the_open_time() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("data.csv");
    fs::write(
        &path,
        "assetId;measurementPointId;timestamp;value\nA1;1;2019-03-04 05:06:07.890;1\n",
    )?;
    let source = ChronologicalReplaySource::new(&path, TimeShift::new(), 2);
    let opened = local_now();
    let record = source
        .open(r_player_model::Direction::Forward)?
        .next()
        .expect("first record");
    let skew = (record.shifted_timestamp - opened).num_milliseconds().abs();
    assert!(skew < 1_000, "shifted first record is {skew} ms from now");
    Ok(())
}

#[tokio::test]
async fn mutually_dependent_formulas_are_not_simulated() -> Result<()> {
    let dir = TempDir::new()?;
    let config = player_config(
        dir.path(),
        &[
            "A1;Loop;1;#P1(Loop_P2)[5]:Loop_P2 + 1;Power;Voltage;NoPrefix;Read",
            "A1;Loop;2;#P2(Loop_P1)[5]:Loop_P1 * 2;Power;Voltage;NoPrefix;Read",
            "A1;Loop;3;#calc(t)[10]:sin(2*t);Power;Voltage;NoPrefix;Read",
        ],
        None,
    )?;
    let player = Player::bootstrap(config, Handle::current())?;
    let registry = player.registry();
    assert!(!registry.find_point("A1", 1).expect("P1").is_simulated());
    assert!(!registry.find_point("A1", 2).expect("P2").is_simulated());

    let calc = registry.find_point("A1", 3).expect("calc");
    let descriptor = calc.simulation().expect("calc stays simulated");
    assert_eq!(descriptor.free_variables.iter().collect::<Vec<_>>(), vec!["t"]);
    assert_eq!(descriptor.update_frequency_hz, 10);
    assert!(descriptor.dependency_map.is_empty());
    assert_eq!(player.simulation().simulated_points().len(), 1);
    assert_eq!(player.simulation().demoted_points().len(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_restores_type_defaults_from_every_state() -> Result<()> {
    let dir = TempDir::new()?;
    let config = player_config(
        dir.path(),
        &[
            "A1;Line1;1;Current;Current;Ampere;NoPrefix;Read",
            "A1;Line1;2;Running;NoQuantity;NoUoM;NoPrefix;Read",
            "A1;Line1;3;#wave(t)[50]:t + 5;Power;Voltage;NoPrefix;Read",
        ],
        None,
    )?;
    let player = Player::bootstrap(config, Handle::current())?;
    let machine = player.machine().clone();
    let registry = player.registry().clone();
    let wave = registry.find_point("A1", 3).expect("wave").clone();

    let setups: [&[Command]; 6] = [
        &[],
        &[Command::Play],
        &[Command::Play, Command::Play],
        &[Command::Backward],
        &[Command::BackwardFast],
        &[Command::PlayFast, Command::Pause],
    ];
    for setup in setups {
        for command in setup {
            machine.apply(*command);
        }
        registry
            .find_point("A1", 1)
            .expect("current")
            .set_raw_value(Some("3.25"), Quality::Good, local_now(), local_offset())?;
        registry
            .find_point("A1", 2)
            .expect("running")
            .set_raw_value(Some("1"), Quality::Good, local_now(), local_offset())?;
        if machine.run_state().is_playing() {
            let wave = wave.clone();
            assert!(wait_until(Duration::from_secs(2), move || {
                wave.current_sample().value() != &Value::Double(0.0)
            })
            .await);
        }

        assert_eq!(machine.apply(Command::Stop), RunState::Initialized);
        for point in registry.points() {
            assert_eq!(
                point.current_sample().value(),
                &Value::default_for(point.data_type()),
                "{} after {:?}",
                point.full_name(),
                setup
            );
        }
    }
    player.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn second_play_switches_to_fast_forward() -> Result<()> {
    let dir = TempDir::new()?;
    let config = player_config(
        dir.path(),
        &["A1;Line1;1;Current;Current;Ampere;NoPrefix;Read"],
        None,
    )?;
    let player = Player::bootstrap(config, Handle::current())?;
    assert_eq!(player.machine().run_state(), RunState::Initialized);
    assert_eq!(player.remote_control(1), 1);
    assert_eq!(player.machine().run_state(), RunState::PlayForward);
    assert_eq!(player.remote_control(1), 1);
    assert_eq!(player.machine().run_state(), RunState::PlayFastForward);
    assert_eq!(player.remote_control(0), 0);
    player.shutdown().await;
    Ok(())
}

#[test]
fn run_state_cell_starts_initialized() {
    assert_eq!(SharedRunState::default().load(), RunState::Initialized);
}
