//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "tests"
//! ems_type: "source"
//! ems_scope: "test"
//! ems_description: "Integration tests for formula preparation and scheduling."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use r_player_common::SimulationConfig;
use r_player_model::{AssetHierarchyBuilder, MeasurementRegistry, RunState, SharedRunState};
use r_player_sim::{prepare_simulation, SimulationEngine, SimulationError};
use tokio::runtime::Handle;

const CONFIG: &str = "\
assetId;assetName;measurementPointId;measurementPointName;physicalQuantity;unitOfMeasure;prefix;accessRight
A1;Plant.Feeder;1;Current;Current;Ampere;NoPrefix;Read
A1;Plant.Feeder;2;#calc(t)[10]:sin(2*t);Power;Voltage;NoPrefix;Read
A1;Plant.Feeder;3;#power(Plant_Feeder_Current)[20]:230 * Plant_Feeder_Current;Power;Voltage;Kilo;Read
A2;Plant.Loop;1;#P1(Plant_Loop_P2)[5]:Plant_Loop_P2 + 1;Power;Voltage;NoPrefix;Read
A2;Plant.Loop;2;#P2(Plant_Loop_P1)[5]:Plant_Loop_P1 - 1;Power;Voltage;NoPrefix;Read
A2;Plant.Loop;3;#broken(t)[often]:t;Power;Voltage;NoPrefix;Read
";

fn registry() -> Result<MeasurementRegistry> {
    let mut builder = AssetHierarchyBuilder::new(".").with_source_name("assets.csv");
    builder.read_from(CONFIG.as_bytes())?;
    Ok(builder.build())
}

#[test]
fn startup_validation_keeps_only_valid_acyclic_formulas() -> Result<()> {
    let registry = registry()?;
    let setup = prepare_simulation(&registry);

    let calc = registry.find_by_path("Plant.Feeder.calc").expect("calc point");
    let descriptor = calc.simulation().expect("calc is simulated");
    assert_eq!(descriptor.free_variables.len(), 1);
    assert!(descriptor.free_variables.contains("t"));
    assert_eq!(descriptor.update_frequency_hz, 10);
    assert!(descriptor.dependency_map.is_empty());

    let power = registry.find_point("A1", 3).expect("power point");
    assert!(power.is_simulated());

    assert!(!registry.find_point("A2", 1).expect("P1").is_simulated());
    assert!(!registry.find_point("A2", 2).expect("P2").is_simulated());
    assert!(!registry.find_point("A2", 3).expect("broken").is_simulated());

    let cycles = setup
        .demoted
        .iter()
        .filter(|(_, reason)| matches!(reason, SimulationError::Cycle(_)))
        .count();
    assert_eq!(cycles, 2);
    assert_eq!(setup.simulated.len(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dependent_formula_follows_its_plain_input() -> Result<()> {
    let registry = Arc::new(registry()?);
    let run_state = Arc::new(SharedRunState::new(RunState::PlayForward));
    let config = SimulationConfig {
        monitor_interval: Duration::from_millis(300),
        ..SimulationConfig::default()
    };
    let engine = SimulationEngine::new(&registry, run_state.clone(), config, Handle::current());
    assert_eq!(engine.simulated_points().len(), 2);

    let current = registry.find_point("A1", 1).expect("current point").clone();
    current.set_raw_value(
        Some("2"),
        Default::default(),
        r_player_common::time::local_now(),
        r_player_common::time::local_offset(),
    )?;

    engine.start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let power = registry.find_point("A1", 3).expect("power point");
    assert_eq!(power.current_sample().value().as_f64(), Some(460.0));

    run_state.store(RunState::Initialized);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!engine.is_running());
    Ok(())
}
