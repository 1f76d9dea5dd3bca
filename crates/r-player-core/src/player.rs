//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Player bootstrap and lifecycle handle."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs::File;
use std::sync::Arc;

use parking_lot::Mutex;
use r_player_common::AppConfig;
use r_player_logging::{log_system_event, LogContext, SystemEventOutcome};
use r_player_model::{AssetHierarchyBuilder, MeasurementRegistry, SharedRunState};
use r_player_persistence::FileSampleLogger;
use r_player_replay::{ChronologicalReplaySource, TimeShift};
use r_player_sim::SimulationEngine;
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::driver::{spawn_driver, DriverHandle, DriverTiming};
use crate::errors::{BootstrapError, Result};
use crate::state_machine::{Command, ReplayStateMachine};

/// Fully wired player: registry, replay source, simulation, sink and state machine.
pub struct Player {
    config: AppConfig,
    registry: Arc<MeasurementRegistry>,
    machine: Arc<ReplayStateMachine>,
    simulation: Arc<SimulationEngine>,
    source: Option<ChronologicalReplaySource>,
    sink: Option<Arc<FileSampleLogger>>,
    driver: Mutex<Option<DriverHandle>>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("machine", &self.machine)
            .field("simulated", &self.simulation.simulated_points().len())
            .field("data_file", &self.source.as_ref().map(|source| source.path()))
            .field("sink", &self.sink)
            .finish()
    }
}

impl Player {
    /// Read the asset configuration, check the data file and open the sink.
    ///
    /// The simulation scheduler will be spawned on `runtime` when playback starts.
    pub fn bootstrap(config: AppConfig, runtime: Handle) -> Result<Self> {
        config
            .validate()
            .map_err(|err| BootstrapError::InvalidConfiguration(format!("{err:#}")))?;
        let player = &config.player;

        let config_file = player.config_file.clone();
        let builder = AssetHierarchyBuilder::new(player.path_separator.as_str())
            .with_source_name(config_file.display().to_string())
            .read_path(&config_file)
            .map_err(|source| BootstrapError::ConfigFile {
                path: config_file.clone(),
                source,
            })?;
        let (accepted_rows, dropped_rows) = (builder.accepted_rows(), builder.dropped_rows());
        let registry = builder.build();
        registry.log_structure();
        let registry = Arc::new(registry);

        let time_shift = TimeShift::new();
        let source = match &player.data_file {
            Some(path) => {
                File::open(path).map_err(|source| BootstrapError::DataFile {
                    path: path.clone(),
                    source,
                })?;
                Some(ChronologicalReplaySource::new(
                    path.clone(),
                    time_shift.clone(),
                    player.fast_forward_factor,
                ))
            }
            None => {
                warn!("no data file configured, only formulas will produce samples");
                None
            }
        };

        let sink = if config.sink.enabled {
            let logger = FileSampleLogger::open(&config.sink).map_err(|source| {
                BootstrapError::SinkFile {
                    path: config.sink.output_file.clone(),
                    source,
                }
            })?;
            let logger = Arc::new(logger);
            registry.attach_sink(logger.clone());
            Some(logger)
        } else {
            None
        };

        let run_state = Arc::new(SharedRunState::default());
        let simulation = Arc::new(SimulationEngine::new(
            &registry,
            run_state.clone(),
            config.simulation.clone(),
            runtime,
        ));
        let machine = Arc::new(
            ReplayStateMachine::new(registry.clone(), run_state, time_shift, player.endless)
                .with_simulation(simulation.clone()),
        );

        let config_name = config_file.display().to_string();
        let ctx = LogContext::new().with_source(&config_name);
        log_system_event(
            Some(&ctx),
            "player.bootstrap",
            &format!(
                "{} rows accepted, {} dropped; {} points, {} simulated, {} demoted",
                accepted_rows,
                dropped_rows,
                registry.points().count(),
                simulation.simulated_points().len(),
                simulation.demoted_points().len()
            ),
            SystemEventOutcome::Success,
        );

        Ok(Self {
            config,
            registry,
            machine,
            simulation,
            source,
            sink,
            driver: Mutex::new(None),
        })
    }

    /// Spawn the replay driver and issue `Play` when autostart is configured.
    pub fn start(&self) -> Result<()> {
        let mut driver = self.driver.lock();
        if driver.is_some() {
            return Ok(());
        }
        let timing = DriverTiming {
            idle_poll: self.config.player.idle_poll,
            loop_pause: self.config.player.loop_pause,
        };
        *driver = Some(
            spawn_driver(
                self.machine.clone(),
                self.registry.clone(),
                self.source.clone(),
                timing,
            )
            .map_err(BootstrapError::Driver)?,
        );
        drop(driver);
        if self.config.player.autostart {
            info!("autostart enabled, issuing Play");
            self.machine.apply(Command::Play);
        }
        Ok(())
    }

    /// Apply an integer remote control command; see [`ReplayStateMachine::remote_control`].
    pub fn remote_control(&self, code: i32) -> i32 {
        self.machine.remote_control(code)
    }

    pub fn machine(&self) -> &Arc<ReplayStateMachine> {
        &self.machine
    }

    pub fn registry(&self) -> &Arc<MeasurementRegistry> {
        &self.registry
    }

    pub fn simulation(&self) -> &Arc<SimulationEngine> {
        &self.simulation
    }

    pub fn sink(&self) -> Option<&Arc<FileSampleLogger>> {
        self.sink.as_ref()
    }

    /// Stop playback, wait for the driver and scheduler, then drain the sink.
    pub async fn shutdown(&self) {
        self.machine.apply(Command::Stop);
        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            if let Err(err) = tokio::task::spawn_blocking(move || driver.join()).await {
                warn!(error = %err, "replay driver join failed");
            }
        }
        self.simulation.shutdown().await;
        if let Some(sink) = self.sink.clone() {
            self.registry.detach_sinks();
            match tokio::task::spawn_blocking(move || sink.shutdown()).await {
                Ok(Ok(written)) => info!(written, "sample log drained"),
                Ok(Err(err)) => warn!(error = %err, "sample log shutdown failed"),
                Err(err) => warn!(error = %err, "sample log shutdown task failed"),
            }
        }
        log_system_event(None, "player.shutdown", "player stopped", SystemEventOutcome::Success);
    }
}
