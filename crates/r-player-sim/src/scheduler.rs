//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Cooperative scheduler evaluating simulated points at their rates."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use r_player_common::time::{fractional_second, local_now, local_offset};
use r_player_common::{SimulationConfig, ThroughputMonitor};
use r_player_logging::{player_debug, player_warn, LogContext};
use r_player_model::{
    MeasurementPoint, MeasurementRegistry, Quality, RunState, SharedRunState,
    SimulationDescriptor, Value,
};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::errors::{Result, SimulationError};
use crate::formula::TIME_VARIABLE;
use crate::graph::{prepare_simulation, SimulationSetup};
use crate::rate::RateController;

/// Evaluate `descriptor` for `point` and store the result as a Good sample.
///
/// Simulated dependencies are recomputed first, once per call; plain
/// dependencies contribute their current value. Returns the stored number.
pub fn compute_and_store(point: &MeasurementPoint, descriptor: &SimulationDescriptor) -> Result<f64> {
    let now = local_now();
    let mut bindings = HashMap::with_capacity(descriptor.free_variables.len());
    if descriptor.free_variables.contains(TIME_VARIABLE) {
        bindings.insert(TIME_VARIABLE.to_owned(), fractional_second(&now));
    }
    for (variable, dependency) in &descriptor.dependency_map {
        let dependency = dependency
            .upgrade()
            .ok_or_else(|| SimulationError::DependencyGone(variable.clone()))?;
        let value = match dependency.simulation() {
            Some(nested) => compute_and_store(&dependency, &nested)?,
            None => dependency
                .current_sample()
                .value()
                .as_f64()
                .ok_or_else(|| SimulationError::NonNumericDependency(dependency.full_name().to_owned()))?,
        };
        bindings.insert(variable.clone(), value);
    }
    let number = descriptor.formula.evaluate(&bindings)?;
    let value = Value::from_f64(number, point.data_type())?;
    let stored = value.as_f64().unwrap_or(number);
    point.set_measurement_sample(value, Quality::Good, now, local_offset());
    Ok(stored)
}

struct Slot {
    point: Arc<MeasurementPoint>,
    descriptor: Arc<SimulationDescriptor>,
    rate: RateController,
    monitor: ThroughputMonitor,
    failing: bool,
}

impl Slot {
    fn tick(&mut self) {
        match compute_and_store(&self.point, &self.descriptor) {
            Ok(_) => {
                self.monitor.record();
                if self.failing {
                    self.failing = false;
                    info!(point = %self.point.full_name(), "simulation evaluation recovered");
                }
            }
            Err(err) => {
                // one diagnostic per failure streak
                if !self.failing {
                    self.failing = true;
                    let ctx = LogContext::new().with_point(self.point.full_name());
                    player_warn!(context = ctx, "simulation evaluation failed: {}", err);
                }
            }
        }
    }
}

struct ActiveScheduler {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Runs every simulated point of a registry on one cooperative tokio task.
///
/// Next fire times live in a min-heap; each point's period is corrected once
/// per monitor interval from its achieved sample rate.
pub struct SimulationEngine {
    run_state: Arc<SharedRunState>,
    config: SimulationConfig,
    runtime: Handle,
    points: Vec<Arc<MeasurementPoint>>,
    demoted: Vec<(String, SimulationError)>,
    rates: Arc<RwLock<HashMap<String, f64>>>,
    tick_gate: Arc<Mutex<()>>,
    active: Mutex<Option<ActiveScheduler>>,
}

impl SimulationEngine {
    /// Prepare every formula point of `registry`; the scheduler spawns on `runtime`.
    pub fn new(
        registry: &MeasurementRegistry,
        run_state: Arc<SharedRunState>,
        config: SimulationConfig,
        runtime: Handle,
    ) -> Self {
        let SimulationSetup { simulated, demoted } = prepare_simulation(registry);
        Self {
            run_state,
            config,
            runtime,
            points: simulated,
            demoted,
            rates: Arc::new(RwLock::new(HashMap::new())),
            tick_gate: Arc::new(Mutex::new(())),
            active: Mutex::new(None),
        }
    }

    pub fn simulated_points(&self) -> &[Arc<MeasurementPoint>] {
        &self.points
    }

    /// Formula points that run as plain points, with the reason.
    pub fn demoted_points(&self) -> &[(String, SimulationError)] {
        &self.demoted
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// Samples per second measured for `full_name` over the last monitor window.
    pub fn achieved_rate(&self, full_name: &str) -> Option<f64> {
        self.rates.read().get(full_name).copied()
    }

    /// Spawn the scheduler unless it is already running. Returns whether it was spawned.
    pub fn start(&self) -> bool {
        if self.points.is_empty() {
            return false;
        }
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|running| !running.task.is_finished()) {
            return false;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let slots = self
            .points
            .iter()
            .filter_map(|point| {
                let descriptor = point.simulation()?;
                Some(Slot {
                    rate: RateController::new(
                        descriptor.update_frequency_hz,
                        self.config.correction_gain,
                        self.config.max_frequency_hz,
                    ),
                    monitor: ThroughputMonitor::new(self.config.monitor_interval),
                    point: point.clone(),
                    descriptor,
                    failing: false,
                })
            })
            .collect();
        let task = self.runtime.spawn(run_scheduler(
            slots,
            self.run_state.clone(),
            self.rates.clone(),
            self.config.monitor_interval,
            self.tick_gate.clone(),
            shutdown_rx,
        ));
        info!(points = self.points.len(), "simulation scheduler started");
        *active = Some(ActiveScheduler {
            shutdown: shutdown_tx,
            task,
        });
        true
    }

    /// Signal the scheduler to finish. Returns once no evaluation is in
    /// flight; the task itself exits at its next wake-up.
    pub fn stop(&self) {
        let active = self.active.lock().take();
        if let Some(active) = active {
            let _ = active.shutdown.send(true);
            drop(self.tick_gate.lock());
            self.rates.write().clear();
            info!("simulation scheduler stopped");
        }
    }

    /// Stop the scheduler and wait for its task to end.
    pub async fn shutdown(&self) {
        let active = self.active.lock().take();
        if let Some(active) = active {
            let _ = active.shutdown.send(true);
            if let Err(err) = active.task.await {
                debug!(error = %err, "simulation scheduler task ended abnormally");
            }
        }
    }
}

impl Drop for SimulationEngine {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            let _ = active.shutdown.send(true);
        }
    }
}

async fn run_scheduler(
    mut slots: Vec<Slot>,
    run_state: Arc<SharedRunState>,
    rates: Arc<RwLock<HashMap<String, f64>>>,
    monitor_interval: std::time::Duration,
    tick_gate: Arc<Mutex<()>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let start = Instant::now();
    let mut queue: BinaryHeap<Reverse<(Instant, usize)>> =
        (0..slots.len()).map(|index| Reverse((start, index))).collect();

    while let Some(Reverse((due, index))) = queue.pop() {
        tokio::select! {
            _ = sleep_until(due) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                queue.push(Reverse((due, index)));
                continue;
            }
        }

        let next = {
            let _tick = tick_gate.lock();
            let state = run_state.load();
            if state == RunState::Initialized || *shutdown.borrow() {
                break;
            }
            advance(&mut slots[index], state, due, &rates, monitor_interval)
        };
        queue.push(Reverse((next, index)));
    }
    debug!("simulation scheduler loop finished");
}

/// Run or skip one due slot and return its next fire time.
fn advance(
    slot: &mut Slot,
    state: RunState,
    due: Instant,
    rates: &RwLock<HashMap<String, f64>>,
    monitor_interval: std::time::Duration,
) -> Instant {
    let now = Instant::now();
    if state == RunState::Paused {
        slot.monitor.reset_at(now.into_std());
    } else {
        slot.tick();
    }

    if let Some(summary) = slot.monitor.poll_at(now.into_std()) {
        let previous = slot.rate.period();
        let period = slot.rate.correct(summary.rate_per_sec);
        rates
            .write()
            .insert(slot.point.full_name().to_owned(), summary.rate_per_sec);
        player_debug!(
            context = LogContext::new().with_point(slot.point.full_name()),
            "achieved {:.2} samples/s (target {} Hz), period {:?} -> {:?}",
            summary.rate_per_sec,
            slot.rate.target_hz(),
            previous,
            period
        );
    }

    let next = due + slot.rate.period();
    if now.saturating_duration_since(next) > monitor_interval {
        now + slot.rate.period()
    } else {
        next
    }
}
