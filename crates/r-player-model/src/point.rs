//! ---
//! ems_section: "02-measurement-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Measurement points, sample storage, and the sink seam."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{FixedOffset, NaiveDateTime};
use parking_lot::RwLock;

use crate::errors::{ModelError, Result};
use crate::sample::{MeasurementSample, Quality};
use crate::types::{AccessRight, BaseUnitOfMeasure, PhysicalQuantity, UnitPrefix};
use crate::value::{DataType, Value};

/// Leading character marking a formula-driven point name.
pub const SIMULATION_MARKER: char = '#';

/// Receives every sample stored on a point it is attached to.
///
/// Called synchronously on the producing thread; implementations buffer on their own.
pub trait SampleSink: Send + Sync {
    fn on_sample(&self, point: &MeasurementPoint, sample: &MeasurementSample);
}

/// Compiled arithmetic expression evaluated by the simulation scheduler.
pub trait Formula: fmt::Debug + Send + Sync {
    /// Evaluate with every free variable bound in `bindings`.
    fn evaluate(&self, bindings: &HashMap<String, f64>) -> Result<f64>;

    /// Expression text as configured.
    fn source(&self) -> &str;
}

/// Parsed formula declaration attached to a simulated point.
#[derive(Debug, Clone)]
pub struct SimulationDescriptor {
    pub free_variables: BTreeSet<String>,
    /// Variable name to the point supplying its value.
    pub dependency_map: BTreeMap<String, Weak<MeasurementPoint>>,
    pub update_frequency_hz: u32,
    pub formula: Arc<dyn Formula>,
}

impl SimulationDescriptor {
    /// Dependencies still alive, keyed by variable name.
    pub fn dependencies(&self) -> impl Iterator<Item = (&str, Arc<MeasurementPoint>)> + '_ {
        self.dependency_map
            .iter()
            .filter_map(|(name, point)| point.upgrade().map(|point| (name.as_str(), point)))
    }
}

/// Display name of a configured point name.
///
/// `#calc(t)[10]:sin(2*t)` yields `calc`; plain names are returned unchanged.
pub fn display_name(raw: &str) -> &str {
    match raw.strip_prefix(SIMULATION_MARKER) {
        Some(rest) => match rest.find('(') {
            Some(open) if open > 0 => &rest[..open],
            _ => raw,
        },
        None => raw,
    }
}

/// A single named, typed signal.
pub struct MeasurementPoint {
    id: i32,
    name: String,
    display_name: String,
    full_name: String,
    physical_quantity: PhysicalQuantity,
    base_unit: BaseUnitOfMeasure,
    unit_prefix: UnitPrefix,
    access_right: AccessRight,
    data_type: DataType,
    current: RwLock<Arc<MeasurementSample>>,
    sink: RwLock<Option<Arc<dyn SampleSink>>>,
    simulation: RwLock<Option<Arc<SimulationDescriptor>>>,
}

impl fmt::Debug for MeasurementPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementPoint")
            .field("id", &self.id)
            .field("full_name", &self.full_name)
            .field("data_type", &self.data_type)
            .field("simulated", &self.is_simulated())
            .finish()
    }
}

impl MeasurementPoint {
    pub fn builder(id: i32, name: impl Into<String>) -> MeasurementPointBuilder {
        MeasurementPointBuilder::new(id, name)
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// Name exactly as configured, including any formula declaration.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Dotted hierarchical name, e.g. `Line1.Sensor1.Pressure`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn physical_quantity(&self) -> PhysicalQuantity {
        self.physical_quantity
    }

    pub fn base_unit(&self) -> BaseUnitOfMeasure {
        self.base_unit
    }

    pub fn unit_prefix(&self) -> UnitPrefix {
        self.unit_prefix
    }

    pub fn access_right(&self) -> AccessRight {
        self.access_right
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Whether the configured name carries a formula declaration.
    pub fn declares_formula(&self) -> bool {
        self.name.starts_with(SIMULATION_MARKER)
    }

    pub fn is_simulated(&self) -> bool {
        self.simulation.read().is_some()
    }

    pub fn simulation(&self) -> Option<Arc<SimulationDescriptor>> {
        self.simulation.read().clone()
    }

    pub fn attach_simulation(&self, descriptor: SimulationDescriptor) {
        *self.simulation.write() = Some(Arc::new(descriptor));
    }

    /// Turn the point into a plain replay-fed point. Returns whether it was simulated.
    pub fn demote_simulation(&self) -> bool {
        self.simulation.write().take().is_some()
    }

    pub fn current_sample(&self) -> Arc<MeasurementSample> {
        self.current.read().clone()
    }

    pub fn attach_sink(&self, sink: Arc<dyn SampleSink>) {
        *self.sink.write() = Some(sink);
    }

    pub fn detach_sink(&self) {
        *self.sink.write() = None;
    }

    /// Store a new current sample and forward it to the attached sink.
    pub fn set_measurement_sample(
        &self,
        value: Value,
        quality: Quality,
        timestamp: NaiveDateTime,
        zone_offset: FixedOffset,
    ) {
        self.store(MeasurementSample::new(value, quality, timestamp, zone_offset));
    }

    /// Convert `raw` with the point's data type and store it.
    pub fn set_raw_value(
        &self,
        raw: Option<&str>,
        quality: Quality,
        timestamp: NaiveDateTime,
        zone_offset: FixedOffset,
    ) -> Result<()> {
        let value = Value::create(raw, self.data_type)?;
        self.set_measurement_sample(value, quality, timestamp, zone_offset);
        Ok(())
    }

    /// Reset to the type default sample.
    pub fn clear_value(&self) {
        self.store(MeasurementSample::default_for(self.data_type));
    }

    fn store(&self, sample: MeasurementSample) {
        let sample = Arc::new(sample);
        *self.current.write() = sample.clone();
        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            sink.on_sample(self, &sample);
        }
    }
}

/// Validating constructor for [`MeasurementPoint`].
#[derive(Debug, Clone)]
pub struct MeasurementPointBuilder {
    id: i32,
    name: String,
    asset_path: Option<String>,
    separator: String,
    physical_quantity: Option<PhysicalQuantity>,
    base_unit: Option<BaseUnitOfMeasure>,
    unit_prefix: Option<UnitPrefix>,
    access_right: AccessRight,
    data_type: Option<DataType>,
}

impl MeasurementPointBuilder {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            asset_path: None,
            separator: ".".to_owned(),
            physical_quantity: None,
            base_unit: None,
            unit_prefix: None,
            access_right: AccessRight::default(),
            data_type: None,
        }
    }

    /// Place the point under the asset with dotted path `path`.
    pub fn asset_path(mut self, path: impl Into<String>, separator: impl Into<String>) -> Self {
        self.asset_path = Some(path.into());
        self.separator = separator.into();
        self
    }

    pub fn physical_quantity(mut self, quantity: PhysicalQuantity) -> Self {
        self.physical_quantity = Some(quantity);
        self
    }

    pub fn base_unit(mut self, unit: BaseUnitOfMeasure) -> Self {
        self.base_unit = Some(unit);
        self
    }

    pub fn unit_prefix(mut self, prefix: UnitPrefix) -> Self {
        self.unit_prefix = Some(prefix);
        self
    }

    pub fn access_right(mut self, access: AccessRight) -> Self {
        self.access_right = access;
        self
    }

    /// Override the data type derived from the physical quantity.
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn build(self) -> Result<MeasurementPoint> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(ModelError::EmptyField("measurement point name"));
        }
        let physical_quantity = self
            .physical_quantity
            .ok_or(ModelError::EmptyField("physical quantity"))?;
        let base_unit = self
            .base_unit
            .ok_or(ModelError::EmptyField("unit of measure"))?;
        let unit_prefix = self.unit_prefix.ok_or(ModelError::EmptyField("unit prefix"))?;
        let data_type = self
            .data_type
            .unwrap_or_else(|| physical_quantity.default_data_type());
        let display = display_name(&name).to_owned();
        let full_name = match &self.asset_path {
            Some(path) if !path.is_empty() => format!("{}{}{}", path, self.separator, display),
            _ => display.clone(),
        };
        Ok(MeasurementPoint {
            id: self.id,
            name,
            display_name: display,
            full_name,
            physical_quantity,
            base_unit,
            unit_prefix,
            access_right: self.access_right,
            data_type,
            current: RwLock::new(Arc::new(MeasurementSample::default_for(data_type))),
            sink: RwLock::new(None),
            simulation: RwLock::new(None),
        })
    }
}
