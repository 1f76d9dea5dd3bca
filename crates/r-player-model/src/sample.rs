//! ---
//! ems_section: "02-measurement-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Immutable measurement samples."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use chrono::{FixedOffset, NaiveDateTime};
use r_player_common::time::{local_now, local_offset};
use strum::{Display, EnumString};

use crate::value::{DataType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
pub enum Quality {
    #[default]
    Good,
    Bad,
    BadSensor,
    BadLine,
    BadRange,
}

/// One observation of a measurement point. Never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSample {
    value: Value,
    quality: Quality,
    timestamp: NaiveDateTime,
    zone_offset: FixedOffset,
}

impl MeasurementSample {
    pub fn new(
        value: Value,
        quality: Quality,
        timestamp: NaiveDateTime,
        zone_offset: FixedOffset,
    ) -> Self {
        Self {
            value,
            quality,
            timestamp,
            zone_offset,
        }
    }

    /// The sample a point holds before any update and after a reset.
    pub fn default_for(data_type: DataType) -> Self {
        Self::new(
            Value::default_for(data_type),
            Quality::Good,
            local_now(),
            local_offset(),
        )
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn zone_offset(&self) -> FixedOffset {
        self.zone_offset
    }
}
