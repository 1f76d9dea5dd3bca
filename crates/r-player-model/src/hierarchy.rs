//! ---
//! ems_section: "02-measurement-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Builds the asset tree from semicolon separated configuration rows."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use csv::{ReaderBuilder, Trim};
use r_player_logging::{player_debug, player_info, player_warn, LogContext};
use uuid::Uuid;

use crate::asset::{AssetIndex, AssetTree};
use crate::errors::{ModelError, Result};
use crate::point::MeasurementPoint;
use crate::registry::MeasurementRegistry;
use crate::types::{AccessRight, BaseUnitOfMeasure, PhysicalQuantity, UnitPrefix};
use crate::value::DataType;

/// Mandatory columns of a configuration row.
pub const CONFIG_COLUMNS: usize = 8;

/// Turns configuration rows into an [`AssetTree`] and hands it to a [`MeasurementRegistry`].
///
/// Rows do not need to appear in path order. An intermediate segment first seen
/// through a deeper row gets a generated id that a later row naming that exact
/// path overwrites.
#[derive(Debug)]
pub struct AssetHierarchyBuilder {
    separator: String,
    source: String,
    tree: AssetTree,
    accepted: usize,
    dropped: usize,
}

impl AssetHierarchyBuilder {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            source: "configuration".to_owned(),
            tree: AssetTree::new(),
            accepted: 0,
            dropped: 0,
        }
    }

    /// Name used in diagnostics for the rows being read.
    pub fn with_source_name(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Read every row of the configuration file at `path`.
    pub fn read_path(mut self, path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        self.source = path.display().to_string();
        self.read_from(file)?;
        Ok(self)
    }

    /// Read rows from `reader`; the first row is a header. Only I/O failures abort.
    pub fn read_from<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut rows = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);
        for record in rows.records() {
            let record = match record {
                Ok(record) => record,
                Err(err) if err.is_io_error() => return Err(err.into()),
                Err(err) => {
                    let line = err.position().map(|pos| pos.line()).unwrap_or_default();
                    let ctx = LogContext::new().with_source(&self.source).with_line(line);
                    player_warn!(context = ctx, "configuration row dropped: {}", err);
                    self.dropped += 1;
                    continue;
                }
            };
            let line = record.position().map(|pos| pos.line()).unwrap_or_default();
            let fields: Vec<&str> = record.iter().collect();
            if let Err(err) = self.add_row(line, &fields) {
                let ctx = LogContext::new()
                    .with_source(&self.source)
                    .with_line(line)
                    .with_asset(fields.first().copied().unwrap_or_default());
                player_warn!(context = ctx, "configuration row dropped: {}", err);
                self.dropped += 1;
            }
        }
        Ok(())
    }

    /// Apply one configuration row.
    ///
    /// Columns: `assetId;assetName;pointId;pointName;physicalQuantity;unit;prefix;accessRight`
    /// with an optional ninth `dataType` column.
    pub fn add_row(&mut self, line: u64, fields: &[&str]) -> Result<()> {
        if fields.len() != CONFIG_COLUMNS && fields.len() != CONFIG_COLUMNS + 1 {
            return Err(ModelError::ColumnCount {
                expected: "8 or 9",
                found: fields.len(),
            });
        }
        let asset_id = fields[0].trim();
        if asset_id.is_empty() {
            return Err(ModelError::EmptyField("asset id"));
        }
        let segments: Vec<&str> = fields[1].split(self.separator.as_str()).map(str::trim).collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(ModelError::invalid("asset name", fields[1]));
        }
        let point = self.point_from_row(&segments, fields)?;

        let leaf = self.attach_path(line, asset_id, &segments)?;
        if self.tree.get(leaf).find_point(point.id()).is_some() {
            return Err(ModelError::invalid(
                "duplicate measurement point id",
                &point.id().to_string(),
            ));
        }
        let ctx = LogContext::new()
            .with_source(&self.source)
            .with_line(line)
            .with_asset(asset_id)
            .with_point(point.full_name());
        player_debug!(context = ctx, "measurement point configured");
        self.tree.push_point(leaf, Arc::new(point));
        self.accepted += 1;
        Ok(())
    }

    fn point_from_row(&self, segments: &[&str], fields: &[&str]) -> Result<MeasurementPoint> {
        let raw_id = fields[2].trim();
        let point_id: i32 = raw_id
            .parse()
            .map_err(|_| ModelError::invalid("measurement point id", raw_id))?;
        let quantity = parse_field::<PhysicalQuantity>("physical quantity", fields[4])?;
        let unit = parse_field::<BaseUnitOfMeasure>("unit of measure", fields[5])?;
        let prefix = parse_field::<UnitPrefix>("unit prefix", fields[6])?;
        let access = match fields[7].trim() {
            "" => AccessRight::default(),
            raw => parse_field::<AccessRight>("access right", raw)?,
        };
        let mut builder = MeasurementPoint::builder(point_id, fields[3])
            .asset_path(segments.join(self.separator.as_str()), self.separator.clone())
            .physical_quantity(quantity)
            .base_unit(unit)
            .unit_prefix(prefix)
            .access_right(access);
        if let Some(raw) = fields.get(CONFIG_COLUMNS).map(|raw| raw.trim()) {
            if !raw.is_empty() {
                builder = builder.data_type(parse_field::<DataType>("data type", raw)?);
            }
        }
        builder.build()
    }

    /// Walk or create the path, returning the leaf asset.
    fn attach_path(&mut self, line: u64, asset_id: &str, segments: &[&str]) -> Result<AssetIndex> {
        let leaf_depth = segments.len().saturating_sub(1);
        let mut parent = None;
        for (depth, segment) in segments.iter().enumerate() {
            let is_leaf = depth == leaf_depth;
            let index = match self.tree.find_child(parent, segment) {
                Some(existing) => {
                    if is_leaf {
                        self.backfill_id(line, existing, asset_id);
                    }
                    existing
                }
                None => {
                    let (id, placeholder) = if is_leaf {
                        (asset_id.to_owned(), false)
                    } else {
                        (Uuid::new_v4().to_string(), true)
                    };
                    let name = segments[..=depth].join(self.separator.as_str());
                    self.tree
                        .insert(parent, id, placeholder, name, (*segment).to_owned())
                }
            };
            if is_leaf {
                return Ok(index);
            }
            parent = Some(index);
        }
        Err(ModelError::EmptyField("asset name"))
    }

    fn backfill_id(&mut self, line: u64, index: AssetIndex, asset_id: &str) {
        let asset = self.tree.get(index);
        if asset.id() == asset_id {
            return;
        }
        let was_placeholder = asset.has_placeholder_id();
        let previous = self.tree.assign_id(index, asset_id.to_owned());
        let path = self.tree.get(index).name().to_owned();
        let ctx = LogContext::new()
            .with_source(&self.source)
            .with_line(line)
            .with_asset(&path);
        if was_placeholder {
            player_debug!(context = ctx, "asset id {} replaces generated id {}", asset_id, previous);
        } else {
            player_warn!(
                context = ctx,
                "asset id {} overwrites id {} configured earlier for the same path",
                asset_id,
                previous
            );
        }
    }

    pub fn accepted_rows(&self) -> usize {
        self.accepted
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped
    }

    pub fn build(self) -> MeasurementRegistry {
        player_info!(
            context = LogContext::new().with_source(&self.source),
            "asset hierarchy built: {} assets, {} rows accepted, {} rows dropped",
            self.tree.len(),
            self.accepted,
            self.dropped
        );
        MeasurementRegistry::new(self.tree, self.separator)
    }
}

fn parse_field<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ModelError::invalid(field, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "assetId;assetName;measurementPointId;measurementPointName;physicalQuantity;unitOfMeasure;prefix;accessRight\n";

    fn build(rows: &str) -> (MeasurementRegistry, usize) {
        let mut builder = AssetHierarchyBuilder::new(".");
        let input = format!("{HEADER}{rows}");
        builder.read_from(input.as_bytes()).unwrap();
        let dropped = builder.dropped_rows();
        (builder.build(), dropped)
    }

    #[test]
    fn intermediate_levels_are_reused() {
        let (registry, dropped) = build(
            "A1;Line1.Sensor1;1;Pressure;Force;Newton;NoPrefix;Read\n\
             A1;Line1.Sensor1;2;Temp;Mass;Gram;NoPrefix;Read\n\
             A2;Line1.Sensor2;1;Flow;Length;Meter;Kilo;Both\n",
        );
        assert_eq!(dropped, 0);
        let tree = registry.tree();
        assert_eq!(tree.roots().len(), 1);
        let line1 = tree.roots()[0];
        assert_eq!(tree.get(line1).children().len(), 2);
        let sensor1 = tree.find_child(Some(line1), "Sensor1").unwrap();
        assert_eq!(tree.depth(sensor1), 2);
        assert_eq!(tree.get(sensor1).measurement_points().len(), 2);
        assert_eq!(tree.get(sensor1).name(), "Line1.Sensor1");
    }

    #[test]
    fn placeholder_ids_are_backfilled() {
        let (registry, _) = build(
            "A2;Line1.Sensor1;1;Pressure;Force;Newton;NoPrefix;Read\n\
             A1;Line1;5;Status;NoQuantity;NoUoM;NoPrefix;Read\n",
        );
        let tree = registry.tree();
        let line1 = tree.roots()[0];
        assert_eq!(tree.get(line1).id(), "A1");
        assert!(!tree.get(line1).has_placeholder_id());
        assert_eq!(registry.find_point("A1", 5).unwrap().full_name(), "Line1.Status");
    }

    #[test]
    fn conflicting_leaf_id_is_overwritten() {
        let (registry, dropped) = build(
            "A1;Line1;1;Pressure;Force;Newton;NoPrefix;Read\n\
             B7;Line1;2;Temp;Mass;Gram;NoPrefix;Read\n",
        );
        assert_eq!(dropped, 0);
        assert_eq!(registry.tree().get(registry.tree().roots()[0]).id(), "B7");
    }

    #[test]
    fn malformed_rows_are_dropped() {
        let (registry, dropped) = build(
            "A1;Line1;1;Pressure;Force;Newton;NoPrefix\n\
             A1;Line1;x;Pressure;Force;Newton;NoPrefix;Read\n\
             A1;Line1;2;Pressure;Speed;Newton;NoPrefix;Read\n\
             A1;Line1;3;Pressure;Force;Newton;NoPrefix;Read\n\
             A1;Line1;3;Again;Force;Newton;NoPrefix;Read\n",
        );
        assert_eq!(dropped, 4);
        assert_eq!(registry.points().count(), 1);
    }

    #[test]
    fn row_counts_cover_every_data_line() {
        let mut builder = AssetHierarchyBuilder::new(".");
        let input = format!(
            "{HEADER}A1;Line1;1;Pressure;Force;Newton;NoPrefix;Read\n\
             A1;Line1;x;Pressure;Force;Newton;NoPrefix;Read\n\
             A2;Line2;1;Current;Current;Ampere;NoPrefix;Read\n"
        );
        builder.read_from(input.as_bytes()).unwrap();
        assert_eq!(builder.accepted_rows(), 2);
        assert_eq!(builder.dropped_rows(), 1);
    }

    #[test]
    fn optional_data_type_column_overrides_derivation() {
        let (registry, dropped) = build(
            "A1;Line1;1;Count;NoQuantity;NoUoM;NoPrefix;Read;Int32\n\
             A1;Line1;2;Flag;NoQuantity;NoUoM;NoPrefix;Write\n",
        );
        assert_eq!(dropped, 0);
        assert_eq!(registry.find_point("A1", 1).unwrap().data_type(), DataType::Int32);
        assert_eq!(registry.find_point("A1", 2).unwrap().data_type(), DataType::Boolean);
    }
}
