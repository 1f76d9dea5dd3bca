//! ---
//! ems_section: "02-measurement-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Registry of all measurement points with flat and hierarchical lookup."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::info;

use crate::asset::{Asset, AssetIndex, AssetTree};
use crate::point::{MeasurementPoint, SampleSink};

#[derive(Debug, Default)]
struct FlatIndex {
    assets: Vec<AssetIndex>,
    by_asset_id: HashMap<String, AssetIndex>,
    by_path: HashMap<String, Arc<MeasurementPoint>>,
}

/// Owns the asset tree built at startup and every point in it.
///
/// The tree is immutable once built; points carry their own interior state.
#[derive(Debug)]
pub struct MeasurementRegistry {
    tree: AssetTree,
    separator: String,
    flat: OnceCell<FlatIndex>,
}

impl MeasurementRegistry {
    pub fn new(tree: AssetTree, separator: impl Into<String>) -> Self {
        Self {
            tree,
            separator: separator.into(),
            flat: OnceCell::new(),
        }
    }

    pub fn tree(&self) -> &AssetTree {
        &self.tree
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn asset(&self, index: AssetIndex) -> &Asset {
        self.tree.get(index)
    }

    fn flat(&self) -> &FlatIndex {
        self.flat.get_or_init(|| {
            let assets = self.tree.pre_order();
            let mut by_asset_id = HashMap::new();
            let mut by_path = HashMap::new();
            for index in &assets {
                let asset = self.tree.get(*index);
                by_asset_id
                    .entry(asset.id().to_lowercase())
                    .or_insert(*index);
                for point in asset.measurement_points() {
                    by_path
                        .entry(point.full_name().to_owned())
                        .or_insert_with(|| point.clone());
                }
            }
            FlatIndex {
                assets,
                by_asset_id,
                by_path,
            }
        })
    }

    /// Every asset in pre-order, computed once.
    pub fn flattened(&self) -> &[AssetIndex] {
        &self.flat().assets
    }

    /// Every point, in the order of [`Self::flattened`].
    pub fn points(&self) -> impl Iterator<Item = &Arc<MeasurementPoint>> + '_ {
        self.flattened()
            .iter()
            .flat_map(|index| self.tree.get(*index).measurement_points())
    }

    /// Find a point by asset id (case-insensitive) and point id.
    pub fn find_point(&self, asset_id: &str, point_id: i32) -> Option<&Arc<MeasurementPoint>> {
        let index = self.flat().by_asset_id.get(&asset_id.to_lowercase())?;
        self.tree.get(*index).find_point(point_id)
    }

    /// Find a point by its full dotted name.
    pub fn find_by_path(&self, path: &str) -> Option<&Arc<MeasurementPoint>> {
        self.flat().by_path.get(path)
    }

    /// Points whose configured name declares a formula.
    pub fn formula_points(&self) -> impl Iterator<Item = &Arc<MeasurementPoint>> + '_ {
        self.points().filter(|point| point.declares_formula())
    }

    /// Reset every point to its type default sample.
    pub fn clear_all(&self) {
        for point in self.points() {
            point.clear_value();
        }
    }

    /// Attach `sink` to every point.
    pub fn attach_sink(&self, sink: Arc<dyn SampleSink>) {
        for point in self.points() {
            point.attach_sink(sink.clone());
        }
    }

    pub fn detach_sinks(&self) {
        for point in self.points() {
            point.detach_sink();
        }
    }

    /// Indented rendering of the tree, one asset or point per line.
    pub fn render_structure(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<(AssetIndex, usize)> =
            self.tree.roots().iter().rev().map(|root| (*root, 0)).collect();
        while let Some((index, depth)) = stack.pop() {
            let asset = self.tree.get(index);
            let indent = "  ".repeat(depth);
            let _ = writeln!(out, "{indent}{} [{}]", asset.short_name(), asset.id());
            for point in asset.measurement_points() {
                let _ = writeln!(
                    out,
                    "{indent}  - {} ({}, {})",
                    point.display_name(),
                    point.id(),
                    point.data_type()
                );
            }
            stack.extend(asset.children().iter().rev().map(|child| (*child, depth + 1)));
        }
        out
    }

    /// Log the hierarchical structure and the flattened asset list.
    pub fn log_structure(&self) {
        info!(structure = %self.render_structure(), "asset hierarchy");
        for index in self.flattened() {
            let asset = self.tree.get(*index);
            info!(
                asset_id = %asset.id(),
                asset = %asset.name(),
                points = asset.measurement_points().len(),
                "flattened asset"
            );
        }
    }
}
