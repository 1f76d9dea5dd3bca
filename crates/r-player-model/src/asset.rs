//! ---
//! ems_section: "02-measurement-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Arena-backed asset tree."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;

use crate::point::MeasurementPoint;

/// Index of an asset inside its [`AssetTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetIndex(usize);

/// A grouping node of the configured hierarchy.
#[derive(Debug)]
pub struct Asset {
    id: String,
    placeholder: bool,
    name: String,
    short_name: String,
    parent: Option<AssetIndex>,
    children: Vec<AssetIndex>,
    points: Vec<Arc<MeasurementPoint>>,
}

impl Asset {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the id was generated because no row has named this asset yet.
    pub fn has_placeholder_id(&self) -> bool {
        self.placeholder
    }

    /// Dotted path from the root down to this asset.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last path segment.
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn parent(&self) -> Option<AssetIndex> {
        self.parent
    }

    pub fn children(&self) -> &[AssetIndex] {
        &self.children
    }

    pub fn measurement_points(&self) -> &[Arc<MeasurementPoint>] {
        &self.points
    }

    pub fn find_point(&self, point_id: i32) -> Option<&Arc<MeasurementPoint>> {
        self.points.iter().find(|point| point.id() == point_id)
    }
}

/// Owns every asset; parents reference children by index and children point back the same way.
#[derive(Debug, Default)]
pub struct AssetTree {
    nodes: Vec<Asset>,
    roots: Vec<AssetIndex>,
}

impl AssetTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> &[AssetIndex] {
        &self.roots
    }

    pub fn get(&self, index: AssetIndex) -> &Asset {
        &self.nodes[index.0]
    }

    /// Children of `parent`, or the roots when `parent` is `None`.
    pub fn children_of(&self, parent: Option<AssetIndex>) -> &[AssetIndex] {
        match parent {
            Some(index) => &self.nodes[index.0].children,
            None => &self.roots,
        }
    }

    pub fn find_child(&self, parent: Option<AssetIndex>, short_name: &str) -> Option<AssetIndex> {
        self.children_of(parent)
            .iter()
            .copied()
            .find(|child| self.get(*child).short_name == short_name)
    }

    /// Link a new asset under `parent`.
    pub fn insert(
        &mut self,
        parent: Option<AssetIndex>,
        id: String,
        placeholder: bool,
        name: String,
        short_name: String,
    ) -> AssetIndex {
        let index = AssetIndex(self.nodes.len());
        self.nodes.push(Asset {
            id,
            placeholder,
            name,
            short_name,
            parent,
            children: Vec::new(),
            points: Vec::new(),
        });
        match parent {
            Some(parent) => self.nodes[parent.0].children.push(index),
            None => self.roots.push(index),
        }
        index
    }

    /// Replace the id of an asset, returning the previous one.
    pub fn assign_id(&mut self, index: AssetIndex, id: String) -> String {
        let node = &mut self.nodes[index.0];
        node.placeholder = false;
        std::mem::replace(&mut node.id, id)
    }

    pub fn push_point(&mut self, index: AssetIndex, point: Arc<MeasurementPoint>) {
        self.nodes[index.0].points.push(point);
    }

    /// Number of assets from the root down to and including `index`.
    pub fn depth(&self, index: AssetIndex) -> usize {
        self.ancestors(index).count()
    }

    /// `index` followed by each of its ancestors up to the root.
    pub fn ancestors(&self, index: AssetIndex) -> impl Iterator<Item = AssetIndex> + '_ {
        std::iter::successors(Some(index), move |current| self.get(*current).parent)
    }

    /// Depth-first pre-order walk over the whole tree.
    pub fn pre_order(&self) -> Vec<AssetIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<AssetIndex> = self.roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            order.push(index);
            stack.extend(self.get(index).children.iter().rev().copied());
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_order_visits_parents_before_children() {
        let mut tree = AssetTree::new();
        let line1 = tree.insert(None, "a".into(), false, "Line1".into(), "Line1".into());
        let sensor1 = tree.insert(
            Some(line1),
            "b".into(),
            false,
            "Line1.Sensor1".into(),
            "Sensor1".into(),
        );
        let line2 = tree.insert(None, "c".into(), false, "Line2".into(), "Line2".into());
        assert_eq!(tree.pre_order(), vec![line1, sensor1, line2]);
        assert_eq!(tree.depth(sensor1), 2);
        assert_eq!(tree.find_child(Some(line1), "Sensor1"), Some(sensor1));
        assert_eq!(tree.find_child(None, "Sensor1"), None);
    }

    #[test]
    fn assign_id_clears_placeholder_flag() {
        let mut tree = AssetTree::new();
        let index = tree.insert(None, "tmp".into(), true, "Line1".into(), "Line1".into());
        assert!(tree.get(index).has_placeholder_id());
        let previous = tree.assign_id(index, "A1".into());
        assert_eq!(previous, "tmp");
        assert_eq!(tree.get(index).id(), "A1");
        assert!(!tree.get(index).has_placeholder_id());
    }
}
