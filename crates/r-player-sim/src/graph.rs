//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Dependency resolution and cycle detection for simulated points."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use petgraph::{algo::tarjan_scc, graph::NodeIndex, Graph};
use r_player_logging::{player_info, player_warn, LogContext};
use r_player_model::{MeasurementPoint, MeasurementRegistry, SimulationDescriptor};

use crate::errors::SimulationError;
use crate::formula::{parse_declaration, FormulaDeclaration};

/// Outcome of preparing every formula point of a registry.
#[derive(Debug, Default)]
pub struct SimulationSetup {
    /// Points left simulated after validation, in registry order.
    pub simulated: Vec<Arc<MeasurementPoint>>,
    /// Full name of each demoted point with the reason.
    pub demoted: Vec<(String, SimulationError)>,
}

impl SimulationSetup {
    pub fn is_demoted(&self, full_name: &str) -> bool {
        self.demoted.iter().any(|(name, _)| name == full_name)
    }
}

/// Map a formula variable to the dotted path of the point it names.
pub fn variable_path(variable: &str, separator: &str) -> String {
    variable.replace('_', separator)
}

fn resolve(
    registry: &MeasurementRegistry,
    declaration: &FormulaDeclaration,
) -> Result<BTreeMap<String, Arc<MeasurementPoint>>, SimulationError> {
    let mut resolved = BTreeMap::new();
    for variable in declaration.point_variables() {
        let path = variable_path(variable, registry.separator());
        let point = registry
            .find_by_path(&path)
            .ok_or_else(|| SimulationError::UnresolvedVariable {
                variable: variable.to_owned(),
                path: path.clone(),
            })?;
        resolved.insert(variable.to_owned(), point.clone());
    }
    Ok(resolved)
}

fn demote(setup: &mut SimulationSetup, point: &MeasurementPoint, reason: SimulationError) {
    point.demote_simulation();
    let ctx = LogContext::new().with_point(point.full_name());
    player_warn!(context = ctx, "formula point runs as a plain point: {}", reason);
    setup.demoted.push((point.full_name().to_owned(), reason));
}

/// Parse, resolve and validate every formula point, attaching descriptors to
/// the survivors.
///
/// Points whose declaration does not parse, that reference an unknown point,
/// or that take part in a dependency cycle are demoted and reported.
pub fn prepare_simulation(registry: &MeasurementRegistry) -> SimulationSetup {
    let mut setup = SimulationSetup::default();
    let mut attached: Vec<(Arc<MeasurementPoint>, Vec<Arc<MeasurementPoint>>)> = Vec::new();

    for point in registry.formula_points() {
        let prepared = parse_declaration(point.name())
            .map_err(SimulationError::from)
            .and_then(|declaration| {
                resolve(registry, &declaration).map(|deps| (declaration, deps))
            });
        let (declaration, dependencies) = match prepared {
            Ok(prepared) => prepared,
            Err(reason) => {
                demote(&mut setup, point, reason);
                continue;
            }
        };
        let dependency_map = dependencies
            .iter()
            .map(|(name, dep)| (name.clone(), Arc::downgrade(dep)))
            .collect();
        point.attach_simulation(SimulationDescriptor {
            free_variables: declaration.free_variables,
            dependency_map,
            update_frequency_hz: declaration.update_frequency_hz,
            formula: Arc::new(declaration.expression),
        });
        attached.push((point.clone(), dependencies.into_values().collect()));
    }

    let mut graph = Graph::<usize, ()>::new();
    let mut nodes: HashMap<*const MeasurementPoint, NodeIndex> = HashMap::new();
    for (slot, (point, _)) in attached.iter().enumerate() {
        nodes.insert(Arc::as_ptr(point), graph.add_node(slot));
    }
    for (point, dependencies) in &attached {
        let from = nodes[&Arc::as_ptr(point)];
        for dependency in dependencies {
            // plain points cannot close a cycle
            if let Some(to) = nodes.get(&Arc::as_ptr(dependency)) {
                graph.add_edge(from, *to, ());
            }
        }
    }

    let mut cyclic = vec![false; attached.len()];
    for component in tarjan_scc(&graph) {
        let self_loop = component.len() == 1 && graph.contains_edge(component[0], component[0]);
        if component.len() < 2 && !self_loop {
            continue;
        }
        let mut members: Vec<&str> = component
            .iter()
            .map(|node| attached[graph[*node]].0.full_name())
            .collect();
        members.sort_unstable();
        let cycle = members.join(" <-> ");
        for node in &component {
            let slot = graph[*node];
            cyclic[slot] = true;
            demote(&mut setup, &attached[slot].0, SimulationError::Cycle(cycle.clone()));
        }
    }

    setup.simulated = attached
        .into_iter()
        .zip(cyclic)
        .filter_map(|((point, _), cyclic)| (!cyclic).then_some(point))
        .collect();
    player_info!(
        "simulation prepared: {} simulated, {} demoted",
        setup.simulated.len(),
        setup.demoted.len()
    );
    setup
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_player_model::AssetHierarchyBuilder;

    fn registry(rows: &[[&str; 8]]) -> MeasurementRegistry {
        let mut builder = AssetHierarchyBuilder::new(".");
        for (line, row) in rows.iter().enumerate() {
            builder.add_row(line as u64 + 2, row).unwrap();
        }
        builder.build()
    }

    fn row<'a>(asset: &'a str, path: &'a str, id: &'a str, name: &'a str) -> [&'a str; 8] {
        [asset, path, id, name, "Power", "Voltage", "NoPrefix", "Read"]
    }

    #[test]
    fn time_only_formula_has_no_dependencies() {
        let registry = registry(&[row("A1", "Line1", "1", "#calc(t)[10]:sin(2*t)")]);
        let setup = prepare_simulation(&registry);
        assert_eq!(setup.simulated.len(), 1);
        let descriptor = setup.simulated[0].simulation().unwrap();
        assert_eq!(descriptor.update_frequency_hz, 10);
        assert!(descriptor.dependency_map.is_empty());
        assert!(descriptor.free_variables.contains("t"));
    }

    #[test]
    fn resolves_underscored_variables_to_dotted_paths() {
        let registry = registry(&[
            row("A1", "Line1.Sensor1", "1", "Voltage"),
            row("A2", "Line1", "2", "#double(Line1_Sensor1_Voltage)[5]:2*Line1_Sensor1_Voltage"),
        ]);
        let setup = prepare_simulation(&registry);
        assert!(setup.demoted.is_empty());
        let point = registry.find_by_path("Line1.double").unwrap();
        let descriptor = point.simulation().unwrap();
        let deps: Vec<_> = descriptor.dependencies().map(|(name, dep)| (name.to_owned(), dep.id())).collect();
        assert_eq!(deps, vec![("Line1_Sensor1_Voltage".to_owned(), 1)]);
    }

    #[test]
    fn unresolved_variable_demotes_the_point() {
        let registry = registry(&[row("A1", "Line1", "1", "#calc(Nowhere_Point)[1]:Nowhere_Point")]);
        let setup = prepare_simulation(&registry);
        assert!(setup.simulated.is_empty());
        assert!(matches!(
            &setup.demoted[0].1,
            SimulationError::UnresolvedVariable { path, .. } if path == "Nowhere.Point"
        ));
        assert!(!registry.find_point("A1", 1).unwrap().is_simulated());
    }

    #[test]
    fn malformed_declaration_demotes_the_point() {
        let registry = registry(&[row("A1", "Line1", "1", "#calc(t)[x]:t")]);
        let setup = prepare_simulation(&registry);
        assert!(setup.is_demoted("Line1.calc"));
        assert!(matches!(setup.demoted[0].1, SimulationError::Formula(_)));
    }

    #[test]
    fn two_point_cycle_demotes_both_ends() {
        let registry = registry(&[
            row("A1", "Line1", "1", "#P1(Line1_P2)[1]:Line1_P2 + 1"),
            row("A1", "Line1", "2", "#P2(Line1_P1)[1]:Line1_P1 + 1"),
            row("A1", "Line1", "3", "#P3(Line1_P1)[1]:Line1_P1"),
        ]);
        let setup = prepare_simulation(&registry);
        let p1 = registry.find_point("A1", 1).unwrap();
        let p2 = registry.find_point("A1", 2).unwrap();
        assert!(!p1.is_simulated());
        assert!(!p2.is_simulated());
        assert!(setup.is_demoted("Line1.P1"));
        assert!(setup.is_demoted("Line1.P2"));
        // a dependent outside the cycle keeps running on the plain value
        assert!(registry.find_point("A1", 3).unwrap().is_simulated());
        assert_eq!(setup.simulated.len(), 1);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let registry = registry(&[row("A1", "Line1", "1", "#loop(Line1_loop)[1]:Line1_loop + 1")]);
        let setup = prepare_simulation(&registry);
        assert!(setup.simulated.is_empty());
        assert!(matches!(setup.demoted[0].1, SimulationError::Cycle(_)));
    }
}
