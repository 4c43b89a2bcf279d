//! Decide-phase steps 1–3 (§4.4): infinite-element replacement, the
//! resource tolerance ladder, and the farseeing short-circuit.

use crate::collect::NodeSnapshot;
use mycelium_types::{ActorId, Candidates, NodeId, PlacementOption, ResourceDemand};
use std::collections::{HashMap, HashSet};

/// §4.4.1: any actor whose candidate set was the "any node" sentinel gets
/// the union of every other actor's explicit candidates.
pub fn replace_infinite(actor_candidates: &HashMap<ActorId, Candidates>) -> HashMap<ActorId, HashSet<NodeId>> {
    let mut universe = HashSet::new();
    for candidates in actor_candidates.values() {
        if let Candidates::Set(s) = candidates {
            universe.extend(s.iter().copied());
        }
    }
    actor_candidates
        .iter()
        .map(|(id, candidates)| (*id, candidates.clone().resolve(&universe)))
        .collect()
}

fn meets(demand: ResourceDemand, snapshot: &NodeSnapshot, tolerance: f64) -> bool {
    demand.cpu <= snapshot.cpu_avail * tolerance && demand.ram <= snapshot.ram_avail * tolerance
}

fn filter_at(
    candidates: &HashSet<NodeId>,
    demand: ResourceDemand,
    nodes: &HashMap<NodeId, NodeSnapshot>,
    tolerance: f64,
) -> HashSet<NodeId> {
    candidates
        .iter()
        .copied()
        .filter(|n| nodes.get(n).is_some_and(|s| meets(demand, s, tolerance)))
        .collect()
}

/// §4.4.2: strict pass first; if it empties a candidate set, climb the
/// tolerance ladder `{1.1, 1.2, …, tolerance_max}` and stop at the first
/// level that restores non-emptiness. Nodes dropped at the strict pass are
/// never restored by a later, looser level — each level re-filters the
/// *original* candidate set, not the previous level's survivors, so the
/// only nodes a looser tolerance can reintroduce are ones the strict pass
/// itself excluded only for being marginally short of demand.
pub fn resource_filter(
    resolved: &HashMap<ActorId, HashSet<NodeId>>,
    demand: &HashMap<ActorId, ResourceDemand>,
    nodes: &HashMap<NodeId, NodeSnapshot>,
    tolerance_max: f64,
) -> HashMap<ActorId, HashSet<NodeId>> {
    resolved
        .iter()
        .map(|(actor, candidates)| {
            let d = demand.get(actor).copied().unwrap_or_default();
            let mut level = 1.0;
            let mut result = filter_at(candidates, d, nodes, level);
            while result.is_empty() && level < tolerance_max {
                level = (level + 0.1).min(tolerance_max);
                result = filter_at(candidates, d, nodes, level);
            }
            (*actor, result)
        })
        .collect()
}

/// Applications registered with Farseeing whose most recent placement is
/// still resource-feasible once their peers' reservations are subtracted
/// short-circuit the filter entirely (§4.4.3).
pub struct FarseeingSnapshot {
    /// CPU/RAM reserved by every other currently-active application's
    /// placement, per node.
    pub reserved: HashMap<NodeId, ResourceDemand>,
    pub current_placement: PlacementOption,
}

pub fn farseeing_short_circuit(
    snapshot: &FarseeingSnapshot,
    demand: &HashMap<ActorId, ResourceDemand>,
    nodes: &HashMap<NodeId, NodeSnapshot>,
) -> bool {
    snapshot.current_placement.iter().all(|(actor, placement)| {
        let Some(node) = nodes.get(&placement.runtime) else { return false };
        let reserved = snapshot.reserved.get(&placement.runtime).copied().unwrap_or_default();
        let available = NodeSnapshot {
            cpu_avail: node.cpu_avail - reserved.cpu,
            ram_avail: node.ram_avail - reserved.ram,
            ..*node
        };
        let d = demand.get(actor).copied().unwrap_or_default();
        meets(d, &available, 1.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycelium_types::NodeId;

    fn snap(cpu: f64, ram: f64) -> NodeSnapshot {
        NodeSnapshot { cpu_avail: cpu, ram_avail: ram, cpu_total: cpu, ram_total: ram, cost_cpu: 0.0, cost_ram: 0.0 }
    }

    #[test]
    fn infinite_candidates_resolve_to_union_of_explicit_sets() {
        let a = ActorId::new();
        let b = ActorId::new();
        let n1 = NodeId::new();
        let mut input = HashMap::new();
        input.insert(a, Candidates::of([n1]));
        input.insert(b, Candidates::Universe);
        let resolved = replace_infinite(&input);
        assert_eq!(resolved[&b], HashSet::from([n1]));
    }

    #[test]
    fn strict_pass_wins_when_it_is_non_empty() {
        let actor = ActorId::new();
        let n1 = NodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(n1, snap(100.0, 100.0));
        let mut resolved = HashMap::new();
        resolved.insert(actor, HashSet::from([n1]));
        let mut demand = HashMap::new();
        demand.insert(actor, ResourceDemand { cpu: 50.0, ram: 10.0 });

        let result = resource_filter(&resolved, &demand, &nodes, 1.5);
        assert_eq!(result[&actor], HashSet::from([n1]));
    }

    #[test]
    fn tolerance_ladder_restores_a_marginally_short_node() {
        let actor = ActorId::new();
        let n1 = NodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(n1, snap(100.0, 100.0));
        let mut resolved = HashMap::new();
        resolved.insert(actor, HashSet::from([n1]));
        let mut demand = HashMap::new();
        // 100 * 1.0 = 100 < 105 demand, but 100 * 1.2 = 120 >= 105.
        demand.insert(actor, ResourceDemand { cpu: 105.0, ram: 0.0 });

        let result = resource_filter(&resolved, &demand, &nodes, 1.5);
        assert_eq!(result[&actor], HashSet::from([n1]));
    }

    #[test]
    fn beyond_tolerance_max_stays_empty() {
        let actor = ActorId::new();
        let n1 = NodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(n1, snap(10.0, 10.0));
        let mut resolved = HashMap::new();
        resolved.insert(actor, HashSet::from([n1]));
        let mut demand = HashMap::new();
        demand.insert(actor, ResourceDemand { cpu: 1000.0, ram: 0.0 });

        let result = resource_filter(&resolved, &demand, &nodes, 1.5);
        assert!(result[&actor].is_empty());
    }
}
