//! The five additive-cost scoring strategies dispatched by
//! `deployment_algorithm` (§4.4.4): `latency`, `money`, `green`,
//! `best-first`, `worst`. `random` and `grasp` have their own modules since
//! they aren't plain [`CostModel`] implementations.

pub mod grasp;
pub mod random;

use crate::beam::CostModel;
use crate::collect::{Collected, NodeSnapshot};
use mycelium_types::{ActorId, NodeId, ResourceDemand};
use std::collections::{HashMap, HashSet};

fn pair_cost(collected: &Collected, a: NodeId, b: NodeId, weight: impl Fn(u64, u64) -> f64) -> f64 {
    if a == b {
        return 0.0;
    }
    let key = if a.uuid() <= b.uuid() { (a, b) } else { (b, a) };
    collected.phys_links.get(&key).map(|l| weight(l.bandwidth, l.latency)).unwrap_or(0.0)
}

fn demand_of(demand: &HashMap<ActorId, ResourceDemand>, actor: ActorId) -> ResourceDemand {
    demand.get(&actor).copied().unwrap_or_default()
}

fn snapshot_of(nodes: &HashMap<NodeId, NodeSnapshot>, node: NodeId) -> NodeSnapshot {
    nodes.get(&node).copied().unwrap_or_default()
}

/// Minimize total link latency over used physical links (§4.4.4 `latency`).
pub struct LatencyModel<'a> {
    pub collected: &'a Collected,
}

impl CostModel for LatencyModel<'_> {
    fn actor_node_cost(&self, _actor: ActorId, _node: NodeId) -> f64 {
        0.0
    }

    fn link_pair_cost(&self, a: NodeId, b: NodeId) -> f64 {
        pair_cost(self.collected, a, b, |_bw, latency| latency as f64)
    }
}

/// Minimize `Σ (cpu_demand·cost_cpu + ram_demand·cost_ram)` per node plus
/// bandwidth × a fixed unit cost (§4.4.4 `money`).
pub struct MoneyModel<'a> {
    pub collected: &'a Collected,
    pub bandwidth_unit_cost: f64,
}

impl CostModel for MoneyModel<'_> {
    fn actor_node_cost(&self, actor: ActorId, node: NodeId) -> f64 {
        let d = demand_of(&self.collected.resource_demand, actor);
        let s = snapshot_of(&self.collected.nodes, node);
        d.cpu * s.cost_cpu + d.ram * s.cost_ram
    }

    fn link_pair_cost(&self, a: NodeId, b: NodeId) -> f64 {
        let unit = self.bandwidth_unit_cost;
        pair_cost(self.collected, a, b, move |bw, _latency| bw as f64 * unit)
    }
}

/// Minimize the number of runtimes newly activated by this application
/// (§4.4.4 `green`): reuse nodes already "warm" from another application.
pub struct GreenModel<'a> {
    pub collected: &'a Collected,
    pub warm_nodes: &'a HashSet<NodeId>,
}

impl CostModel for GreenModel<'_> {
    fn actor_node_cost(&self, _actor: ActorId, node: NodeId) -> f64 {
        let _ = &self.collected;
        if self.warm_nodes.contains(&node) {
            0.0
        } else {
            1.0
        }
    }

    fn finalize(&self, option: &HashMap<ActorId, NodeId>, _accumulated: f64) -> f64 {
        let distinct_new: HashSet<NodeId> =
            option.values().copied().filter(|n| !self.warm_nodes.contains(n)).collect();
        distinct_new.len() as f64
    }
}

/// `Σ (cpu_demand/available_cpu + ram_demand/available_ram + link_cost)`,
/// truncated to a beam of `deployment_n_samples` (§4.4.4 `best-first`).
pub struct BestFirstModel<'a> {
    pub collected: &'a Collected,
}

impl CostModel for BestFirstModel<'_> {
    fn actor_node_cost(&self, actor: ActorId, node: NodeId) -> f64 {
        let d = demand_of(&self.collected.resource_demand, actor);
        let s = snapshot_of(&self.collected.nodes, node);
        let cpu_term = if s.cpu_avail > 0.0 { d.cpu / s.cpu_avail } else { d.cpu };
        let ram_term = if s.ram_avail > 0.0 { d.ram / s.ram_avail } else { d.ram };
        cpu_term + ram_term
    }

    fn link_pair_cost(&self, a: NodeId, b: NodeId) -> f64 {
        pair_cost(self.collected, a, b, |_bw, latency| latency as f64 / 1000.0)
    }
}

/// Same terms as `best-first`, reversed sign — exists for testing the
/// scoring pipeline against its own worst case (§4.4.4 `worst`).
pub struct WorstModel<'a> {
    pub inner: BestFirstModel<'a>,
}

impl CostModel for WorstModel<'_> {
    fn actor_node_cost(&self, actor: ActorId, node: NodeId) -> f64 {
        -self.inner.actor_node_cost(actor, node)
    }

    fn link_pair_cost(&self, a: NodeId, b: NodeId) -> f64 {
        -self.inner.link_pair_cost(a, b)
    }
}
