//! Migration-mode policies applied once a beam has been scored (§4.4.7):
//! epsilon-greedy explore, the lazy resource refresh (fetched through a
//! trait rather than an `hyper` client — the node's REST surface lives in
//! a different crate), and batch write-back.

use crate::beam::BeamEntry;
use crate::collect::NodeSnapshot;
use async_trait::async_trait;
use mycelium_monitor::{CpuMonitor, RamMonitor};
use mycelium_registry::Registry;
use mycelium_types::NodeId;
use rand::Rng;
use std::collections::HashMap;

/// Abstracts the `GET .../node/resource` round trip so this crate never
/// needs to depend on an HTTP client directly; `mycelium-node` supplies the
/// real implementation, tests supply a stub.
#[async_trait]
pub trait ResourceProbe {
    async fn probe(&self, node: NodeId) -> Option<(f64, f64)>;
}

/// With probability `epsilon`, replace the best-scoring beam entry with a
/// uniformly random one — keeps the bandit layer from starving alternative
/// placements once a good option is found (§4.4.7 "greedy/explore").
pub fn explore(beam: &[BeamEntry], epsilon: f64) -> Option<&BeamEntry> {
    if beam.is_empty() {
        return None;
    }
    let mut rng = rand::thread_rng();
    if rng.gen::<f64>() < epsilon {
        beam.get(rng.gen_range(0..beam.len()))
    } else {
        beam.first()
    }
}

/// Re-query every target node's live CPU/RAM availability before the
/// placement is finalized, retrying missing responses once per second.
/// `max_attempts` bounds the retry loop since this crate cannot sleep
/// forever waiting on a node that's gone.
pub async fn refresh_targets<P: ResourceProbe>(
    probe: &P,
    nodes: &mut HashMap<NodeId, NodeSnapshot>,
    targets: impl IntoIterator<Item = NodeId>,
    max_attempts: u32,
) {
    for node in targets {
        for attempt in 0..max_attempts.max(1) {
            if let Some((cpu_avail, ram_avail)) = probe.probe(node).await {
                nodes.entry(node).and_modify(|s| {
                    s.cpu_avail = cpu_avail;
                    s.ram_avail = ram_avail;
                });
                break;
            }
            if attempt + 1 < max_attempts {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}

/// When the `batch` flag is set, write the expected post-placement CPU/RAM
/// straight into the Registry instead of waiting for the real monitors to
/// observe it (§4.1, §4.4.7 "batch").
pub async fn write_back<R: Registry>(
    registry: std::sync::Arc<R>,
    placement: &HashMap<NodeId, (f64, f64)>,
    totals: &HashMap<NodeId, (f64, f64)>,
) -> mycelium_core::Result<()> {
    for (&node, &(cpu_avail, ram_avail)) in placement {
        let (cpu_total, ram_total) = totals.get(&node).copied().unwrap_or((0.0, 0.0));
        let cpu = CpuMonitor::new(registry.clone(), node);
        let ram = RamMonitor::new(registry.clone(), node);
        let cpu_pct = if cpu_total > 0.0 { (cpu_avail / cpu_total * 100.0).clamp(0.0, 100.0) } else { 0.0 };
        let ram_pct = if ram_total > 0.0 { (ram_avail / ram_total * 100.0).clamp(0.0, 100.0) } else { 0.0 };
        cpu.force_set_avail(cpu_pct).await?;
        ram.force_set_avail(ram_pct).await?;
    }
    Ok(())
}

/// `move=true` cost inflation (§4.6): the node an actor currently occupies
/// gets its cost artificially raised by `2·(max_cpu_cost+max_ram_cost)` so a
/// migration only moves an actor when doing so is unambiguously cheaper,
/// not merely tied, with staying put.
pub fn move_bias(nodes: &HashMap<NodeId, NodeSnapshot>) -> f64 {
    let max_cpu_cost = nodes.values().map(|s| s.cost_cpu).fold(0.0, f64::max);
    let max_ram_cost = nodes.values().map(|s| s.cost_ram).fold(0.0, f64::max);
    2.0 * (max_cpu_cost + max_ram_cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycelium_types::ActorId;
    use std::collections::HashMap as Map;

    struct StubProbe {
        responses: Map<NodeId, (f64, f64)>,
    }

    #[async_trait]
    impl ResourceProbe for StubProbe {
        async fn probe(&self, node: NodeId) -> Option<(f64, f64)> {
            self.responses.get(&node).copied()
        }
    }

    #[test]
    fn explore_returns_best_when_epsilon_is_zero() {
        let a = ActorId::new();
        let n1 = NodeId::new();
        let n2 = NodeId::new();
        let beam = vec![
            BeamEntry { option: Map::from([(a, n1)]), accumulated: 1.0 },
            BeamEntry { option: Map::from([(a, n2)]), accumulated: 2.0 },
        ];
        let chosen = explore(&beam, 0.0).unwrap();
        assert_eq!(chosen.accumulated, 1.0);
    }

    #[tokio::test]
    async fn refresh_targets_updates_snapshot_from_probe() {
        let node = NodeId::new();
        let probe = StubProbe { responses: Map::from([(node, (42.0, 7.0))]) };
        let mut nodes = Map::new();
        nodes.insert(node, NodeSnapshot::default());

        refresh_targets(&probe, &mut nodes, [node], 3).await;
        assert_eq!(nodes[&node].cpu_avail, 42.0);
        assert_eq!(nodes[&node].ram_avail, 7.0);
    }

    #[test]
    fn move_bias_scales_with_the_costliest_node() {
        let n1 = NodeId::new();
        let mut nodes = Map::new();
        nodes.insert(n1, NodeSnapshot { cost_cpu: 3.0, cost_ram: 1.0, ..Default::default() });
        assert_eq!(move_bias(&nodes), 8.0);
    }
}
