//! Per-actor beam expansion shared by every scoring algorithm (§4.4.4):
//! pop the unplaced actor with the most already-placed neighbors, extend
//! every beam entry over its remaining candidates subject to link
//! feasibility, then truncate to `deployment_n_samples`.

use crate::feasibility::LinkFeasibility;
use mycelium_types::{Actor, ActorId, Link, LinkId, NodeId};
use std::collections::{HashMap, HashSet};

/// Scores and orders candidate nodes for one actor; implemented once per
/// placement algorithm (§4.4.4 random/latency/money/green/best-first/
/// worst/grasp).
pub trait CostModel {
    /// Marginal cost of placing `actor` on `node`, independent of link
    /// topology (e.g. money's `cpu_demand*cost_cpu + ram_demand*cost_ram`).
    fn actor_node_cost(&self, actor: ActorId, node: NodeId) -> f64;

    /// Marginal cost of the physical link crossed when this actor's link
    /// to an already-placed neighbor spans two different nodes.
    fn link_pair_cost(&self, a: NodeId, b: NodeId) -> f64 {
        let _ = (a, b);
        0.0
    }

    /// Final score for a complete option, given the additive sum of every
    /// `actor_node_cost`/`link_pair_cost` call made while building it.
    /// Overridden by `green`, which scores by distinct-runtime count
    /// instead of an additive total (§4.4.4).
    fn finalize(&self, option: &HashMap<ActorId, NodeId>, accumulated: f64) -> f64 {
        let _ = option;
        accumulated
    }
}

#[derive(Debug, Clone)]
pub struct BeamEntry {
    pub option: HashMap<ActorId, NodeId>,
    pub accumulated: f64,
}

fn count_placed_neighbors(actor: ActorId, links: &[Link], placed: &HashSet<ActorId>) -> usize {
    links
        .iter()
        .filter(|l| {
            (l.src_actor_id == actor && placed.contains(&l.dst_actor_id))
                || (l.dst_actor_id == actor && placed.contains(&l.src_actor_id))
        })
        .count()
}

fn neighbor_of(actor: ActorId, link: &Link) -> Option<ActorId> {
    if link.src_actor_id == actor {
        Some(link.dst_actor_id)
    } else if link.dst_actor_id == actor {
        Some(link.src_actor_id)
    } else {
        None
    }
}

fn links_to_placed_neighbors<'a>(
    actor: ActorId,
    links: &'a [Link],
    option: &HashMap<ActorId, NodeId>,
) -> Vec<(&'a Link, ActorId, NodeId)> {
    links
        .iter()
        .filter_map(|l| {
            let neighbor = neighbor_of(actor, l)?;
            let node = option.get(&neighbor)?;
            Some((l, neighbor, *node))
        })
        .collect()
}

fn feasible(
    actor: ActorId,
    node: NodeId,
    links: &[Link],
    link_feasibility: &HashMap<LinkId, LinkFeasibility>,
    option: &HashMap<ActorId, NodeId>,
) -> bool {
    links_to_placed_neighbors(actor, links, option).iter().all(|(link, _, neighbor_node)| {
        link_feasibility.get(&link.id).map_or(true, |f| f.allows(node, *neighbor_node))
    })
}

/// Run the full per-actor expansion and return the surviving beam, sorted
/// best (lowest `finalize` score) first.
pub fn expand<C: CostModel>(
    actors: &[Actor],
    links: &[Link],
    candidates: &HashMap<ActorId, HashSet<NodeId>>,
    link_feasibility: &HashMap<LinkId, LinkFeasibility>,
    cost_model: &C,
    beam_width: usize,
) -> Vec<BeamEntry> {
    let mut remaining: Vec<ActorId> = actors.iter().map(|a| a.id).collect();
    let mut beam = vec![BeamEntry { option: HashMap::new(), accumulated: 0.0 }];

    while !remaining.is_empty() {
        let placed_in_best: HashSet<ActorId> = beam.first().map(|e| e.option.keys().copied().collect()).unwrap_or_default();
        remaining.sort_by_key(|a| std::cmp::Reverse(count_placed_neighbors(*a, links, &placed_in_best)));
        let actor = remaining.remove(0);
        let empty = HashSet::new();
        let candidate_nodes = candidates.get(&actor).unwrap_or(&empty);

        let mut next_beam = Vec::new();
        for entry in &beam {
            let mut any_feasible = false;
            for &node in candidate_nodes {
                if !feasible(actor, node, links, link_feasibility, &entry.option) {
                    continue;
                }
                any_feasible = true;
                next_beam.push(extend(entry, actor, node, links, cost_model));
            }
            if !any_feasible {
                // §4.4.5: no candidate respects link feasibility against
                // this entry's already-placed neighbors. Fall back to an
                // unconstrained placement; the caller collapses endpoints
                // of any application link left infeasible after scoring.
                for &node in candidate_nodes {
                    next_beam.push(extend(entry, actor, node, links, cost_model));
                }
            }
        }

        if next_beam.is_empty() {
            // No candidate at all for this actor: carry the beam forward
            // unplaced rather than discarding every in-progress option.
            continue;
        }

        next_beam.sort_by(|a, b| {
            cost_model
                .finalize(&a.option, a.accumulated)
                .partial_cmp(&cost_model.finalize(&b.option, b.accumulated))
                .unwrap()
        });
        next_beam.truncate(beam_width.max(1));
        beam = next_beam;
    }

    beam.sort_by(|a, b| {
        cost_model
            .finalize(&a.option, a.accumulated)
            .partial_cmp(&cost_model.finalize(&b.option, b.accumulated))
            .unwrap()
    });
    beam
}

fn extend<C: CostModel>(entry: &BeamEntry, actor: ActorId, node: NodeId, links: &[Link], cost_model: &C) -> BeamEntry {
    let mut option = entry.option.clone();
    let mut accumulated = entry.accumulated + cost_model.actor_node_cost(actor, node);
    for (_, _, neighbor_node) in links_to_placed_neighbors(actor, links, &option) {
        accumulated += cost_model.link_pair_cost(node, neighbor_node);
    }
    option.insert(actor, node);
    BeamEntry { option, accumulated }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatCost;
    impl CostModel for FlatCost {
        fn actor_node_cost(&self, _actor: ActorId, _node: NodeId) -> f64 {
            1.0
        }
    }

    #[test]
    fn expand_produces_one_entry_per_reachable_combination() {
        let a1 = Actor::new("ns:a:0", "t");
        let a2 = Actor::new("ns:b:0", "t");
        let n1 = NodeId::new();
        let n2 = NodeId::new();
        let mut candidates = HashMap::new();
        candidates.insert(a1.id, HashSet::from([n1, n2]));
        candidates.insert(a2.id, HashSet::from([n1, n2]));

        let beam = expand(&[a1, a2], &[], &candidates, &HashMap::new(), &FlatCost, 10);
        assert_eq!(beam.len(), 4);
        assert!(beam.iter().all(|e| (e.accumulated - 2.0).abs() < 1e-9));
    }

    #[test]
    fn beam_is_truncated_to_requested_width() {
        let a1 = Actor::new("ns:a:0", "t");
        let a2 = Actor::new("ns:b:0", "t");
        let nodes: Vec<NodeId> = (0..5).map(|_| NodeId::new()).collect();
        let mut candidates = HashMap::new();
        candidates.insert(a1.id, nodes.iter().copied().collect());
        candidates.insert(a2.id, nodes.iter().copied().collect());

        let beam = expand(&[a1, a2], &[], &candidates, &HashMap::new(), &FlatCost, 3);
        assert!(beam.len() <= 3);
    }

    #[test]
    fn infeasible_link_is_skipped_in_favor_of_the_fallback_pass() {
        let a1 = Actor::new("ns:a:0", "t");
        let a2 = Actor::new("ns:b:0", "t");
        let link = Link {
            id: LinkId::new(),
            name: "a->b".to_string(),
            src_actor_id: a1.id,
            dst_actor_id: a2.id,
            requirements: vec![],
        };
        let n1 = NodeId::new();
        let n2 = NodeId::new();
        let mut candidates = HashMap::new();
        candidates.insert(a1.id, HashSet::from([n1]));
        candidates.insert(a2.id, HashSet::from([n2]));

        let mut feasibility = HashMap::new();
        feasibility.insert(link.id, LinkFeasibility::Pairs(HashSet::new()));

        let beam = expand(&[a1, a2], &[link], &candidates, &feasibility, &FlatCost, 10);
        // No pair is feasible, so the fallback pass still produces an
        // option (caller is responsible for endpoint collapse).
        assert_eq!(beam.len(), 1);
    }
}
