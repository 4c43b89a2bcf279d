//! GRASP (§4.4.4 `grasp`, variants `v0`/`v1`/`v2`): greedy-randomized
//! restricted-candidate-list construction, then 0/1/10 rounds of swap-based
//! local search with a load-balance tiebreak.

use crate::beam::{BeamEntry, CostModel};
use crate::feasibility::LinkFeasibility;
use mycelium_config::GraspVariant;
use mycelium_types::{Actor, ActorId, Link, LinkId, NodeId};
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::collections::{HashMap, HashSet};

const MAX_SWAP_ROUNDS: usize = 10;

fn neighbor_of(actor: ActorId, link: &Link) -> Option<ActorId> {
    if link.src_actor_id == actor {
        Some(link.dst_actor_id)
    } else if link.dst_actor_id == actor {
        Some(link.src_actor_id)
    } else {
        None
    }
}

fn feasible(
    actor: ActorId,
    node: NodeId,
    links: &[Link],
    link_feasibility: &HashMap<LinkId, LinkFeasibility>,
    option: &HashMap<ActorId, NodeId>,
) -> bool {
    links.iter().all(|l| {
        let Some(neighbor) = neighbor_of(actor, l) else { return true };
        let Some(&neighbor_node) = option.get(&neighbor) else { return true };
        link_feasibility.get(&l.id).map_or(true, |f| f.allows(node, neighbor_node))
    })
}

fn marginal_cost<C: CostModel>(
    cost_model: &C,
    actor: ActorId,
    node: NodeId,
    links: &[Link],
    option: &HashMap<ActorId, NodeId>,
) -> f64 {
    let mut cost = cost_model.actor_node_cost(actor, node);
    for l in links {
        if let Some(neighbor) = neighbor_of(actor, l) {
            if let Some(&neighbor_node) = option.get(&neighbor) {
                cost += cost_model.link_pair_cost(node, neighbor_node);
            }
        }
    }
    cost
}

/// Greedy-randomized construction: at each step pick the next actor
/// (ordered by candidate-set size, smallest first, to place the most
/// constrained actors early) and draw uniformly from its restricted
/// candidate list — the `rcl_size` cheapest feasible nodes.
fn construct<C: CostModel>(
    actors: &[Actor],
    links: &[Link],
    candidates: &HashMap<ActorId, HashSet<NodeId>>,
    link_feasibility: &HashMap<LinkId, LinkFeasibility>,
    cost_model: &C,
    rcl_size: usize,
) -> BeamEntry {
    let mut rng = thread_rng();
    let mut order: Vec<ActorId> = actors.iter().map(|a| a.id).collect();
    order.sort_by_key(|id| candidates.get(id).map(|s| s.len()).unwrap_or(0));

    let mut option = HashMap::new();
    let mut accumulated = 0.0;
    for actor in order {
        let empty = HashSet::new();
        let pool = candidates.get(&actor).unwrap_or(&empty);
        let mut scored: Vec<(NodeId, f64)> = pool
            .iter()
            .copied()
            .filter(|&n| feasible(actor, n, links, link_feasibility, &option))
            .map(|n| (n, marginal_cost(cost_model, actor, n, links, &option)))
            .collect();
        if scored.is_empty() {
            scored = pool.iter().copied().map(|n| (n, marginal_cost(cost_model, actor, n, links, &option))).collect();
        }
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        scored.truncate(rcl_size.max(1));

        let Some(&(node, cost)) = scored.choose(&mut rng) else { continue };
        option.insert(actor, node);
        accumulated += cost;
    }
    BeamEntry { option, accumulated }
}

/// Per-node load, used as the v2 tiebreak ("prefer the swap that improves
/// the worst-loaded runtime's actor count").
fn load_spread(option: &HashMap<ActorId, NodeId>) -> i64 {
    let mut counts: HashMap<NodeId, i64> = HashMap::new();
    for node in option.values() {
        *counts.entry(*node).or_insert(0) += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    let min = counts.values().copied().min().unwrap_or(0);
    max - min
}

/// One local-search pass: try moving each actor to each of its other
/// candidates, keep the move if it strictly improves `finalize` (ties
/// broken by `load_spread` when `balance` is set).
fn swap_pass<C: CostModel>(
    entry: &mut BeamEntry,
    actors: &[Actor],
    links: &[Link],
    candidates: &HashMap<ActorId, HashSet<NodeId>>,
    link_feasibility: &HashMap<LinkId, LinkFeasibility>,
    cost_model: &C,
    balance: bool,
) -> bool {
    let mut improved = false;
    for actor in actors {
        let empty = HashSet::new();
        let pool = candidates.get(&actor.id).unwrap_or(&empty);
        let current_node = entry.option.get(&actor.id).copied();
        let best = pool
            .iter()
            .copied()
            .filter(|&n| Some(n) != current_node)
            .filter(|&n| feasible(actor.id, n, links, link_feasibility, &entry.option))
            .min_by(|&a, &b| {
                marginal_cost(cost_model, actor.id, a, links, &entry.option)
                    .partial_cmp(&marginal_cost(cost_model, actor.id, b, links, &entry.option))
                    .unwrap()
            });

        let Some(candidate_node) = best else { continue };
        let mut trial = entry.option.clone();
        trial.insert(actor.id, candidate_node);
        let current_score = cost_model.finalize(&entry.option, entry.accumulated);
        let trial_accumulated = entry.accumulated
            - current_node.map(|n| marginal_cost(cost_model, actor.id, n, links, &entry.option)).unwrap_or(0.0)
            + marginal_cost(cost_model, actor.id, candidate_node, links, &trial);
        let trial_score = cost_model.finalize(&trial, trial_accumulated);

        let take = trial_score < current_score
            || (balance && (trial_score - current_score).abs() < 1e-9 && load_spread(&trial) < load_spread(&entry.option));
        if take {
            entry.option = trial;
            entry.accumulated = trial_accumulated;
            improved = true;
        }
    }
    improved
}

pub fn run<C: CostModel>(
    actors: &[Actor],
    links: &[Link],
    candidates: &HashMap<ActorId, HashSet<NodeId>>,
    link_feasibility: &HashMap<LinkId, LinkFeasibility>,
    cost_model: &C,
    variant: GraspVariant,
    rcl_size: usize,
    n_samples: usize,
) -> Vec<BeamEntry> {
    (0..n_samples.max(1))
        .map(|_| {
            let mut entry = construct(actors, links, candidates, link_feasibility, cost_model, rcl_size);
            match variant {
                GraspVariant::V0 => {}
                GraspVariant::V1 => {
                    swap_pass(&mut entry, actors, links, candidates, link_feasibility, cost_model, false);
                }
                GraspVariant::V2 => {
                    for _ in 0..MAX_SWAP_ROUNDS {
                        if !swap_pass(&mut entry, actors, links, candidates, link_feasibility, cost_model, true) {
                            break;
                        }
                    }
                }
            }
            entry
        })
        .collect()
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
    fn v0_places_every_actor_without_local_search() {
        let a1 = Actor::new("ns:a:0", "t");
        let a2 = Actor::new("ns:b:0", "t");
        let nodes: Vec<NodeId> = (0..3).map(|_| NodeId::new()).collect();
        let mut candidates = HashMap::new();
        candidates.insert(a1.id, nodes.iter().copied().collect());
        candidates.insert(a2.id, nodes.iter().copied().collect());

        let results = run(&[a1.clone(), a2.clone()], &[], &candidates, &HashMap::new(), &FlatCost, GraspVariant::V0, 2, 4);
        assert_eq!(results.len(), 4);
        for entry in &results {
            assert_eq!(entry.option.len(), 2);
        }
    }

    #[test]
    fn v2_converges_without_looping_forever() {
        let actors: Vec<Actor> = (0..4).map(|i| Actor::new(&format!("ns:a:{i}"), "t")).collect();
        let nodes: Vec<NodeId> = (0..2).map(|_| NodeId::new()).collect();
        let mut candidates = HashMap::new();
        for a in &actors {
            candidates.insert(a.id, nodes.iter().copied().collect());
        }
        let results = run(&actors, &[], &candidates, &HashMap::new(), &FlatCost, GraspVariant::V2, 2, 1);
        assert_eq!(results[0].option.len(), 4);
    }
}
