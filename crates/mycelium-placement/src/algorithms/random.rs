//! `deployment_algorithm = "random"` (§4.4.4): sample `deployment_n_samples`
//! independent placements, each actor drawn uniformly from its candidate
//! set, respecting link feasibility against that same walk's earlier picks.
//! No cost optimization — the beam's score is only used to break ties
//! between samples that are otherwise equally valid.

use crate::beam::BeamEntry;
use crate::feasibility::LinkFeasibility;
use mycelium_types::{Actor, ActorId, Link, LinkId, NodeId};
use rand::seq::IteratorRandom;
use rand::thread_rng;
use std::collections::{HashMap, HashSet};

fn neighbor_of(actor: ActorId, link: &Link) -> Option<ActorId> {
    if link.src_actor_id == actor {
        Some(link.dst_actor_id)
    } else if link.dst_actor_id == actor {
        Some(link.src_actor_id)
    } else {
        None
    }
}

fn feasible_choice(
    actor: ActorId,
    links: &[Link],
    link_feasibility: &HashMap<LinkId, LinkFeasibility>,
    option: &HashMap<ActorId, NodeId>,
    node: NodeId,
) -> bool {
    links.iter().all(|l| {
        let Some(neighbor) = neighbor_of(actor, l) else { return true };
        let Some(&neighbor_node) = option.get(&neighbor) else { return true };
        link_feasibility.get(&l.id).map_or(true, |f| f.allows(node, neighbor_node))
    })
}

fn one_walk(
    actors: &[Actor],
    links: &[Link],
    candidates: &HashMap<ActorId, HashSet<NodeId>>,
    link_feasibility: &HashMap<LinkId, LinkFeasibility>,
) -> Option<BeamEntry> {
    let mut rng = thread_rng();
    let mut option = HashMap::new();
    for actor in actors {
        let empty = HashSet::new();
        let pool = candidates.get(&actor.id).unwrap_or(&empty);
        let feasible: Vec<NodeId> = pool
            .iter()
            .copied()
            .filter(|&n| feasible_choice(actor.id, links, link_feasibility, &option, n))
            .collect();
        let chosen = feasible.iter().choose(&mut rng).or_else(|| pool.iter().choose(&mut rng))?;
        option.insert(actor.id, *chosen);
    }
    Some(BeamEntry { option, accumulated: 0.0 })
}

pub fn sample(
    actors: &[Actor],
    links: &[Link],
    candidates: &HashMap<ActorId, HashSet<NodeId>>,
    link_feasibility: &HashMap<LinkId, LinkFeasibility>,
    n_samples: usize,
) -> Vec<BeamEntry> {
    (0..n_samples.max(1)).filter_map(|_| one_walk(actors, links, candidates, link_feasibility)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sample_places_every_actor() {
        let a1 = Actor::new("ns:a:0", "t");
        let a2 = Actor::new("ns:b:0", "t");
        let n1 = NodeId::new();
        let n2 = NodeId::new();
        let mut candidates = HashMap::new();
        candidates.insert(a1.id, HashSet::from([n1, n2]));
        candidates.insert(a2.id, HashSet::from([n1, n2]));

        let samples = sample(&[a1.clone(), a2.clone()], &[], &candidates, &HashMap::new(), 5);
        assert_eq!(samples.len(), 5);
        for entry in &samples {
            assert_eq!(entry.option.len(), 2);
            assert!(entry.option.contains_key(&a1.id));
            assert!(entry.option.contains_key(&a2.id));
        }
    }

    #[test]
    fn actor_with_no_candidates_yields_no_sample() {
        let a1 = Actor::new("ns:a:0", "t");
        let candidates = HashMap::new();
        let samples = sample(&[a1], &[], &candidates, &HashMap::new(), 3);
        assert!(samples.is_empty());
    }
}
