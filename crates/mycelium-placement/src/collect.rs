//! Collection phase (§4.3): parallel Registry reads for every actor, link,
//! and candidate node, converging via `join_all` instead of a hand-rolled
//! callback counter (§9 "pervasive callback chains").

use crate::feasibility::{normalize_pair, LinkFeasibility};
use futures::future::join_all;
use mycelium_registry::Registry;
use mycelium_types::{
    Actor, ActorId, Candidates, Link, LinkId, Node, NodeId, PhysLinkId, PhysicalLink, Requirement,
    ResourceDemand,
};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default)]
pub struct NodeSnapshot {
    /// Absolute available CPU, mips (`nodeCpu-`).
    pub cpu_avail: f64,
    /// Absolute available RAM, bytes (`nodeRam-`).
    pub ram_avail: f64,
    pub cpu_total: f64,
    pub ram_total: f64,
    pub cost_cpu: f64,
    pub cost_ram: f64,
}

#[derive(Debug, Clone)]
pub enum LinkCandidates {
    Universe,
    Set(Vec<PhysLinkId>),
}

pub struct Collected {
    pub actor_candidates: HashMap<ActorId, Candidates>,
    pub resource_demand: HashMap<ActorId, ResourceDemand>,
    pub link_candidates: HashMap<LinkId, LinkCandidates>,
    pub link_feasibility: HashMap<LinkId, LinkFeasibility>,
    pub nodes: HashMap<NodeId, NodeSnapshot>,
    /// Bandwidth/latency between every pair of candidate nodes that already
    /// has a physical link, keyed by the normalized pair (§4.4.4 cost
    /// models read this instead of re-querying the registry per score).
    pub phys_links: HashMap<(NodeId, NodeId), PhysicalLink>,
    pub batch: bool,
}

/// Matches `LinkMonitor`'s canonical `rt-link-` key ordering so the same
/// physical link is found regardless of which endpoint is queried first.
fn rt_key(a: NodeId, b: NodeId) -> String {
    if a.uuid() <= b.uuid() {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}

async fn all_nodes<R: Registry>(registry: &R) -> Vec<NodeId> {
    registry
        .get_index(&["node".into(), "all".into()], 0)
        .await
        .into_iter()
        .filter_map(|s| s.parse().ok())
        .collect()
}

async fn get_f64<R: Registry>(registry: &R, prefix: &str, key: &str) -> f64 {
    // NOT_FOUND treated as value=0 for resource totals (§7).
    registry.get(prefix, key).await.ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
}

async fn node_costs<R: Registry>(registry: &R, id: NodeId) -> (f64, f64) {
    let Ok(raw) = registry.get("node-", &id.to_string()).await else {
        return (0.0, 0.0);
    };
    let Ok(node) = serde_json::from_value::<Node>(raw) else {
        return (0.0, 0.0);
    };
    let cost_cpu = node.attributes.public.get("cost_cpu").and_then(|v| v.parse().ok()).unwrap_or(0.0);
    let cost_ram = node.attributes.public.get("cost_ram").and_then(|v| v.parse().ok()).unwrap_or(0.0);
    (cost_cpu, cost_ram)
}

async fn node_snapshot<R: Registry>(registry: &R, id: NodeId) -> NodeSnapshot {
    let (cost_cpu, cost_ram) = node_costs(registry, id).await;
    NodeSnapshot {
        cpu_avail: get_f64(registry, "nodeCpu-", &id.to_string()).await,
        ram_avail: get_f64(registry, "nodeRam-", &id.to_string()).await,
        cpu_total: get_f64(registry, "nodeCpuTotal-", &id.to_string()).await,
        ram_total: get_f64(registry, "nodeMemTotal-", &id.to_string()).await,
        cost_cpu,
        cost_ram,
    }
}

/// Sum `node_resource_min` clauses anywhere in the (possibly nested) tree,
/// per §3 "cumulative resource demand (sum of node_resource_min.cpu/ram
/// over the actor's requirements)".
fn resource_demand(requirements: &[Requirement]) -> ResourceDemand {
    fn walk(req: &Requirement, acc: &mut ResourceDemand) {
        match req {
            Requirement::NodeResourceMin { resource } => {
                acc.cpu += resource.get("cpu").copied().unwrap_or(0.0);
                acc.ram += resource.get("ram").copied().unwrap_or(0.0);
            }
            Requirement::Composite { requirements } => {
                for r in requirements {
                    walk(r, acc);
                }
            }
            _ => {}
        }
    }
    let mut acc = ResourceDemand::default();
    for req in requirements {
        walk(req, &mut acc);
    }
    acc
}

fn attr_index_path(root: &str, index: &BTreeMap<String, String>) -> Vec<String> {
    let mut path = vec![root.to_string(), "attribute".to_string()];
    for (k, v) in index {
        path.push(k.clone());
        path.push(v.clone());
    }
    path
}

async fn link_candidates<R: Registry>(registry: &R, link: &Link) -> LinkCandidates {
    let attr_clauses: Vec<&BTreeMap<String, String>> = link
        .requirements
        .iter()
        .filter_map(|r| match r {
            Requirement::LinkAttrMatch { index } => Some(index),
            _ => None,
        })
        .collect();
    if attr_clauses.is_empty() {
        return LinkCandidates::Universe;
    }

    let mut acc: Option<HashSet<PhysLinkId>> = None;
    for index in attr_clauses {
        let path = attr_index_path("link", index);
        let found = registry.get_index(&path, 2).await;
        let ids: HashSet<PhysLinkId> = found.into_iter().filter_map(|s| s.parse().ok()).collect();
        acc = Some(match acc {
            None => ids,
            Some(prev) => prev.intersection(&ids).copied().collect(),
        });
    }
    LinkCandidates::Set(acc.unwrap_or_default().into_iter().collect())
}

async fn link_feasibility<R: Registry>(registry: &R, candidates: &LinkCandidates) -> LinkFeasibility {
    match candidates {
        LinkCandidates::Universe => LinkFeasibility::Universe,
        LinkCandidates::Set(ids) => {
            let mut pairs = HashSet::new();
            for &id in ids {
                if let Ok(raw) = registry.get("phyLink-", &id.to_string()).await {
                    if let Ok(link) = serde_json::from_value::<PhysicalLink>(raw) {
                        pairs.insert(normalize_pair(link.runtime1, link.runtime2));
                    }
                }
            }
            LinkFeasibility::Pairs(pairs)
        }
    }
}

/// Gather every Registry read the decide phase needs, fanned out in
/// parallel and converging only once every future resolves (§4.3).
pub async fn collect<R: Registry>(
    registry: &R,
    actors: &[Actor],
    actor_requirements: &HashMap<ActorId, Vec<Requirement>>,
    links: &[Link],
) -> Collected {
    let empty = Vec::new();
    let actor_futs = actors.iter().map(|actor| {
        let requirements = actor_requirements.get(&actor.id).unwrap_or(&empty);
        async move {
            let candidates = mycelium_matcher::evaluate_all(requirements, registry).await;
            let demand = resource_demand(requirements);
            (actor.id, candidates, demand)
        }
    });
    let actor_results = join_all(actor_futs).await;

    let mut universe: HashSet<NodeId> = HashSet::new();
    for (_, candidates, _) in &actor_results {
        if let Candidates::Set(s) = candidates {
            universe.extend(s.iter().copied());
        }
    }
    if universe.is_empty() {
        universe.extend(all_nodes(registry).await);
    }

    let node_futs = universe.iter().map(|&id| async move { (id, node_snapshot(registry, id).await) });
    let nodes: HashMap<NodeId, NodeSnapshot> = join_all(node_futs).await.into_iter().collect();

    let universe_vec: Vec<NodeId> = universe.iter().copied().collect();
    let mut pair_futs = Vec::new();
    for (i, &a) in universe_vec.iter().enumerate() {
        for &b in &universe_vec[i + 1..] {
            pair_futs.push(async move {
                let key = rt_key(a, b);
                let found = registry
                    .get("rt-link-", &key)
                    .await
                    .ok()
                    .and_then(|v| v.as_str().and_then(|s| s.parse::<PhysLinkId>().ok()));
                match found {
                    Some(id) => {
                        let raw = registry.get("phyLink-", &id.to_string()).await.ok()?;
                        serde_json::from_value::<PhysicalLink>(raw).ok().map(|link| (normalize_pair(a, b), link))
                    }
                    None => None,
                }
            });
        }
    }
    let phys_links: HashMap<(NodeId, NodeId), PhysicalLink> = join_all(pair_futs).await.into_iter().flatten().collect();

    let link_futs = links.iter().map(|link| async move {
        let candidates = link_candidates(registry, link).await;
        let feasibility = link_feasibility(registry, &candidates).await;
        (link.id, candidates, feasibility)
    });
    let link_results = join_all(link_futs).await;

    let mut actor_candidates = HashMap::new();
    let mut resource_demand_map = HashMap::new();
    for (id, candidates, demand) in actor_results {
        actor_candidates.insert(id, candidates);
        resource_demand_map.insert(id, demand);
    }

    let mut link_candidates_map = HashMap::new();
    let mut link_feasibility_map = HashMap::new();
    for (id, candidates, feasibility) in link_results {
        link_candidates_map.insert(id, candidates);
        link_feasibility_map.insert(id, feasibility);
    }

    Collected {
        actor_candidates,
        resource_demand: resource_demand_map,
        link_candidates: link_candidates_map,
        link_feasibility: link_feasibility_map,
        nodes,
        phys_links,
        batch: registry.batch().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycelium_registry::InMemoryRegistry;
    use serde_json::json;

    #[tokio::test]
    async fn resource_demand_sums_nested_clauses() {
        let req = Requirement::Composite {
            requirements: vec![
                Requirement::NodeResourceMin { resource: BTreeMap::from([("cpu".to_string(), 10.0)]) },
                Requirement::NodeResourceMin { resource: BTreeMap::from([("cpu".to_string(), 5.0), ("ram".to_string(), 2.0)]) },
            ],
        };
        let demand = resource_demand(&[req]);
        assert_eq!(demand.cpu, 15.0);
        assert_eq!(demand.ram, 2.0);
    }

    #[tokio::test]
    async fn link_without_attr_requirements_is_universe() {
        let registry = InMemoryRegistry::new();
        let link = Link {
            id: LinkId::new(),
            name: "a->b".to_string(),
            src_actor_id: ActorId::new(),
            dst_actor_id: ActorId::new(),
            requirements: vec![],
        };
        let candidates = link_candidates(&registry, &link).await;
        assert!(matches!(candidates, LinkCandidates::Universe));
    }

    #[tokio::test]
    async fn collect_fetches_snapshot_for_every_candidate_node() {
        let registry = InMemoryRegistry::new();
        let actor = Actor::new("ns:a:0", "component");
        let n1 = NodeId::new();
        registry
            .add_index(&["node".into(), "attribute".into(), "name".into(), "n1".into()], &n1.to_string(), 2)
            .await;
        registry.set("nodeCpu-", &n1.to_string(), json!(500)).await.unwrap();

        let mut requirements = HashMap::new();
        requirements.insert(
            actor.id,
            vec![Requirement::NodeAttrMatch { index: BTreeMap::from([("name".to_string(), "n1".to_string())]) }],
        );

        let collected = collect(&registry, &[actor.clone()], &requirements, &[]).await;
        assert_eq!(collected.actor_candidates[&actor.id], Candidates::of([n1]));
        assert_eq!(collected.nodes[&n1].cpu_avail, 500.0);
    }
}
