//! RequirementMatcher (§4.2): evaluates requirement clauses against the
//! Registry and produces candidate node/link sets.
//!
//! `node_resource_min`'s "eager-filtered but asynchronously produced" fan-out
//! (§4.2) is implemented with `futures::future::join_all` per §9's redesign
//! note — one read per node, a single join point instead of a hand-rolled
//! completion counter.

use futures::future::join_all;
use mycelium_registry::Registry;
use mycelium_types::{Candidates, NodeId, Requirement};
use std::collections::BTreeMap;
use tracing::trace;

/// All currently registered nodes, as published under `['node','all']` by
/// node registration (§6 `node-` lifecycle). Node registration is expected
/// to call `add_index(['node','all'], node_id, 0)` on startup and remove it
/// on de-registration.
async fn all_nodes(registry: &impl Registry) -> Vec<NodeId> {
    registry
        .get_index(&["node".into(), "all".into()], 0)
        .await
        .into_iter()
        .filter_map(|s| s.parse().ok())
        .collect()
}

fn attr_index_path(root: &str, index: &BTreeMap<String, String>) -> Vec<String> {
    let mut path = vec![root.to_string(), "attribute".to_string()];
    for (k, v) in index {
        path.push(k.clone());
        path.push(v.clone());
    }
    path
}

/// Evaluate one requirement clause (already flattened of one level of
/// `Composite`) into a candidate set.
pub async fn evaluate(requirement: &Requirement, registry: &impl Registry) -> Candidates {
    match requirement {
        Requirement::NodeAttrMatch { index } => {
            let path = attr_index_path("node", index);
            let found = registry.get_index(&path, 2).await;
            Candidates::of(found.into_iter().filter_map(|s| s.parse().ok()))
        }

        Requirement::LinkAttrMatch { index } => {
            // Candidate *links*, but represented through the same
            // `Candidates` shape so the planner's intersection logic is
            // uniform; callers interpret the ids as phys-link ids here.
            let path = attr_index_path("link", index);
            let found = registry.get_index(&path, 2).await;
            Candidates::of(found.into_iter().filter_map(|s| s.parse().ok()))
        }

        Requirement::NodeResourceMin { resource } => {
            let nodes = all_nodes(registry).await;
            let checks = nodes.into_iter().map(|node| {
                let resource = resource.clone();
                async move {
                    let mut ok = true;
                    for (key, &min) in &resource {
                        let prefix = match key.as_str() {
                            "cpu" => "nodeCpu-",
                            "ram" => "nodeRam-",
                            _ => {
                                trace!(key, "unknown resource key in node_resource_min");
                                continue;
                            }
                        };
                        let value = registry
                            .get(prefix, &node.to_string())
                            .await
                            .ok()
                            .and_then(|v| v.as_f64())
                            .unwrap_or(0.0);
                        if value < min {
                            ok = false;
                            break;
                        }
                    }
                    ok.then_some(node)
                }
            });
            // join_all resolves only once every outstanding per-node read
            // has returned — the "final" signal of §4.2 is implicit.
            let results = join_all(checks).await;
            Candidates::of(results.into_iter().flatten())
        }

        Requirement::Replication { .. } => {
            // Handled by the replication supervisor, excluded from
            // placement (§3): contributes no restriction.
            Candidates::Universe
        }

        Requirement::Composite { requirements } => {
            let mut acc = Candidates::Universe;
            for child in requirements {
                let child_result = Box::pin(evaluate(child, registry)).await;
                acc = acc.intersect(&child_result);
            }
            acc
        }
    }
}

/// Evaluate a full requirement list for one actor, intersecting every
/// clause's result (§4.2 composite semantics apply transitively to a flat
/// list too — the planner always calls this, never `evaluate` directly).
pub async fn evaluate_all(requirements: &[Requirement], registry: &impl Registry) -> Candidates {
    let mut acc = Candidates::Universe;
    for req in requirements {
        if req.is_replication() {
            continue;
        }
        let result = evaluate(req, registry).await;
        acc = acc.intersect(&result);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycelium_registry::InMemoryRegistry;
    use serde_json::json;

    #[tokio::test]
    async fn node_attr_match_looks_up_index() {
        let registry = InMemoryRegistry::new();
        let n3 = NodeId::new();
        registry
            .add_index(&["node".into(), "attribute".into(), "name".into(), "n3".into()], &n3.to_string(), 2)
            .await;

        let req = Requirement::NodeAttrMatch {
            index: BTreeMap::from([("name".to_string(), "n3".to_string())]),
        };
        let result = evaluate(&req, &registry).await;
        assert_eq!(result, Candidates::of([n3]));
    }

    #[tokio::test]
    async fn node_attr_match_with_no_hit_is_empty_not_universe() {
        let registry = InMemoryRegistry::new();
        let req = Requirement::NodeAttrMatch {
            index: BTreeMap::from([("name".to_string(), "nowhere".to_string())]),
        };
        let result = evaluate(&req, &registry).await;
        assert_eq!(result, Candidates::empty());
    }

    #[tokio::test]
    async fn node_resource_min_filters_by_threshold() {
        let registry = InMemoryRegistry::new();
        let big = NodeId::new();
        let small = NodeId::new();
        registry.set("", "all", json!([])).await.unwrap();
        registry.add_index(&["node".into(), "all".into()], &big.to_string(), 0).await;
        registry.add_index(&["node".into(), "all".into()], &small.to_string(), 0).await;
        registry.set("nodeCpu-", &big.to_string(), json!(100000)).await.unwrap();
        registry.set("nodeCpu-", &small.to_string(), json!(500)).await.unwrap();

        let req = Requirement::NodeResourceMin {
            resource: BTreeMap::from([("cpu".to_string(), 100000.0)]),
        };
        let result = evaluate(&req, &registry).await;
        assert_eq!(result, Candidates::of([big]));
    }

    #[tokio::test]
    async fn replication_clause_contributes_no_restriction() {
        let registry = InMemoryRegistry::new();
        let req = Requirement::Replication { replication_id: "r1".to_string() };
        assert_eq!(evaluate(&req, &registry).await, Candidates::Universe);
    }

    #[tokio::test]
    async fn composite_intersects_children() {
        let registry = InMemoryRegistry::new();
        let n1 = NodeId::new();
        registry
            .add_index(&["node".into(), "attribute".into(), "zone".into(), "eu".into()], &n1.to_string(), 2)
            .await;
        registry.set("", "all", json!([])).await.unwrap();
        registry.add_index(&["node".into(), "all".into()], &n1.to_string(), 0).await;
        registry.set("nodeCpu-", &n1.to_string(), json!(1000)).await.unwrap();

        let req = Requirement::Composite {
            requirements: vec![
                Requirement::NodeAttrMatch { index: BTreeMap::from([("zone".to_string(), "eu".to_string())]) },
                Requirement::NodeResourceMin { resource: BTreeMap::from([("cpu".to_string(), 100.0)]) },
            ],
        };
        let result = evaluate(&req, &registry).await;
        assert_eq!(result, Candidates::of([n1]));
    }
}
