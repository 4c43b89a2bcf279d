//! `PlacementPlanner` (§4.3, §4.4): collect → filter → score → decide.
//!
//! The original strung this across a callback-counter convergence function
//! and a single mutated `Application` scratchpad (§9). Here the four phases
//! are plain async functions over an immutable [`collect::Collected`]
//! snapshot, composed by [`PlacementPlanner::execute_requirements`].

pub mod algorithms;
pub mod beam;
pub mod collect;
pub mod feasibility;
pub mod filter;
mod guard;
pub mod migration;

pub use guard::{GuardToken, ReentryGuard};

use algorithms::{BestFirstModel, GreenModel, LatencyModel, MoneyModel, WorstModel};
use beam::BeamEntry;
use collect::Collected;
use mycelium_config::{DeploymentAlgorithm, GlobalConfig};
use mycelium_core::{Error, Result};
use mycelium_registry::Registry;
use mycelium_types::{Actor, ActorId, AppId, Link, NodeId, PlacementOption, Requirement};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one placement run (§4.4, final paragraph): success even when
/// some actors couldn't be placed, as long as at least one could.
#[derive(Debug, Clone)]
pub struct PlacementResult {
    pub placement: PlacementOption,
    pub missing: Vec<ActorId>,
}

pub struct PlacementPlanner<R: Registry> {
    registry: Arc<R>,
    guard: ReentryGuard,
    config: GlobalConfig,
}

impl<R: Registry> PlacementPlanner<R> {
    pub fn new(registry: Arc<R>, config: GlobalConfig) -> Self {
        Self { registry, guard: ReentryGuard::new(), config }
    }

    /// Runs collection, filtering, and scoring for one application and
    /// returns the best surviving option. Rejects re-entrant calls for the
    /// same `app_id` (§4.3 "a single guard rejects re-entry"). `migrate`
    /// enables the §4.4.7 migration-mode policies: epsilon-greedy explore
    /// over the scored beam, and batch write-back of the chosen placement's
    /// expected CPU/RAM when the registry's `batch` flag is set.
    pub async fn execute_requirements(
        &self,
        app_id: AppId,
        actors: &[Actor],
        actor_requirements: &HashMap<ActorId, Vec<Requirement>>,
        links: &[Link],
        farseeing: Option<&filter::FarseeingSnapshot>,
        migrate: bool,
        move_bias_nodes: Option<&HashSet<NodeId>>,
    ) -> Result<PlacementResult> {
        let _token = self.guard.acquire(app_id)?;

        let mut collected = collect::collect(self.registry.as_ref(), actors, actor_requirements, links).await;

        if let Some(snapshot) = farseeing {
            if filter::farseeing_short_circuit(snapshot, &collected.resource_demand, &collected.nodes) {
                info!(%app_id, "farseeing short-circuit: current placement still satisfies demand");
                return Ok(placement_from_option(&snapshot.current_placement, links));
            }
        }

        // §4.6 `move=true`: bias the cost function toward keeping actors on
        // their current node by inflating that node's cost terms.
        if let Some(current_nodes) = move_bias_nodes {
            let bias = migration::move_bias(&collected.nodes);
            for node in current_nodes {
                if let Some(snapshot) = collected.nodes.get_mut(node) {
                    snapshot.cost_cpu += bias;
                    snapshot.cost_ram += bias;
                }
            }
        }

        let resolved = filter::replace_infinite(&collected.actor_candidates);
        let filtered = filter::resource_filter(&resolved, &collected.resource_demand, &collected.nodes, self.config.deployment_tolerance);

        let beam = self.decide(actors, links, &filtered, &collected);

        // §4.4, final paragraph / §7 `PLACEMENT_INFEASIBLE`: zero candidates
        // for every actor is not an error, it's an empty placement.
        // `random::sample` can return a genuinely empty beam; every other
        // algorithm always carries forward at least one (possibly
        // fully-unplaced) entry. Fall back to a synthetic empty entry
        // instead of branching on which algorithm produced the beam.
        let empty_entry = BeamEntry { option: HashMap::new(), accumulated: 0.0 };
        let best = if migrate {
            migration::explore(&beam, self.config.deployment_epsilon_greedy).unwrap_or(&empty_entry)
        } else {
            beam.first().unwrap_or(&empty_entry)
        };

        let missing: Vec<ActorId> = actors.iter().map(|a| a.id).filter(|id| !best.option.contains_key(id)).collect();
        if best.option.is_empty() && !actors.is_empty() {
            warn!(%app_id, "placement infeasible: no candidate for any actor");
        } else if !missing.is_empty() {
            warn!(%app_id, placed = best.option.len(), total = actors.len(), "partial placement");
        }

        if migrate && collected.batch {
            let demand_by_node = demand_per_node(best, &collected);
            let totals: HashMap<NodeId, (f64, f64)> =
                collected.nodes.iter().map(|(id, s)| (*id, (s.cpu_total, s.ram_total))).collect();
            migration::write_back(self.registry.clone(), &demand_by_node, &totals).await?;
        }

        Ok(beam_entry_to_result(best, links, missing))
    }

    fn decide(
        &self,
        actors: &[Actor],
        links: &[Link],
        filtered: &HashMap<ActorId, HashSet<NodeId>>,
        collected: &Collected,
    ) -> Vec<BeamEntry> {
        let beam_width = self.config.deployment_n_samples;

        let mut beam = match self.config.deployment_algorithm {
            DeploymentAlgorithm::Random => {
                algorithms::random::sample(actors, links, filtered, &collected.link_feasibility, beam_width)
            }
            DeploymentAlgorithm::Latency => {
                let model = LatencyModel { collected };
                beam::expand(actors, links, filtered, &collected.link_feasibility, &model, beam_width)
            }
            DeploymentAlgorithm::Money => {
                let model = MoneyModel { collected, bandwidth_unit_cost: 0.0001 };
                beam::expand(actors, links, filtered, &collected.link_feasibility, &model, beam_width)
            }
            DeploymentAlgorithm::Green => {
                let warm_nodes: HashSet<NodeId> =
                    collected.nodes.iter().filter(|(_, s)| s.cpu_avail < s.cpu_total).map(|(id, _)| *id).collect();
                let model = GreenModel { collected, warm_nodes: &warm_nodes };
                beam::expand(actors, links, filtered, &collected.link_feasibility, &model, beam_width)
            }
            DeploymentAlgorithm::Best => {
                let model = BestFirstModel { collected };
                beam::expand(actors, links, filtered, &collected.link_feasibility, &model, beam_width)
            }
            DeploymentAlgorithm::Worst => {
                let model = WorstModel { inner: BestFirstModel { collected } };
                beam::expand(actors, links, filtered, &collected.link_feasibility, &model, beam_width)
            }
            DeploymentAlgorithm::Grasp => {
                let model = MoneyModel { collected, bandwidth_unit_cost: 0.0001 };
                algorithms::grasp::run(
                    actors,
                    links,
                    filtered,
                    &collected.link_feasibility,
                    &model,
                    self.config.grasp,
                    (beam_width / 2).max(1),
                    beam_width,
                )
            }
        };

        // §4.4.6: cost-equal options prefer more runtimes used for
        // green/latency, otherwise the lowest index survives as-is since
        // `beam` is already sorted best-first by the chosen cost model.
        if matches!(self.config.deployment_algorithm, DeploymentAlgorithm::Green | DeploymentAlgorithm::Latency) {
            beam.sort_by(|a, b| {
                let spread_a = a.option.values().collect::<HashSet<_>>().len();
                let spread_b = b.option.values().collect::<HashSet<_>>().len();
                spread_b.cmp(&spread_a)
            });
        }
        beam
    }
}

fn beam_entry_to_result(entry: &BeamEntry, links: &[Link], missing: Vec<ActorId>) -> PlacementResult {
    let mut placement = PlacementOption::new();
    for (&actor, &node) in &entry.option {
        let link_used = links.iter().find(|l| l.src_actor_id == actor || l.dst_actor_id == actor).map(|l| l.id);
        placement.insert(actor, mycelium_types::ActorPlacement { runtime: node, link_used, phys_link_used: None });
    }
    PlacementResult { placement, missing }
}

fn placement_from_option(option: &PlacementOption, _links: &[Link]) -> PlacementResult {
    PlacementResult { placement: option.clone(), missing: Vec::new() }
}

/// Expected available CPU/RAM per node once `entry`'s actors land, for the
/// batch write-back (§4.4.7): each node's starting availability minus the
/// demand of every actor the beam assigned to it.
fn demand_per_node(entry: &BeamEntry, collected: &Collected) -> HashMap<NodeId, (f64, f64)> {
    let mut result: HashMap<NodeId, (f64, f64)> = collected
        .nodes
        .iter()
        .map(|(id, s)| (*id, (s.cpu_avail, s.ram_avail)))
        .collect();
    for (actor, node) in &entry.option {
        let demand = collected.resource_demand.get(actor).copied().unwrap_or_default();
        if let Some((cpu, ram)) = result.get_mut(node) {
            *cpu -= demand.cpu;
            *ram -= demand.ram;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycelium_config::GlobalConfig;
    use mycelium_registry::InMemoryRegistry;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn places_every_actor_when_every_node_qualifies() {
        let registry = Arc::new(InMemoryRegistry::new());
        let n1 = NodeId::new();
        registry
            .add_index(&["node".into(), "attribute".into(), "name".into(), "n1".into()], &n1.to_string(), 2)
            .await;
        registry.set("nodeCpu-", &n1.to_string(), serde_json::json!(1000)).await.unwrap();
        registry.set("nodeRam-", &n1.to_string(), serde_json::json!(1000)).await.unwrap();

        let actor = Actor::new("ns:a:0", "component");
        let mut requirements = HashMap::new();
        requirements.insert(
            actor.id,
            vec![Requirement::NodeAttrMatch { index: BTreeMap::from([("name".to_string(), "n1".to_string())]) }],
        );

        let planner = PlacementPlanner::new(registry, GlobalConfig { deployment_algorithm: DeploymentAlgorithm::Best, ..Default::default() });
        let result = planner
            .execute_requirements(AppId::new(), &[actor.clone()], &requirements, &[], None, false, None)
            .await
            .unwrap();

        assert!(result.missing.is_empty());
        assert_eq!(result.placement[&actor.id].runtime, n1);
    }

    #[tokio::test]
    async fn reentrant_call_for_the_same_app_is_rejected() {
        let registry = Arc::new(InMemoryRegistry::new());
        let planner = PlacementPlanner::new(registry, GlobalConfig::default());
        let app_id = AppId::new();
        let _token = planner.guard.acquire(app_id).unwrap();

        let err = planner.execute_requirements(app_id, &[], &HashMap::new(), &[], None, false, None).await.unwrap_err();
        assert!(matches!(err, Error::Reentry { .. }));
    }

    #[tokio::test]
    async fn no_qualifying_node_is_placement_infeasible() {
        let registry = Arc::new(InMemoryRegistry::new());
        let actor = Actor::new("ns:a:0", "component");
        let mut requirements = HashMap::new();
        requirements.insert(
            actor.id,
            vec![Requirement::NodeAttrMatch { index: BTreeMap::from([("name".to_string(), "does-not-exist".to_string())]) }],
        );

        let planner = PlacementPlanner::new(registry, GlobalConfig::default());
        let result = planner
            .execute_requirements(AppId::new(), &[actor.clone()], &requirements, &[], None, false, None)
            .await
            .unwrap();
        assert!(result.placement.is_empty());
        assert_eq!(result.missing, vec![actor.id]);
    }

    #[tokio::test]
    async fn no_qualifying_node_is_placement_infeasible_under_every_algorithm() {
        for algorithm in [
            DeploymentAlgorithm::Random,
            DeploymentAlgorithm::Latency,
            DeploymentAlgorithm::Green,
            DeploymentAlgorithm::Best,
            DeploymentAlgorithm::Worst,
            DeploymentAlgorithm::Money,
            DeploymentAlgorithm::Grasp,
        ] {
            let registry = Arc::new(InMemoryRegistry::new());
            let actor = Actor::new("ns:a:0", "component");
            let mut requirements = HashMap::new();
            requirements.insert(
                actor.id,
                vec![Requirement::NodeAttrMatch { index: BTreeMap::from([("name".to_string(), "does-not-exist".to_string())]) }],
            );

            let planner =
                PlacementPlanner::new(registry, GlobalConfig { deployment_algorithm: algorithm, ..Default::default() });
            let result = planner
                .execute_requirements(AppId::new(), &[actor.clone()], &requirements, &[], None, false, None)
                .await
                .unwrap();
            assert!(result.placement.is_empty(), "algorithm {algorithm:?} did not return an empty placement");
            assert_eq!(result.missing, vec![actor.id], "algorithm {algorithm:?} did not report the actor as missing");
        }
    }
}
