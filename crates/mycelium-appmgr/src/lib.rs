//! `AppManager` (§4.6): the application lifecycle — `new`/`add`/`add_link`/
//! `finalize`/`destroy`/`migrate_with_requirements` — sitting directly on
//! top of [`mycelium_placement::PlacementPlanner`].

use mycelium_core::{Error, Result};
use mycelium_placement::filter::FarseeingSnapshot;
use mycelium_placement::PlacementPlanner;
use mycelium_registry::Registry;
use mycelium_types::{Actor, ActorId, AppId, Application, DeployInfo, Link, NodeId, Requirement};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Bound on NOT_FOUND retries during destroy (§7 "retry (≤10×) for
/// destroy-time actor lookups").
const DESTROY_MAX_RETRIES: u32 = 10;

/// Result of `destroy`: actors that could not be located or instructed to
/// stop, returned rather than failing the whole operation (§4.6 "tolerate
/// partial failure").
#[derive(Debug, Clone, Default)]
pub struct DestroyReport {
    pub missing: Vec<ActorId>,
}

pub struct AppManager<R: Registry> {
    registry: Arc<R>,
    planner: Arc<PlacementPlanner<R>>,
}

impl<R: Registry> AppManager<R> {
    pub fn new(registry: Arc<R>, planner: Arc<PlacementPlanner<R>>) -> Self {
        Self { registry, planner }
    }

    /// §4.6 `new(name, deploy_info) -> app_id`.
    pub async fn create(&self, name: impl Into<String>, ns: impl Into<String>, origin_node_id: NodeId, deploy_info: DeployInfo) -> Result<Application> {
        let mut app = Application::new(name, ns, origin_node_id);
        app.deploy_info = deploy_info;
        self.persist(&app).await?;
        Ok(app)
    }

    /// §4.6 `add(app_id, actor_id)`.
    pub async fn add(&self, app: &mut Application, actor_id: ActorId, name: impl Into<String>) -> Result<()> {
        app.add_actor(actor_id, name);
        self.persist(app).await
    }

    /// §4.6 `add_link(app_id, link_id, link_name)`.
    pub async fn add_link(&self, app: &mut Application, link_id: mycelium_types::LinkId, name: impl Into<String>) -> Result<()> {
        app.add_link(link_id, name);
        self.persist(app).await
    }

    /// §4.6 `finalize(app_id, migrate, cb)`: persist the application and,
    /// if `migrate`, trigger initial placement.
    pub async fn finalize(
        &self,
        app: &Application,
        actors: &[Actor],
        actor_requirements: &HashMap<ActorId, Vec<Requirement>>,
        links: &[Link],
        migrate: bool,
    ) -> Result<Option<mycelium_placement::PlacementResult>> {
        self.persist(app).await?;
        if !migrate {
            return Ok(None);
        }
        let result = self.planner.execute_requirements(app.id, actors, actor_requirements, links, None, false, None).await?;
        self.destroy_if_infeasible(app, actors, &result).await?;
        Ok(Some(result))
    }

    /// §4.6 `destroy(app_id, cb)`: locate every actor (local + remote +
    /// replicas), instruct each owner to stop it, remove replica records,
    /// delete the Application record. NOT_FOUND on an actor lookup is
    /// retried up to [`DESTROY_MAX_RETRIES`] times before being counted as
    /// missing rather than failing the whole operation.
    pub async fn destroy(&self, app: &Application) -> Result<DestroyReport> {
        let mut missing = Vec::new();

        for &actor_id in app.actors.keys() {
            let mut found = false;
            for attempt in 0..DESTROY_MAX_RETRIES {
                match self.registry.get("actor-", &actor_id.to_string()).await {
                    Ok(_) => {
                        found = true;
                        break;
                    }
                    Err(Error::NotFound { .. }) => {
                        warn!(%actor_id, attempt, "actor record not found during destroy, retrying");
                        continue;
                    }
                    Err(err) => return Err(err),
                }
            }
            if found {
                self.registry.delete("actor-", &actor_id.to_string()).await.ok();
            } else {
                missing.push(actor_id);
            }
        }

        if let Some(replication_id) = app.deploy_info.get("replication_id").and_then(|v| v.as_str()) {
            self.registry.delete("replica-", replication_id).await.ok();
        }

        self.registry.delete("application-", &app.id.to_string()).await?;
        info!(app_id = %app.id, missing = missing.len(), "application destroyed");
        Ok(DestroyReport { missing })
    }

    /// §4.6 `migrate_with_requirements(app_id, deploy_info, move, extend, cb)`:
    /// merge `deploy_info` into the persisted application and re-run
    /// placement, with the §4.6 `move=true` cost bias applied to the
    /// actors' current nodes.
    pub async fn migrate_with_requirements(
        &self,
        app: &mut Application,
        deploy_info_update: DeployInfo,
        actors: &[Actor],
        actor_requirements: &HashMap<ActorId, Vec<Requirement>>,
        links: &[Link],
        move_bias: bool,
        extend: bool,
        farseeing: Option<&FarseeingSnapshot>,
    ) -> Result<mycelium_placement::PlacementResult> {
        if extend {
            for (k, v) in deploy_info_update {
                app.deploy_info.insert(k, v);
            }
        } else {
            app.deploy_info = deploy_info_update;
        }
        self.persist(app).await?;

        let current_nodes: HashSet<NodeId> = actors.iter().filter_map(|a| a.node_id).collect();
        let bias_arg = if move_bias && !current_nodes.is_empty() { Some(&current_nodes) } else { None };

        let result = self.planner.execute_requirements(app.id, actors, actor_requirements, links, farseeing, true, bias_arg).await?;
        self.destroy_if_infeasible(app, actors, &result).await?;
        Ok(result)
    }

    /// §7 `PLACEMENT_INFEASIBLE`: an empty placement over a non-empty actor
    /// set is not left dangling. Tear the application down the same way
    /// an explicit `destroy` call would.
    async fn destroy_if_infeasible(
        &self,
        app: &Application,
        actors: &[Actor],
        result: &mycelium_placement::PlacementResult,
    ) -> Result<()> {
        if result.placement.is_empty() && !actors.is_empty() {
            warn!(app_id = %app.id, "placement infeasible, destroying application");
            self.destroy(app).await?;
        }
        Ok(())
    }

    async fn persist(&self, app: &Application) -> Result<()> {
        let value = serde_json::to_value(app).map_err(|e| Error::configuration(format!("serializing application: {e}")))?;
        self.registry.set("application-", &app.id.to_string(), value).await?;
        self.registry
            .add_index(&["node".into(), "application".into(), app.origin_node_id.to_string()], &app.id.to_string(), 2)
            .await;
        Ok(())
    }
}

/// Split out so a caller with only the raw JSON value (not yet deserialized
/// into an `Application`) can still build the merged `deploy_info` for
/// `migrate_with_requirements` without round-tripping through the registry
/// twice.
pub fn merge_deploy_info(base: &DeployInfo, update: DeployInfo, extend: bool) -> DeployInfo {
    if !extend {
        return update;
    }
    let mut merged = base.clone();
    for (k, v) in update {
        merged.insert(k, v);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycelium_config::GlobalConfig;
    use mycelium_registry::InMemoryRegistry;

    fn manager() -> AppManager<InMemoryRegistry> {
        let registry = Arc::new(InMemoryRegistry::new());
        let planner = Arc::new(PlacementPlanner::new(registry.clone(), GlobalConfig::default()));
        AppManager::new(registry, planner)
    }

    #[tokio::test]
    async fn create_persists_the_application_record() {
        let mgr = manager();
        let app = mgr.create("myapp", "ns", NodeId::new(), DeployInfo::new()).await.unwrap();
        let raw = mgr.registry.get("application-", &app.id.to_string()).await.unwrap();
        assert_eq!(raw["name"], json!("myapp"));
    }

    #[tokio::test]
    async fn destroy_reports_actors_whose_records_never_showed_up() {
        let mgr = manager();
        let mut app = mgr.create("myapp", "ns", NodeId::new(), DeployInfo::new()).await.unwrap();
        let actor_id = ActorId::new();
        mgr.add(&mut app, actor_id, "a").await.unwrap();

        let report = mgr.destroy(&app).await.unwrap();
        assert_eq!(report.missing, vec![actor_id]);
    }

    #[tokio::test]
    async fn destroy_succeeds_when_every_actor_record_is_present() {
        let mgr = manager();
        let mut app = mgr.create("myapp", "ns", NodeId::new(), DeployInfo::new()).await.unwrap();
        let actor_id = ActorId::new();
        mgr.add(&mut app, actor_id, "a").await.unwrap();
        mgr.registry.set("actor-", &actor_id.to_string(), json!({"id": actor_id.to_string()})).await.unwrap();

        let report = mgr.destroy(&app).await.unwrap();
        assert!(report.missing.is_empty());
    }

    #[tokio::test]
    async fn finalize_destroys_the_application_when_placement_is_infeasible() {
        let mgr = manager();
        let mut app = mgr.create("myapp", "ns", NodeId::new(), DeployInfo::new()).await.unwrap();
        let actor = Actor::new("ns:a:0", "component");
        mgr.add(&mut app, actor.id, "a").await.unwrap();

        let mut requirements = HashMap::new();
        requirements.insert(
            actor.id,
            vec![Requirement::NodeAttrMatch {
                index: std::collections::BTreeMap::from([("name".to_string(), "does-not-exist".to_string())]),
            }],
        );

        let result = mgr.finalize(&app, &[actor], &requirements, &[], true).await.unwrap().unwrap();
        assert!(result.placement.is_empty());

        let err = mgr.registry.get("application-", &app.id.to_string()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn merge_deploy_info_extends_rather_than_replaces_when_requested() {
        let mut base = DeployInfo::new();
        base.insert("a".to_string(), json!(1));
        let mut update = DeployInfo::new();
        update.insert("b".to_string(), json!(2));

        let merged = merge_deploy_info(&base, update.clone(), true);
        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!(2)));

        let replaced = merge_deploy_info(&base, update, false);
        assert_eq!(replaced.get("a"), None);
    }
}
