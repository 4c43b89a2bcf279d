//! [`FarseeingSink`] wiring the scheduler to [`AppManager::migrate_with_requirements`]
//! (§4.7): on activation, re-run placement for the named application's
//! current actor set; on deactivation, just log — the next activation
//! (or an ordinary migrate call) is what moves actors back.

use crate::state::AppState;
use async_trait::async_trait;
use mycelium_farseeing::FarseeingSink;
use mycelium_types::{Actor, AppId, Application, DeployInfo};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct AppMgrSink {
    state: Arc<AppState>,
}

impl AppMgrSink {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    async fn load_application(&self, app_id: AppId) -> Option<Application> {
        let raw = self.state.registry.get("application-", &app_id.to_string()).await.ok()?;
        serde_json::from_value(raw).ok()
    }

    /// Best-effort: actor records are optional passthrough state here, not
    /// the actor runtime's live catalog, so a missing one is skipped rather
    /// than failing the whole reconfiguration.
    async fn load_actors(&self, app: &Application) -> Vec<Actor> {
        let mut actors = Vec::new();
        for &actor_id in app.actors.keys() {
            if let Ok(raw) = self.state.registry.get("actor-", &actor_id.to_string()).await {
                if let Ok(actor) = serde_json::from_value::<Actor>(raw) {
                    actors.push(actor);
                }
            }
        }
        actors
    }
}

#[async_trait]
impl FarseeingSink for AppMgrSink {
    async fn on_activate(&self, app_id: AppId, state_name: &str) -> mycelium_core::Result<()> {
        info!(%app_id, state_name, "farseeing activation firing");
        let Some(mut app) = self.load_application(app_id).await else {
            warn!(%app_id, "farseeing activation for unknown application, skipping");
            return Ok(());
        };
        let actors = self.load_actors(&app).await;
        if actors.is_empty() {
            debug!(%app_id, "no actor records to re-place on activation");
            return Ok(());
        }

        self.state
            .appmgr
            .migrate_with_requirements(&mut app, DeployInfo::new(), &actors, &HashMap::new(), &[], true, true, None)
            .await?;
        Ok(())
    }

    async fn on_deactivate(&self, app_id: AppId, state_name: &str) -> mycelium_core::Result<()> {
        info!(%app_id, state_name, "farseeing deactivation firing");
        Ok(())
    }
}
