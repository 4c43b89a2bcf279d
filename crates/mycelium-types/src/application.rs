//! `Application` (§3): a user-submitted graph of actors and links, plus its
//! deployment requirements. Computed/scratchpad fields live in
//! `PlacementContext` (§9) instead of here.

use crate::ids::{ActorId, AppId, LinkId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form deployment parameters attached at `new`/`migrate_with_requirements`
/// time (actor requirements, the designated workload actor, farseeing
/// schedule reference, …). Kept as JSON rather than a fixed struct since
/// the core treats it as opaque passthrough to the matcher and learn engine.
pub type DeployInfo = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: AppId,
    pub name: String,
    pub ns: String,
    pub origin_node_id: NodeId,
    pub actors: HashMap<ActorId, String>,
    pub links: HashMap<LinkId, String>,
    pub deploy_info: DeployInfo,
}

impl Application {
    pub fn new(name: impl Into<String>, ns: impl Into<String>, origin_node_id: NodeId) -> Self {
        Self {
            id: AppId::new(),
            name: name.into(),
            ns: ns.into(),
            origin_node_id,
            actors: HashMap::new(),
            links: HashMap::new(),
            deploy_info: DeployInfo::new(),
        }
    }

    pub fn add_actor(&mut self, actor_id: ActorId, name: impl Into<String>) {
        self.actors.insert(actor_id, name.into());
    }

    pub fn add_link(&mut self, link_id: LinkId, name: impl Into<String>) {
        self.links.insert(link_id, name.into());
    }
}
