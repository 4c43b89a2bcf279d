//! `Actor` (placement view, §3). The host node owns the running actor; the
//! Registry holds only this metadata.

use crate::ids::{ActorId, NodeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    /// `ns:component:instance`.
    pub name: String,
    pub actor_type: String,
    pub inports: Vec<String>,
    pub outports: Vec<String>,
    pub node_id: Option<NodeId>,
    pub replication_id: Option<String>,
}

impl Actor {
    pub fn new(name: impl Into<String>, actor_type: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(),
            name: name.into(),
            actor_type: actor_type.into(),
            inports: Vec::new(),
            outports: Vec::new(),
            node_id: None,
            replication_id: None,
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.inports.is_empty()
    }
}
