//! `Node` (§3): a fleet member. Registered on startup, de-registered on
//! stop, attributes updated via `set_avail` calls into `mycelium-monitor`.

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Public/private attribute split per §3 ("attributes (indexed public +
/// private)"). Only `public` is ever used to build an index path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub public: BTreeMap<String, String>,
    pub private: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub reachable_addresses: Vec<String>,
    pub attributes: NodeAttributes,
    pub capabilities: HashSet<String>,
}

impl Node {
    pub fn new(reachable_addresses: Vec<String>) -> Self {
        Self {
            id: NodeId::new(),
            reachable_addresses,
            attributes: NodeAttributes::default(),
            capabilities: HashSet::new(),
        }
    }
}
