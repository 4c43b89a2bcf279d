//! Link feasibility (§4.4.5): which node pairs a given application link can
//! legally span, derived from its candidate physical links.

use mycelium_types::NodeId;
use std::collections::HashSet;

/// Node-pair ordering is normalized so `(a, b)` and `(b, a)` hash the same.
pub fn normalize_pair(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a.uuid() <= b.uuid() {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone)]
pub enum LinkFeasibility {
    /// The link requirement was an "infinite element" sentinel — any
    /// physical link between the two endpoints qualifies (§4.4.5).
    Universe,
    Pairs(HashSet<(NodeId, NodeId)>),
}

impl LinkFeasibility {
    pub fn allows(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        match self {
            LinkFeasibility::Universe => true,
            LinkFeasibility::Pairs(pairs) => pairs.contains(&normalize_pair(a, b)),
        }
    }
}
