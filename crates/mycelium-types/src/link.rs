//! Application-level `Link` and the mesh's `PhysicalLink` (§3).

use crate::ids::{ActorId, LinkId, NodeId, PhysLinkId};
use crate::requirement::Requirement;
use serde::{Deserialize, Serialize};

/// A logical data edge between two actor ports. Destroyed when its
/// application is destroyed; never outlives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub src_actor_id: ActorId,
    pub dst_actor_id: ActorId,
    pub requirements: Vec<Requirement>,
}

/// Runtime-to-runtime transport edge. Implicitly one per ordered node pair;
/// `LinkMonitor` publishes both directions so either endpoint resolves the
/// same logical link (§3 "published symmetrically").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalLink {
    pub id: PhysLinkId,
    pub runtime1: NodeId,
    pub runtime2: NodeId,
    /// Discretized bandwidth, kbit/s (§4.1 bucket table).
    pub bandwidth: u64,
    /// Discretized latency, µs (§4.1 bucket table).
    pub latency: u64,
}

impl PhysicalLink {
    /// The far endpoint as seen from `from`. Panics if `from` isn't either
    /// endpoint — callers always derive `from` from `self`.
    pub fn other(&self, from: NodeId) -> NodeId {
        if from == self.runtime1 {
            self.runtime2
        } else if from == self.runtime2 {
            self.runtime1
        } else {
            panic!("node {from} is not an endpoint of this physical link");
        }
    }

    pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
        (self.runtime1 == a && self.runtime2 == b) || (self.runtime1 == b && self.runtime2 == a)
    }
}
