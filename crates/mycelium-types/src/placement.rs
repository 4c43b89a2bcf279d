//! Placement options and the per-run scratchpad (§3 "Placement option",
//! §9 "Mutation of the Application as scratchpad").
//!
//! The original mutated the live `Application` object as a scratchpad
//! during a placement run. Here that scratchpad is its own type,
//! `PlacementContext`, built fresh for each `execute_requirements` call and
//! discarded (or promoted into the `Application`) when the run finishes —
//! so a stale run can never bleed state into the next one.

use crate::candidates::Candidates;
use crate::ids::{ActorId, LinkId, NodeId, PhysLinkId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where one actor landed, and which physical link/app-link carried its
/// traffic to an already-placed neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorPlacement {
    pub runtime: NodeId,
    pub link_used: Option<LinkId>,
    pub phys_link_used: Option<PhysLinkId>,
}

impl ActorPlacement {
    pub fn on(runtime: NodeId) -> Self {
        Self {
            runtime,
            link_used: None,
            phys_link_used: None,
        }
    }
}

/// One complete candidate assignment, actor_id → placement. A placement run
/// produces a list of these; the lowest-score option survives.
pub type PlacementOption = HashMap<ActorId, ActorPlacement>;

/// Resource vector accumulated for one actor's `node_resource_min` clauses.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceDemand {
    pub cpu: f64,
    pub ram: f64,
}

/// Per-run scratchpad populated during `execute_requirements`/decide. Split
/// out of `Application` so the immutable application metadata never needs a
/// `&mut` borrow just to drive a placement cycle, and so "placement in
/// flight" becomes "a `PlacementContext` exists for this app_id" rather than
/// a boolean flag living on a struct everything else also touches.
#[derive(Debug, Clone, Default)]
pub struct PlacementContext {
    /// Candidate nodes per actor, after requirement evaluation.
    pub actor_candidates: HashMap<ActorId, Candidates>,
    /// Candidate physical links per application link.
    pub link_candidates: HashMap<LinkId, Vec<PhysLinkId>>,
    pub resource_demand: HashMap<ActorId, ResourceDemand>,
    /// Per-actor, per-candidate-node cost cache (§3 "per-actor resource
    /// cost cache").
    pub cost_cache: HashMap<ActorId, HashMap<NodeId, f64>>,
    pub batch: bool,
}
