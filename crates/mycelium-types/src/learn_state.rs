//! Shape of the per-application, per-algorithm learner state (§3
//! "LearnState"). `mycelium-learn` owns the transition logic; this crate
//! only defines the data every bandit variant shares, so the planner and
//! the REST surface can introspect it without depending on `mycelium-learn`.

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Trial-and-Error FSM state (§4.5). `GiveUp` only reachable in nice-mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    Content,
    Watchful,
    Discontent,
    GiveUp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnState {
    pub k: usize,
    pub arms: Vec<NodeId>,
    /// Plays per arm.
    pub n: HashMap<NodeId, u64>,
    /// Weights (EW `y`).
    pub y: HashMap<NodeId, f64>,
    /// Selection probabilities (EW `x`), always summing to 1.
    pub x: HashMap<NodeId, f64>,
    pub t: u64,
    pub burn_id: Option<String>,
    pub burn_runtime: Option<NodeId>,
    pub dump_runtime: Option<NodeId>,
    pub trial_state: TrialState,
    /// Consecutive bad-observation count in `Watchful` (§4.5 `n_watch`).
    pub watchful_count: u32,
    /// Nice-mode discontent timestamps within the `time_giveup` window.
    pub discontent_timestamps: Vec<u64>,
}

impl LearnState {
    pub fn new(arms: Vec<NodeId>) -> Self {
        let k = arms.len();
        let n = arms.iter().map(|a| (*a, 0)).collect();
        let y = arms.iter().map(|a| (*a, 0.0)).collect();
        let uniform = if k == 0 { 0.0 } else { 1.0 / k as f64 };
        let x = arms.iter().map(|a| (*a, uniform)).collect();
        Self {
            k,
            arms,
            n,
            y,
            x,
            t: 0,
            burn_id: None,
            burn_runtime: None,
            dump_runtime: None,
            trial_state: TrialState::Content,
            watchful_count: 0,
            discontent_timestamps: Vec::new(),
        }
    }
}
