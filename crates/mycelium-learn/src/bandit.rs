//! Common interface every online learner implements (§9 redesign note:
//! "factor EW/UCB/UCB2/SAO behind a common `Bandit` trait").

use mycelium_types::{LearnState, NodeId};
use std::collections::HashMap;

/// One arm per candidate node hosting the application's workload actor.
pub trait Bandit: Send {
    /// Sample the initial arm set and reset all per-arm state. `burn_mips`
    /// is the workload actor's own demand; `runtime_cpu_total` seeds the
    /// full-info estimator's capacity table (missing entries default high,
    /// per `ewlearning.py`'s `runtime_cpu_total.get(r, 10000)`, so an
    /// unknown runtime is never filtered out by the estimator alone).
    fn set_burn(&mut self, arms: Vec<NodeId>, burn_mips: f64, runtime_cpu_total: &HashMap<NodeId, f64>);

    /// Ingest one observed elapsed-time sample for the currently selected
    /// arm and update internal weights/means.
    fn feedback(&mut self, elapsed_time: f64);

    /// Select an arm. Returns `Some(new_node)` only if the selection
    /// changed from the previous call; `None` if unchanged or if selection
    /// was skipped (`need_migrate` false and no internal reason to move).
    fn choose(&mut self, need_migrate: bool) -> Option<NodeId>;

    fn state(&self) -> LearnState;
    fn set_state(&mut self, state: LearnState);
}
