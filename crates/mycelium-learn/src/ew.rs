//! Exponential-Weights bandit (§4.5 "EW update step"), grounded on
//! `ewlearning.py`'s `EwLearning`.

use crate::bandit::Bandit;
use crate::estimator::{calculate_v, estimator_v1, estimator_v2};
use mycelium_config::EstimatorVersion;
use mycelium_types::{LearnState, NodeId};
use rand::distributions::{Distribution, WeightedIndex};
use rand::thread_rng;
use std::collections::HashMap;

pub struct EwBandit {
    eps: f64,
    lambda: f64,
    learn_rate: f64,
    f_max: f64,
    estimator: EstimatorVersion,
    burn_mips: f64,
    runtime_cpu_total: HashMap<NodeId, f64>,
    runtime_cpu_avail: HashMap<NodeId, f64>,
    state: LearnState,
}

impl EwBandit {
    pub fn new(eps: f64, lambda: f64, learn_rate: f64, f_max: f64, estimator: EstimatorVersion) -> Self {
        Self {
            eps,
            lambda,
            learn_rate,
            f_max,
            estimator,
            burn_mips: 0.0,
            runtime_cpu_total: HashMap::new(),
            runtime_cpu_avail: HashMap::new(),
            state: LearnState::new(Vec::new()),
        }
    }

    fn softmax_probabilities(&self) -> HashMap<NodeId, f64> {
        let max_y = self.state.y.values().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp_shifted: HashMap<NodeId, f64> = self
            .state
            .y
            .iter()
            .map(|(&k, &y)| (k, (y - max_y).exp()))
            .collect();
        let sum: f64 = exp_shifted.values().sum();
        let k = self.state.k.max(1) as f64;
        exp_shifted
            .into_iter()
            .map(|(id, e)| {
                let soft = if sum > 0.0 { e / sum } else { 1.0 / k };
                (id, (1.0 - self.eps) * soft + self.eps / k)
            })
            .collect()
    }

    fn full_info_gain(&mut self, elapsed_time: f64) -> HashMap<NodeId, f64> {
        let arms = self.state.arms.clone();
        let mut out = HashMap::new();
        for node in arms {
            let total = *self.runtime_cpu_total.get(&node).unwrap_or(&10_000.0);
            let current_usage = self.runtime_cpu_avail.get(&node).copied().unwrap_or(0.0);
            let used_est = if Some(node) == self.state.burn_runtime {
                current_usage
            } else {
                current_usage + self.burn_mips
            };
            let mut f_max = self.f_max;
            let v = match self.estimator {
                EstimatorVersion::V1 => estimator_v1(&mut f_max, used_est, total),
                EstimatorVersion::V2 => {
                    estimator_v2(&mut f_max, self.burn_mips, current_usage.max(1.0), used_est, total)
                }
            };
            self.f_max = f_max;
            out.insert(node, v);
        }
        out
    }
}

impl Bandit for EwBandit {
    fn set_burn(&mut self, arms: Vec<NodeId>, burn_mips: f64, runtime_cpu_total: &HashMap<NodeId, f64>) {
        self.burn_mips = burn_mips;
        self.runtime_cpu_total = runtime_cpu_total.clone();
        self.state = LearnState::new(arms);
    }

    fn feedback(&mut self, elapsed_time: f64) {
        let Some(burn_runtime) = self.state.burn_runtime else { return };
        let x_kt = *self.state.x.get(&burn_runtime).unwrap_or(&1.0);

        let mut f_max = self.f_max;
        let g_obs = calculate_v(&mut f_max, elapsed_time, Some(x_kt));
        self.f_max = f_max;

        let g_est = self.full_info_gain(elapsed_time);

        let step = self.learn_rate / (self.state.t as f64 + 1.0).sqrt();
        for (node, y) in self.state.y.iter_mut() {
            let g_obs_k = if *node == burn_runtime { g_obs } else { 0.0 };
            let g_est_k = g_est.get(node).copied().unwrap_or(0.0);
            let g = self.lambda * g_obs_k + (1.0 - self.lambda) * g_est_k;
            *y += step * g;
        }
        self.state.t += 1;
    }

    /// Selection itself never consults the Trial-and-Error FSM — that
    /// meta-policy lives one layer up in [`crate::trial::TrialAndError`],
    /// which gates whether `choose` is even called with `need_migrate`.
    fn choose(&mut self, need_migrate: bool) -> Option<NodeId> {
        let probs = self.softmax_probabilities();
        self.state.x = probs.clone();

        if !need_migrate && self.state.burn_runtime.is_some() {
            return None;
        }

        let arms: Vec<NodeId> = self.state.arms.clone();
        if arms.is_empty() {
            return None;
        }
        let weights: Vec<f64> = arms.iter().map(|a| probs.get(a).copied().unwrap_or(0.0)).collect();
        let chosen = if let Ok(dist) = WeightedIndex::new(&weights) {
            arms[dist.sample(&mut thread_rng())]
        } else {
            arms[0]
        };

        let changed = self.state.burn_runtime != Some(chosen);
        self.state.burn_runtime = Some(chosen);
        changed.then_some(chosen)
    }

    fn state(&self) -> LearnState {
        self.state.clone()
    }

    fn set_state(&mut self, state: LearnState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arms(n: usize) -> Vec<NodeId> {
        (0..n).map(|_| NodeId::new()).collect()
    }

    #[test]
    fn probabilities_sum_to_one_and_stay_positive() {
        let mut bandit = EwBandit::new(0.1, 0.5, 1.0, 5.0, EstimatorVersion::V1);
        let arms = arms(4);
        bandit.set_burn(arms.clone(), 10.0, &HashMap::new());
        bandit.choose(true);
        bandit.feedback(0.3);
        let probs = bandit.softmax_probabilities();
        let sum: f64 = probs.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        for p in probs.values() {
            assert!(*p > 0.0);
        }
    }

    #[test]
    fn consistently_good_feedback_grows_burn_runtime_weight_fastest() {
        let mut bandit = EwBandit::new(0.1, 1.0, 2.0, 5.0, EstimatorVersion::V1);
        let arms = arms(3);
        bandit.set_burn(arms.clone(), 10.0, &HashMap::new());
        let first = bandit.choose(true).unwrap();
        for _ in 0..50 {
            bandit.feedback(0.1); // consistently fast
        }
        let y_first = bandit.state.y[&first];
        for (id, y) in &bandit.state.y {
            if *id != first {
                assert!(y_first > *y);
            }
        }
    }
}
