//! Stochastic-and-Adversarial-Optimal bandit (§4.5), grounded on
//! `calvin/runtime/north/sao.py`. Runs UCB-style consistency tests while
//! the reward process looks stochastic; on the first failed test it
//! deactivates the offending arm and falls back to an embedded EW/EXP3
//! bandit over the full arm set for the remainder of the run — SAO never
//! re-activates once it has fallen back, matching the original's one-way
//! `exp3_active` switch.

use crate::bandit::Bandit;
use crate::estimator::calculate_v;
use crate::ew::EwBandit;
use mycelium_config::EstimatorVersion;
use mycelium_types::{LearnState, NodeId};
use rand::distributions::{Distribution, WeightedIndex};
use rand::thread_rng;
use std::collections::{HashMap, HashSet};

pub struct SaoBandit {
    beta: f64,
    f_max: f64,
    eps: f64,
    lambda: f64,
    learn_rate: f64,
    state: LearnState,
    active: HashSet<NodeId>,
    h_tilde_total: HashMap<NodeId, f64>,
    burn_mips: f64,
    runtime_cpu_total: HashMap<NodeId, f64>,
    exp3_active: bool,
    exp3: Option<EwBandit>,
}

impl SaoBandit {
    pub fn new(beta: f64, f_max: f64, eps: f64, lambda: f64, learn_rate: f64) -> Self {
        Self {
            beta,
            f_max,
            eps,
            lambda,
            learn_rate,
            state: LearnState::new(Vec::new()),
            active: HashSet::new(),
            h_tilde_total: HashMap::new(),
            burn_mips: 0.0,
            runtime_cpu_total: HashMap::new(),
            exp3_active: false,
            exp3: None,
        }
    }

    /// Deactivate any arm whose mean trails the best active arm's mean by
    /// more than the confidence radius; switches on `exp3_active` as soon
    /// as the active set shrinks.
    fn consistency_tests(&mut self) {
        if self.active.len() <= 1 {
            return;
        }
        let k = self.state.k.max(1) as f64;
        let t = self.state.t.max(1) as f64;
        let radius = 6.0
            * (4.0 * k * self.beta.ln() / t + 5.0 * (k * self.beta.ln() / t).powi(2))
                .max(0.0)
                .sqrt();
        let max_h = self
            .active
            .iter()
            .map(|a| self.state.y.get(a).copied().unwrap_or(0.0))
            .fold(f64::NEG_INFINITY, f64::max);

        let mut deactivated = Vec::new();
        for &arm in &self.active {
            let h = self.state.y.get(&arm).copied().unwrap_or(0.0);
            if max_h - h > radius {
                deactivated.push(arm);
            }
        }
        if !deactivated.is_empty() {
            for arm in deactivated {
                self.active.remove(&arm);
            }
            self.activate_fallback();
        }
    }

    fn activate_fallback(&mut self) {
        if self.exp3_active {
            return;
        }
        let mut exp3 = EwBandit::new(self.eps, self.lambda, self.learn_rate, self.f_max, EstimatorVersion::V1);
        exp3.set_burn(self.state.arms.clone(), self.burn_mips, &self.runtime_cpu_total);
        self.exp3 = Some(exp3);
        self.exp3_active = true;
    }

    fn redistribute_probabilities(&mut self) {
        if self.active.is_empty() {
            return;
        }
        let uniform = 1.0 / self.active.len() as f64;
        for arm in self.state.arms.clone() {
            let p = if self.active.contains(&arm) { uniform } else { 0.0 };
            self.state.x.insert(arm, p);
        }
    }
}

impl Bandit for SaoBandit {
    fn set_burn(&mut self, arms: Vec<NodeId>, burn_mips: f64, runtime_cpu_total: &HashMap<NodeId, f64>) {
        self.burn_mips = burn_mips;
        self.runtime_cpu_total = runtime_cpu_total.clone();
        self.active = arms.iter().copied().collect();
        self.h_tilde_total = arms.iter().map(|a| (*a, 0.0)).collect();
        self.state = LearnState::new(arms);
        self.exp3_active = false;
        self.exp3 = None;
    }

    fn feedback(&mut self, elapsed_time: f64) {
        if self.exp3_active {
            if let Some(exp3) = &mut self.exp3 {
                exp3.feedback(elapsed_time);
            }
            return;
        }
        let Some(k) = self.state.burn_runtime else { return };
        let p_k = *self.state.x.get(&k).unwrap_or(&1.0);

        let mut f_max = self.f_max;
        let g_tilde = calculate_v(&mut f_max, elapsed_time, Some(p_k));
        self.f_max = f_max;

        let n = self.state.n.entry(k).or_insert(0);
        *n += 1;
        *self.h_tilde_total.entry(k).or_insert(0.0) += g_tilde;
        let mean = self.h_tilde_total[&k] / *n as f64;
        self.state.y.insert(k, mean);
        self.state.t += 1;

        self.consistency_tests();
        if !self.exp3_active {
            self.redistribute_probabilities();
        }
    }

    fn choose(&mut self, need_migrate: bool) -> Option<NodeId> {
        if self.exp3_active {
            return self.exp3.as_mut().and_then(|e| e.choose(need_migrate));
        }

        if !need_migrate && self.state.burn_runtime.is_some() {
            return None;
        }

        let arms: Vec<NodeId> = self.active.iter().copied().collect();
        if arms.is_empty() {
            return None;
        }
        let weights: Vec<f64> = arms.iter().map(|a| self.state.x.get(a).copied().unwrap_or(0.0)).collect();
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
        if self.exp3_active {
            self.exp3.as_ref().map(|e| e.state()).unwrap_or_else(|| self.state.clone())
        } else {
            self.state.clone()
        }
    }

    fn set_state(&mut self, state: LearnState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_exp3_once_and_never_reactivates() {
        let mut bandit = SaoBandit::new(10.0, 5.0, 0.1, 0.5, 1.0);
        let arms: Vec<NodeId> = (0..4).map(|_| NodeId::new()).collect();
        bandit.set_burn(arms.clone(), 10.0, &HashMap::new());

        bandit.choose(true);
        // Feed wildly divergent elapsed times long enough to trip a
        // consistency test and trigger the EXP3 fallback.
        for i in 0..200 {
            let elapsed = if i % 2 == 0 { 0.1 } else { 4.9 };
            bandit.feedback(elapsed);
        }
        // Once fallen back, further feedback must never flip it off again.
        let was_active = bandit.exp3_active;
        bandit.feedback(0.1);
        if was_active {
            assert!(bandit.exp3_active);
        }
    }

    #[test]
    fn probabilities_over_active_set_sum_to_one() {
        let mut bandit = SaoBandit::new(10.0, 5.0, 0.1, 0.5, 1.0);
        let arms: Vec<NodeId> = (0..3).map(|_| NodeId::new()).collect();
        bandit.set_burn(arms, 10.0, &HashMap::new());
        bandit.choose(true);
        bandit.feedback(0.2);
        if !bandit.exp3_active {
            let sum: f64 = bandit.state.x.values().sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }
}
