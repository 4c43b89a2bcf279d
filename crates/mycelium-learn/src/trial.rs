//! Trial-and-Error meta-policy (§4.5 "Trial-and-Error FSM"), grounded on
//! `ewlearning.py`'s `TrialAndErrorBase`/`TrialAndError`/`NiceTrialAndError`.
//! Wraps any [`Bandit`] and decides *when* to let it reselect, rather than
//! reselecting on every feedback step.

use crate::bandit::Bandit;
use mycelium_core::now_ns;
use mycelium_types::{LearnState, NodeId, TrialState};
use std::collections::VecDeque;

pub struct TrialAndError<B: Bandit> {
    inner: B,
    n_watch: u32,
    n_giveup: usize,
    time_giveup_ns: u64,
    nice_mode: bool,
    state: TrialState,
    watchful_count: u32,
    discontent_timestamps: VecDeque<u64>,
    giveup_started_at: Option<u64>,
    dump_runtime: Option<NodeId>,
}

impl<B: Bandit> TrialAndError<B> {
    pub fn new(inner: B, n_watch: u32, n_giveup: usize, time_giveup_secs: f64, nice_mode: bool) -> Self {
        Self {
            inner,
            n_watch,
            n_giveup,
            time_giveup_ns: (time_giveup_secs * 1_000_000_000.0) as u64,
            nice_mode,
            state: TrialState::Content,
            watchful_count: 0,
            discontent_timestamps: VecDeque::new(),
            giveup_started_at: None,
            dump_runtime: None,
        }
    }

    pub fn set_dump_runtime(&mut self, node: NodeId) {
        self.dump_runtime = Some(node);
    }

    pub fn should_migrate(&self) -> bool {
        self.state == TrialState::Discontent
    }

    pub fn has_given_up(&self) -> bool {
        self.state == TrialState::GiveUp
    }

    /// CONTENT → WATCHFUL → DISCONTENT as consecutive feedback rounds keep
    /// showing a better arm than the one currently burned (§4.5).
    fn update_v(&mut self, current_is_best: bool) {
        match self.state {
            TrialState::Content => {
                if !current_is_best {
                    self.state = TrialState::Watchful;
                    self.watchful_count = 0;
                }
            }
            TrialState::Watchful => {
                if current_is_best {
                    self.state = TrialState::Content;
                } else {
                    self.watchful_count += 1;
                    if self.watchful_count >= self.n_watch {
                        self.state = TrialState::Discontent;
                    }
                }
            }
            TrialState::Discontent | TrialState::GiveUp => {}
        }
    }

    fn maybe_recover_from_giveup(&mut self, now: u64) {
        if let Some(started) = self.giveup_started_at {
            if now.saturating_sub(started) >= self.time_giveup_ns {
                self.state = TrialState::Content;
                self.giveup_started_at = None;
            }
        }
    }

    /// DISCONTENT always resolves back to CONTENT on the next selection
    /// (§4.5), unless nice-mode's give-up threshold has just been crossed.
    fn resolve_discontent(&mut self, now: u64) {
        self.discontent_timestamps.push_back(now);
        while self.discontent_timestamps.len() > self.n_giveup {
            self.discontent_timestamps.pop_front();
        }
        let gave_up_enough = self.nice_mode
            && self.discontent_timestamps.len() == self.n_giveup
            && now.saturating_sub(*self.discontent_timestamps.front().unwrap()) <= self.time_giveup_ns;

        if gave_up_enough {
            self.state = TrialState::GiveUp;
            self.giveup_started_at = Some(now);
        } else {
            self.state = TrialState::Content;
        }
    }
}

impl<B: Bandit> Bandit for TrialAndError<B> {
    fn set_burn(&mut self, arms: Vec<NodeId>, burn_mips: f64, runtime_cpu_total: &std::collections::HashMap<NodeId, f64>) {
        self.inner.set_burn(arms, burn_mips, runtime_cpu_total);
        self.state = TrialState::Content;
        self.watchful_count = 0;
        self.discontent_timestamps.clear();
        self.giveup_started_at = None;
    }

    fn feedback(&mut self, elapsed_time: f64) {
        self.inner.feedback(elapsed_time);
        let inner_state = self.inner.state();
        let Some(burn) = inner_state.burn_runtime else { return };
        let best = inner_state
            .y
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(id, _)| *id);
        self.update_v(best == Some(burn));
    }

    fn choose(&mut self, need_migrate: bool) -> Option<NodeId> {
        let now = now_ns();

        if self.state == TrialState::GiveUp {
            self.maybe_recover_from_giveup(now);
            if self.state == TrialState::GiveUp {
                if let Some(dump) = self.dump_runtime {
                    let mut inner_state = self.inner.state();
                    if inner_state.burn_runtime != Some(dump) {
                        inner_state.burn_runtime = Some(dump);
                        self.inner.set_state(inner_state);
                        return Some(dump);
                    }
                }
                return None;
            }
        }

        let should_migrate = need_migrate || self.state == TrialState::Discontent;
        if !should_migrate {
            return None;
        }

        let result = self.inner.choose(true);
        if self.state == TrialState::Discontent {
            self.resolve_discontent(now);
        }
        result
    }

    fn state(&self) -> LearnState {
        let mut s = self.inner.state();
        s.trial_state = self.state;
        s.watchful_count = self.watchful_count;
        s.discontent_timestamps = self.discontent_timestamps.iter().copied().collect();
        s
    }

    fn set_state(&mut self, state: LearnState) {
        self.state = state.trial_state;
        self.watchful_count = state.watchful_count;
        self.discontent_timestamps = state.discontent_timestamps.iter().copied().collect();
        self.inner.set_state(state);
    }
}
