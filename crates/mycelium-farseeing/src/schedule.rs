//! A registered application's future-state schedule (§4.7): named states
//! with an activation interval, and the offsets at which the app should
//! transition through them.

use mycelium_types::AppId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One named state an application cycles through. `interval_ns > 0` marks
/// an active period, `< 0` an inactive one — the sign alone drives the
/// scheduler's activate/deactivate branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateInfo {
    pub interval_ns: i64,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FutureStateSchedule {
    pub app_id: AppId,
    /// Unix-epoch nanoseconds this schedule's offsets are relative to.
    pub initial_date_ns: u64,
    pub state_info: HashMap<String, StateInfo>,
    /// `(offset_ns, state_name)`, not required to be sorted by the caller.
    pub trigger_timestamps: Vec<(i64, String)>,
}

impl FutureStateSchedule {
    /// Expand into absolute-time events, each already shifted back by
    /// `oracle_lead_time_ns` (§4.7 "pushes `(absolute_date − oracle_lead_time,
    /// state, app)`").
    pub fn events(&self, oracle_lead_time_ns: u64) -> Vec<ScheduledEvent> {
        self.trigger_timestamps
            .iter()
            .filter_map(|(offset, state_name)| {
                let state = self.state_info.get(state_name)?;
                let absolute = self.initial_date_ns.saturating_add_signed(*offset);
                let fire_at = absolute.saturating_sub(oracle_lead_time_ns);
                Some(ScheduledEvent {
                    fire_at_ns: fire_at,
                    app_id: self.app_id,
                    state_name: state_name.clone(),
                    activating: state.interval_ns > 0,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub fire_at_ns: u64,
    pub app_id: AppId,
    pub state_name: String,
    pub activating: bool,
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Earliest fire time first, so `BinaryHeap` (a max-heap) can be
        // driven through `Reverse` to behave as a min-heap.
        self.fire_at_ns.cmp(&other.fire_at_ns)
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_shifted_by_lead_time_and_carry_activation_sign() {
        let app_id = AppId::new();
        let schedule = FutureStateSchedule {
            app_id,
            initial_date_ns: 1_000_000_000,
            state_info: HashMap::from([
                ("warm".to_string(), StateInfo { interval_ns: 500, payload: serde_json::Value::Null }),
                ("cool".to_string(), StateInfo { interval_ns: -500, payload: serde_json::Value::Null }),
            ]),
            trigger_timestamps: vec![(0, "warm".to_string()), (1_000, "cool".to_string())],
        };

        let events = schedule.events(100);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].fire_at_ns, 1_000_000_000 - 100);
        assert!(events[0].activating);
        assert_eq!(events[1].fire_at_ns, 1_000_001_000 - 100);
        assert!(!events[1].activating);
    }
}
