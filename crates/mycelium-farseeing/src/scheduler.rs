//! The single re-armed timer (§4.7): one `BinaryHeap` of pending events, one
//! `tokio::time::sleep` always pointed at the earliest one. Re-arming on
//! every schedule change rather than running N independent timers keeps the
//! core's "single-threaded cooperative" scheduling model (§5) intact — only
//! one timer future is ever outstanding.

use crate::schedule::{FutureStateSchedule, ScheduledEvent};
use mycelium_core::now_ns;
use mycelium_types::AppId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// Activation/deactivation callback invoked when an event fires. Returning
/// `Err` only logs — §4.7 "missed events are logged but not retried" applies
/// to callback failures too, since a retry would need its own timer slot.
#[async_trait::async_trait]
pub trait FarseeingSink: Send + Sync {
    async fn on_activate(&self, app_id: AppId, state_name: &str) -> mycelium_core::Result<()>;
    async fn on_deactivate(&self, app_id: AppId, state_name: &str) -> mycelium_core::Result<()>;
}

#[derive(Default)]
struct State {
    heap: BinaryHeap<Reverse<EventEntry>>,
    active_apps: HashSet<AppId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EventEntry(ScheduledEvent);

impl Ord for EventEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for EventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Oracle lead time subtracted from every absolute trigger date before it's
/// queued, so the reconfiguration has time to land before the state is
/// actually due (§4.7).
pub struct FarseeingScheduler {
    state: Mutex<State>,
    oracle_lead_time_ns: u64,
}

impl FarseeingScheduler {
    pub fn new(oracle_lead_time_ns: u64) -> Self {
        Self { state: Mutex::new(State::default()), oracle_lead_time_ns }
    }

    /// Queue every trigger in `schedule`, cancelling nothing — a prior
    /// schedule for the same app is expected to have already been cleared
    /// by the caller via [`Self::cancel`] (§5 "cancel prior pending timer
    /// on rescheduling").
    pub fn register(&self, schedule: &FutureStateSchedule) {
        let events = schedule.events(self.oracle_lead_time_ns);
        let mut state = self.state.lock().unwrap();
        for event in events {
            state.heap.push(Reverse(EventEntry(event)));
        }
    }

    /// Drop every still-pending event for `app_id` (used before
    /// `register`-ing a replacement schedule, and on `destroy`).
    pub fn cancel(&self, app_id: AppId) {
        let mut state = self.state.lock().unwrap();
        let remaining: BinaryHeap<Reverse<EventEntry>> =
            state.heap.drain().filter(|Reverse(e)| e.0.app_id != app_id).collect();
        state.heap = remaining;
        state.active_apps.remove(&app_id);
    }

    pub fn is_active(&self, app_id: AppId) -> bool {
        self.state.lock().unwrap().active_apps.contains(&app_id)
    }

    fn next_fire_at(&self) -> Option<u64> {
        self.state.lock().unwrap().heap.peek().map(|Reverse(e)| e.0.fire_at_ns)
    }

    fn pop_due(&self, now: u64) -> Vec<ScheduledEvent> {
        let mut state = self.state.lock().unwrap();
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = state.heap.peek() {
            if entry.0.fire_at_ns > now {
                break;
            }
            let Reverse(entry) = state.heap.pop().unwrap();
            if entry.0.activating {
                state.active_apps.insert(entry.0.app_id);
            } else {
                state.active_apps.remove(&entry.0.app_id);
            }
            due.push(entry.0);
        }
        due
    }

    /// Run the single-timer loop forever, dispatching every due event to
    /// `sink`. Intended to be spawned once per node.
    pub async fn run<S: FarseeingSink>(&self, sink: &S) {
        loop {
            let now = now_ns();
            let sleep_for = match self.next_fire_at() {
                Some(at) if at <= now => Duration::ZERO,
                Some(at) => Duration::from_nanos(at - now),
                None => Duration::from_secs(3600),
            };
            tokio::time::sleep(sleep_for).await;

            for event in self.pop_due(now_ns()) {
                let result = if event.activating {
                    info!(app_id = %event.app_id, state = %event.state_name, "farseeing activating app");
                    sink.on_activate(event.app_id, &event.state_name).await
                } else {
                    info!(app_id = %event.app_id, state = %event.state_name, "farseeing deactivating app");
                    sink.on_deactivate(event.app_id, &event.state_name).await
                };
                if let Err(err) = result {
                    warn!(app_id = %event.app_id, state = %event.state_name, %err, "farseeing event handler failed, not retried");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::StateInfo;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink {
        activations: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl FarseeingSink for CountingSink {
        async fn on_activate(&self, _app_id: AppId, _state_name: &str) -> mycelium_core::Result<()> {
            self.activations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn on_deactivate(&self, _app_id: AppId, _state_name: &str) -> mycelium_core::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn cancel_removes_only_that_apps_events() {
        let scheduler = FarseeingScheduler::new(0);
        let a1 = AppId::new();
        let a2 = AppId::new();
        let schedule1 = FutureStateSchedule {
            app_id: a1,
            initial_date_ns: now_ns(),
            state_info: HashMap::from([("on".to_string(), StateInfo { interval_ns: 1, payload: serde_json::Value::Null })]),
            trigger_timestamps: vec![(0, "on".to_string())],
        };
        let schedule2 = FutureStateSchedule { app_id: a2, ..schedule1.clone() };
        scheduler.register(&schedule1);
        scheduler.register(&schedule2);

        scheduler.cancel(a1);
        let state = scheduler.state.lock().unwrap();
        assert_eq!(state.heap.len(), 1);
        assert_eq!(state.heap.peek().unwrap().0.0.app_id, a2);
    }

    #[tokio::test]
    async fn pop_due_activates_and_marks_app_active() {
        let scheduler = FarseeingScheduler::new(0);
        let app_id = AppId::new();
        let schedule = FutureStateSchedule {
            app_id,
            initial_date_ns: now_ns(),
            state_info: HashMap::from([("on".to_string(), StateInfo { interval_ns: 1, payload: serde_json::Value::Null })]),
            trigger_timestamps: vec![(0, "on".to_string())],
        };
        scheduler.register(&schedule);

        let due = scheduler.pop_due(now_ns() + 1);
        assert_eq!(due.len(), 1);
        assert!(scheduler.is_active(app_id));

        let sink = CountingSink { activations: Arc::new(AtomicUsize::new(0)) };
        for event in due {
            sink.on_activate(event.app_id, &event.state_name).await.unwrap();
        }
        assert_eq!(sink.activations.load(Ordering::SeqCst), 1);
    }
}
