//! Farseeing (§4.7): applications register a future-state schedule and the
//! scheduler drives `AppManager::migrate_with_requirements` at the right
//! moments, feeding `farseeing_active_apps` back into the placement filter
//! (§4.4.3).

mod schedule;
mod scheduler;

pub use schedule::{FutureStateSchedule, ScheduledEvent, StateInfo};
pub use scheduler::{FarseeingScheduler, FarseeingSink};
