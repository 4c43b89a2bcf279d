//! Re-entrancy guard (§3 invariant "at most one placement run is in
//! flight"; §9 "placement-in-flight becomes context ownership").
//!
//! A `PlacementContext` existing for an app id *is* the in-flight marker —
//! this guard only tracks which app ids currently own one, so a second
//! `execute_requirements` call for the same app is rejected instead of
//! racing the first.

use mycelium_core::{Error, Result};
use mycelium_types::AppId;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
pub struct ReentryGuard {
    in_flight: Mutex<HashSet<AppId>>,
}

impl ReentryGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the guard for `app_id`, or fail with `Error::Reentry` if a
    /// run is already in flight. The returned token releases on drop.
    pub fn acquire(&self, app_id: AppId) -> Result<GuardToken<'_>> {
        let mut set = self.in_flight.lock().unwrap();
        if !set.insert(app_id) {
            return Err(Error::reentry(app_id.to_string()));
        }
        Ok(GuardToken { guard: self, app_id })
    }
}

pub struct GuardToken<'a> {
    guard: &'a ReentryGuard,
    app_id: AppId,
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.lock().unwrap().remove(&self.app_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rejected_while_first_holds_the_token() {
        let guard = ReentryGuard::new();
        let app = AppId::new();
        let _token = guard.acquire(app).unwrap();
        assert!(guard.acquire(app).is_err());
    }

    #[test]
    fn releases_on_drop_so_a_later_run_can_proceed() {
        let guard = ReentryGuard::new();
        let app = AppId::new();
        {
            let _token = guard.acquire(app).unwrap();
        }
        assert!(guard.acquire(app).is_ok());
    }
}
