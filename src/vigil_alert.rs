//! Timed critical-alert state machine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::vigil_clock::{Scheduler, TimerId};

/// How long a critical alert stays active after its latest trigger.
pub const ALERT_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertState {
    pub active: bool,
    pub activated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    /// Calm -> Critical.
    Raised,
    /// Critical -> Critical; the deactivation deadline moved.
    Extended,
}

/// Calm until triggered; a single pending deactivation timer while Critical.
#[derive(Debug, Clone, Default)]
pub struct AlertController {
    activated_at: Option<DateTime<Utc>>,
    pending: Option<TimerId>,
}

impl AlertController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    pub fn state(&self) -> AlertState {
        AlertState { active: self.is_active(), activated_at: self.activated_at }
    }

    pub fn pending_timer(&self) -> Option<TimerId> {
        self.pending
    }

    /// Enter (or stay in) Critical and restart the deactivation window.
    ///
    /// Any previously scheduled deactivation is cancelled before the new one is armed,
    /// so at most one alert timer is ever pending.
    pub fn trigger<T>(
        &mut self,
        at: DateTime<Utc>,
        scheduler: &mut Scheduler<T>,
        expiry: T,
    ) -> AlertTransition {
        let transition = match self.pending.take() {
            Some(previous) => {
                scheduler.cancel(previous);
                AlertTransition::Extended
            }
            None => AlertTransition::Raised,
        };

        self.pending = Some(scheduler.schedule_once(ALERT_DURATION, expiry));
        self.activated_at = Some(at);
        info!(?transition, activated_at = %at, "critical alert");
        transition
    }

    /// Handle a fired deactivation timer. Returns true when the alert went Calm.
    ///
    /// Stale ids (from a replaced timer) are ignored.
    pub fn on_expired(&mut self, id: TimerId) -> bool {
        if self.pending != Some(id) {
            return false;
        }
        self.pending = None;
        self.activated_at = None;
        info!("critical alert cleared");
        true
    }

    /// Cancel the pending deactivation without emitting a transition (teardown).
    pub fn cancel<T>(&mut self, scheduler: &mut Scheduler<T>) -> bool {
        let cancelled = self.pending.take().map(|id| scheduler.cancel(id)).unwrap_or(false);
        self.activated_at = None;
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    #[fixture]
    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn run_until(
        alert: &mut AlertController,
        scheduler: &mut Scheduler<()>,
        until: Duration,
    ) -> bool {
        let mut cleared = false;
        while let Some(fired) = scheduler.pop_due(until) {
            cleared |= alert.on_expired(fired.id);
        }
        scheduler.settle(until);
        cleared
    }

    #[rstest]
    fn trigger_then_expire(epoch: DateTime<Utc>) {
        let mut scheduler = Scheduler::new();
        let mut alert = AlertController::new();

        assert_eq!(alert.trigger(epoch, &mut scheduler, ()), AlertTransition::Raised);
        assert!(alert.state().active);
        assert_eq!(alert.state().activated_at, Some(epoch));

        assert!(!run_until(&mut alert, &mut scheduler, Duration::from_millis(4_999)));
        assert!(alert.is_active());

        assert!(run_until(&mut alert, &mut scheduler, ALERT_DURATION));
        assert_eq!(alert.state(), AlertState { active: false, activated_at: None });
        assert_eq!(scheduler.pending(), 0);
    }

    #[rstest]
    fn retrigger_restarts_window(epoch: DateTime<Utc>) {
        let mut scheduler = Scheduler::new();
        let mut alert = AlertController::new();

        alert.trigger(epoch, &mut scheduler, ());
        run_until(&mut alert, &mut scheduler, Duration::from_secs(3));
        assert_eq!(alert.trigger(epoch, &mut scheduler, ()), AlertTransition::Extended);
        assert_eq!(scheduler.pending(), 1);

        assert!(!run_until(&mut alert, &mut scheduler, Duration::from_millis(7_999)));
        assert!(alert.is_active());
        assert!(run_until(&mut alert, &mut scheduler, Duration::from_secs(8)));
    }

    #[rstest]
    fn stale_timer_is_ignored(epoch: DateTime<Utc>) {
        let mut scheduler = Scheduler::new();
        let mut alert = AlertController::new();
        alert.trigger(epoch, &mut scheduler, ());
        let first = alert.pending_timer().unwrap();
        alert.trigger(epoch, &mut scheduler, ());

        assert!(!alert.on_expired(first));
        assert!(alert.is_active());
    }

    #[rstest]
    fn cancel_releases_timer(epoch: DateTime<Utc>) {
        let mut scheduler = Scheduler::new();
        let mut alert = AlertController::new();
        alert.trigger(epoch, &mut scheduler, ());

        assert!(alert.cancel(&mut scheduler));
        assert_eq!(scheduler.pending(), 0);
        assert!(!alert.is_active());
    }
}
