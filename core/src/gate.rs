//! Interval gate
//!
//! Non-blocking "at most once per period" check used by every polling
//! subsystem to rate-limit expensive work.

use core::time::Duration;

use hal_abstractions::Instant;

/// Fires at most once per `period` of monotonic time
///
/// The first call after construction always fires. An instant earlier than
/// the last firing is treated as "not yet due".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalGate {
    period: Duration,
    last_fired: Option<Instant>,
}

impl IntervalGate {
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            last_fired: None,
        }
    }

    pub const fn period(&self) -> Duration {
        self.period
    }

    pub const fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    /// Check whether the period has elapsed and, if so, record `now` as the
    /// latest firing
    pub fn fire(&mut self, now: Instant) -> bool {
        let due = match self.last_fired {
            None => true,
            Some(last) => now
                .checked_duration_since(last)
                .is_some_and(|elapsed| elapsed >= self.period),
        };
        if due {
            self.last_fired = Some(now);
        }
        due
    }
}
