//! Clock traits

use crate::error::ClockError;
use crate::time::{Instant, Timestamp};

/// Settable wall clock holding UTC
///
/// Implemented by the board RTC. Reads fail until the clock has been set at
/// least once, so callers never mistake the power-on default for real time.
pub trait WallClock {
    /// Read the current time
    ///
    /// Takes `&mut self` because RTC reads typically require mutable access.
    fn now(&mut self) -> Result<Timestamp, ClockError>;

    /// Overwrite the current time
    fn set(&mut self, timestamp: Timestamp) -> Result<(), ClockError>;
}

/// Free-running monotonic clock
pub trait Monotonic {
    fn now(&self) -> Instant;
}

impl<T: WallClock + ?Sized> WallClock for &mut T {
    fn now(&mut self) -> Result<Timestamp, ClockError> {
        T::now(self)
    }

    fn set(&mut self, timestamp: Timestamp) -> Result<(), ClockError> {
        T::set(self, timestamp)
    }
}

impl<T: Monotonic + ?Sized> Monotonic for &T {
    fn now(&self) -> Instant {
        T::now(self)
    }
}
