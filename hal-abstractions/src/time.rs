//! Time value types shared by every board
//!
//! Two clocks exist side by side. [`Timestamp`] is wall-clock time and may
//! jump whenever the clock is re-synchronized. [`Instant`] is monotonic
//! uptime and never goes backwards, so every rate limiter runs on it.

use core::time::Duration;

/// NTP epoch offset (1900-01-01 to 1970-01-01 in seconds)
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Wall-clock timestamp with microsecond precision (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    /// Unix timestamp in seconds since epoch (1970-01-01 00:00:00 UTC)
    pub unix_secs: u64,
    /// Microseconds component (0-999,999)
    pub micros: u32,
}

impl Timestamp {
    /// The Unix epoch
    pub const EPOCH: Self = Self::new(0, 0);

    /// Create a new timestamp
    pub const fn new(unix_secs: u64, micros: u32) -> Self {
        Self { unix_secs, micros }
    }

    /// Create a timestamp with whole-second precision
    pub const fn from_secs(unix_secs: u64) -> Self {
        Self::new(unix_secs, 0)
    }

    /// Convert from NTP timestamp (seconds since 1900-01-01)
    pub fn from_ntp(ntp_secs: u64, ntp_frac: u32) -> Self {
        let unix_secs = ntp_secs.saturating_sub(NTP_UNIX_OFFSET);
        // Fractional part is in units of 2^-32 seconds
        let micros = ((ntp_frac as u64 * 1_000_000) >> 32) as u32;
        Self::new(unix_secs, micros)
    }

    /// Timestamp shifted forward by `duration`, saturating at `u64::MAX` seconds
    pub fn saturating_add(self, duration: Duration) -> Self {
        let total_micros = self.micros as u64 + duration.subsec_micros() as u64;
        let carry = total_micros / 1_000_000;
        Self::new(
            self.unix_secs
                .saturating_add(duration.as_secs())
                .saturating_add(carry),
            (total_micros % 1_000_000) as u32,
        )
    }

    /// Whole seconds from `earlier` to `self`; negative when `earlier` is later
    pub fn seconds_since(self, earlier: Timestamp) -> i64 {
        self.unix_secs as i64 - earlier.unix_secs as i64
    }

    /// Apply a signed offset in seconds, clamping at the epoch
    pub fn offset_by(self, offset_secs: i32) -> Self {
        self.shifted_by(i64::from(offset_secs))
    }

    /// Move by a signed number of seconds, clamping at the epoch
    pub fn shifted_by(self, secs: i64) -> Self {
        let shifted = (self.unix_secs as i64).saturating_add(secs);
        Self::new(shifted.max(0) as u64, self.micros)
    }
}

/// Monotonic instant in milliseconds since boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instant(u64);

impl Instant {
    /// Boot
    pub const ZERO: Self = Self(0);

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1000)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Elapsed time since `earlier`, or `None` if `earlier` is in the future
    pub fn checked_duration_since(self, earlier: Instant) -> Option<Duration> {
        self.0.checked_sub(earlier.0).map(Duration::from_millis)
    }

    /// Elapsed time since `earlier`, zero if `earlier` is in the future
    pub fn saturating_duration_since(self, earlier: Instant) -> Duration {
        self.checked_duration_since(earlier).unwrap_or(Duration::ZERO)
    }

    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }
}
