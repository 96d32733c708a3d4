//! Hardware clocks implementing the `hal-abstractions` clock traits
//!
//! The RTC holds UTC with one second resolution. It reads as
//! `ClockError::NotInitialized` until the time-sync supervisor first sets
//! it; the control loop runs on its own estimate until then rather than on
//! the 2000-01-01 reset value.

#![deny(unsafe_code)]

use bottle_core::calendar::CivilDateTime;
use defmt::{debug, error, Debug2Format};
use embassy_stm32::rtc::{DateTime, DayOfWeek, Rtc};
use hal_abstractions::{ClockError, Instant, Monotonic, Timestamp, WallClock};
use rtic_monotonics::Monotonic as _;

use crate::Mono;

/// Internal RTC as the system wall clock
pub struct RtcClock {
    rtc: Rtc,
    synced: bool,
}

impl RtcClock {
    pub fn new(rtc: Rtc) -> Self {
        Self { rtc, synced: false }
    }
}

impl WallClock for RtcClock {
    fn now(&mut self) -> Result<Timestamp, ClockError> {
        if !self.synced {
            return Err(ClockError::NotInitialized);
        }

        let datetime = self.rtc.now().map_err(|_| ClockError::HardwareError)?;
        let civil = CivilDateTime {
            year: datetime.year(),
            month: datetime.month(),
            day: datetime.day(),
            hour: datetime.hour(),
            minute: datetime.minute(),
            second: datetime.second(),
        };
        let unix_secs = civil.to_unix().ok_or(ClockError::OutOfRange)?;
        Ok(Timestamp::from_secs(unix_secs))
    }

    fn set(&mut self, time: Timestamp) -> Result<(), ClockError> {
        let civil = CivilDateTime::from_unix(time.unix_secs);
        let datetime = DateTime::from(
            civil.year,
            civil.month,
            civil.day,
            day_of_week(civil.weekday()),
            civil.hour,
            civil.minute,
            civil.second,
            0,
        )
        .map_err(|e| {
            error!(
                "Timestamp {} not representable on the RTC: {:?}",
                time.unix_secs,
                Debug2Format(&e)
            );
            ClockError::OutOfRange
        })?;

        self.rtc
            .set_datetime(datetime)
            .map_err(|_| ClockError::HardwareError)?;
        self.synced = true;
        debug!("RTC set to {}", civil);
        Ok(())
    }
}

fn day_of_week(weekday: u8) -> DayOfWeek {
    match weekday {
        0 => DayOfWeek::Monday,
        1 => DayOfWeek::Tuesday,
        2 => DayOfWeek::Wednesday,
        3 => DayOfWeek::Thursday,
        4 => DayOfWeek::Friday,
        5 => DayOfWeek::Saturday,
        _ => DayOfWeek::Sunday,
    }
}

/// TIM2 monotonic at millisecond granularity
#[derive(Debug, Clone, Copy, Default)]
pub struct MonoClock;

impl Monotonic for MonoClock {
    fn now(&self) -> Instant {
        Instant::from_millis(Mono::now().ticks() / 1_000)
    }
}
