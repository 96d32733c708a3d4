//! Time sources backed by board hardware
//!
//! - [`RtcClock`]: the LSE-clocked internal RTC as the settable wall clock
//! - [`MonoClock`]: the RTIC TIM2 monotonic as the gate clock

mod rtc;

pub use rtc::{MonoClock, RtcClock};
