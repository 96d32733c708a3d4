//! Hardware abstraction traits for the bottle countdown firmware
//!
//! This crate defines the seams between the platform-agnostic logic in
//! `bottle-core` and a concrete board. BSPs implement these traits:
//!
//! - [`WallClock`]: settable real-time clock (UTC)
//! - [`Monotonic`]: free-running uptime clock used for all rate limiting
//! - [`TimeSource`]: network time provider (SNTP on hardware)
//! - [`FeedTransport`]: publish/subscribe session (MQTT on hardware)
//! - [`Trigger`]: edge-triggered user input (the reset button)

#![no_std]
#![deny(unsafe_code)]
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod error;
pub mod input;
pub mod network;
pub mod time;

pub use clock::{Monotonic, WallClock};
pub use error::{ClockError, MqttError, NetworkError, TlsError};
pub use input::Trigger;
pub use network::{FeedEvent, FeedTransport, TimeSource};
pub use time::{Instant, Timestamp};
