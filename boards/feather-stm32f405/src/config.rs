#![deny(unsafe_code)]
//! Application configuration
//!
//! Credentials and the feed name are baked in at build time:
//!
//! ```text
//! AIO_USERNAME=me AIO_KEY=aio_xxx MQTT_FEED_NAME=bottles cargo build --release
//! ```
//!
//! Unset variables fall back to placeholders so the firmware always builds;
//! the broker will simply refuse the placeholder credentials.

use bottle_core::{CountdownConfig, FeedConfig, TimeSyncConfig};

pub const AIO_USERNAME: &str = match option_env!("AIO_USERNAME") {
    Some(value) => value,
    None => "username",
};

pub const AIO_KEY: &str = match option_env!("AIO_KEY") {
    Some(value) => value,
    None => "aio_key",
};

pub const MQTT_FEED_NAME: &str = match option_env!("MQTT_FEED_NAME") {
    Some(value) => value,
    None => "bottles",
};

pub const MQTT_BROKER: &str = match option_env!("MQTT_BROKER") {
    Some(value) => value,
    None => "io.adafruit.com",
};

/// US Eastern standard time
pub const TZ_OFFSET_SECS: i32 = -5 * 3600;

/// Pixels on the short strip next to the button
pub const SMALL_STRIP_PIXELS: usize = 4;
/// Pixels on the long strip
pub const LONG_STRIP_PIXELS: usize = 30;

/// Strip brightness, out of 255 (about 1%)
pub const BRIGHTNESS: u8 = 3;

/// Pause between control loop iterations
pub const LOOP_PERIOD_MS: u64 = 20;

/// Everything the control loop is built from
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub time_sync: TimeSyncConfig,
    pub feed: FeedConfig,
    pub countdown: CountdownConfig,
    pub feed_name: &'static str,
    pub username: &'static str,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            time_sync: TimeSyncConfig {
                tz_offset_secs: TZ_OFFSET_SECS,
                ..TimeSyncConfig::default()
            },
            feed: FeedConfig::default(),
            countdown: CountdownConfig::default(),
            feed_name: MQTT_FEED_NAME,
            username: AIO_USERNAME,
        }
    }
}

