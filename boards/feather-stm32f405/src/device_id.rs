#![deny(unsafe_code)]
//! Device identifier utilities for STM32F405
//!
//! The factory-programmed 96-bit unique ID is stable across reboots, which
//! makes it a good MQTT client identifier: a rebooted board takes over its
//! own session instead of appearing as a new client.

use bottle_core::feed::format_client_id;
use heapless::String;

const CLIENT_ID_PREFIX: &str = "bottle-";

/// `"bottle-"` (7 chars) + 24 hex chars
pub const CLIENT_ID_MAX_LEN: usize = 31;

/// The 96-bit UID as a 24 character hex string
pub fn uid_hex() -> &'static str {
    embassy_stm32::uid::uid_hex()
}

/// MQTT client ID in the format `bottle-{24_hex_chars}`
pub fn mqtt_client_id() -> Option<String<CLIENT_ID_MAX_LEN>> {
    format_client_id(CLIENT_ID_PREFIX, uid_hex())
}
