#![deny(unsafe_code)]
//! Network configuration structures

use crate::config;

/// SNTP client configuration
#[derive(Debug, Clone)]
pub struct SntpConfig {
    /// NTP servers to try (in order)
    pub servers: &'static [&'static str],
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum accepted stratum level (1-15)
    pub max_stratum: u8,
    /// Upper bound on the RTT/2 correction applied to a response
    pub max_rtt_correction_us: u64,
}

impl Default for SntpConfig {
    fn default() -> Self {
        Self {
            servers: &["pool.ntp.org", "time.google.com", "time.cloudflare.com"],
            timeout_ms: 5000,
            max_stratum: 3,
            max_rtt_correction_us: 1_000_000,
        }
    }
}

/// MQTT broker session configuration
#[derive(Debug, Clone, Copy)]
pub struct MqttConfig {
    /// Broker hostname (for DNS and SNI)
    pub broker_host: &'static str,
    /// Broker port (8883 for MQTTS)
    pub broker_port: u16,
    pub username: &'static str,
    /// Broker password (the Adafruit IO key)
    pub key: &'static str,
    /// Keep-alive interval in seconds; pings go out at half this period
    pub keep_alive_secs: u16,
    /// Clean start flag (true = new session)
    pub clean_start: bool,
    /// How long one poll waits for an inbound packet
    pub poll_timeout_ms: u64,
    /// Socket inactivity timeout for connect and reads
    pub socket_timeout_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: config::MQTT_BROKER,
            broker_port: 8883,
            username: config::AIO_USERNAME,
            key: config::AIO_KEY,
            keep_alive_secs: 60,
            clean_start: true,
            poll_timeout_ms: 100,
            socket_timeout_ms: 10_000,
        }
    }
}

/// Network stack configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// MAC address for Ethernet
    pub mac_addr: [u8; 6],
    /// Random seed for network stack
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mac_addr: [0x02, 0x00, 0x00, 0x12, 0x34, 0x56],
            seed: 0x1234_5678_u64,
        }
    }
}

