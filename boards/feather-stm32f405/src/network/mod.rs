//! Network clients for the W5500 / embassy-net stack
//!
//! - **`config`**: configuration structs with `Default` implementations
//! - **`manager`**: DHCP bring-up
//! - **`mqtt`**: MQTT v5 over TLS, implementing `FeedTransport`
//! - **`sntp`**: SNTP client implementing `TimeSource`
//! - **`socket`**: async TCP socket wrapper for embedded-io-async
//! - **`tls`**: TLS 1.3 session setup
//!
//! Both protocol clients hold a copy of the (`Copy`) embassy-net `Stack` and
//! report failures as `hal_abstractions::NetworkError`, leaving retry policy
//! to the supervisors in `bottle-core`.

pub mod config;
pub mod manager;
pub mod mqtt;
pub mod sntp;
pub mod socket;
pub mod tls;

pub use config::{MqttConfig, NetworkConfig, SntpConfig};
pub use mqtt::MqttTransport;
pub use sntp::SntpClient;
