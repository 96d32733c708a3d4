//! Static buffers for the broker session
//!
//! The feed session outlives any single function call, so everything it
//! borrows (TCP socket buffers, TLS record buffers and the MQTT packet arena)
//! lives in main SRAM with a `'static` lifetime. Only one session exists at a
//! time; [`MqttTransport`](crate::network::mqtt::MqttTransport) drops the old
//! one before asking for the buffers again.
//!
//! # Buffer Sizing
//!
//! **TLS read (18 KB)**: a full TLS 1.3 record (16384 bytes) plus the 5 byte
//! header, the 16 byte AES-128-GCM tag and padding slack.
//!
//! **TLS write (16 KB)**: we control outgoing record sizes.
//!
//! **TCP (4 KB each way)** and **MQTT arena (2 KB)**: feed payloads are
//! small JSON documents.

#![allow(unsafe_code)] // Required for static mut buffers

use rust_mqtt::buffer::BumpBuffer;

const TLS_READ_BUF_SIZE: usize = 18 * 1024;
const TLS_WRITE_BUF_SIZE: usize = 16 * 1024;
const TCP_BUF_SIZE: usize = 4096;

/// MQTT packet arena size
pub const MQTT_BUFFER_SIZE: usize = 2048;

static mut TLS_READ_BUF: [u8; TLS_READ_BUF_SIZE] = [0; TLS_READ_BUF_SIZE];
static mut TLS_WRITE_BUF: [u8; TLS_WRITE_BUF_SIZE] = [0; TLS_WRITE_BUF_SIZE];
static mut TCP_RX_BUF: [u8; TCP_BUF_SIZE] = [0; TCP_BUF_SIZE];
static mut TCP_TX_BUF: [u8; TCP_BUF_SIZE] = [0; TCP_BUF_SIZE];
static mut MQTT_BUF: [u8; MQTT_BUFFER_SIZE] = [0; MQTT_BUFFER_SIZE];
static mut MQTT_ARENA: Option<BumpBuffer<'static>> = None;

/// Every buffer one broker session borrows
pub struct SessionBuffers {
    pub tcp_rx: &'static mut [u8],
    pub tcp_tx: &'static mut [u8],
    pub tls_read: &'static mut [u8],
    pub tls_write: &'static mut [u8],
    pub mqtt: &'static mut BumpBuffer<'static>,
}

/// Hand out the session buffers, resetting the MQTT arena
///
/// # Safety
///
/// The caller must have dropped every reference returned by a previous call
/// (i.e. the previous session) before calling this again, and must not call
/// it from more than one task.
pub unsafe fn session_buffers() -> SessionBuffers {
    // SAFETY: caller guarantees the previous session is gone
    // Raw pointer dereference required per Rust 2024 edition
    let mqtt_buf: &'static mut [u8] = &mut *core::ptr::addr_of_mut!(MQTT_BUF);
    let arena = &mut *core::ptr::addr_of_mut!(MQTT_ARENA);

    SessionBuffers {
        tcp_rx: &mut *core::ptr::addr_of_mut!(TCP_RX_BUF),
        tcp_tx: &mut *core::ptr::addr_of_mut!(TCP_TX_BUF),
        tls_read: &mut *core::ptr::addr_of_mut!(TLS_READ_BUF),
        tls_write: &mut *core::ptr::addr_of_mut!(TLS_WRITE_BUF),
        mqtt: arena.insert(BumpBuffer::new(mqtt_buf)),
    }
}
