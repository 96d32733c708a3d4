#![deny(unsafe_code)]
//! SNTP client implementing `TimeSource`
//!
//! One [`TimeSource::fetch`] walks the configured server list once and
//! returns the first valid answer. Retry cadence and writing the wall clock
//! belong to the time-sync supervisor.

use defmt::{debug, info, warn, Debug2Format};
use embassy_futures::select::{select, Either};
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{Duration, Instant, Timer};
use bottle_core::sntp::{parse_response, request_packet, NTP_PACKET_LEN, NTP_PORT};
use hal_abstractions::{NetworkError, TimeSource, Timestamp};

use super::config::SntpConfig;

/// SNTP client for time synchronization
pub struct SntpClient {
    stack: Stack<'static>,
    config: SntpConfig,
}

impl SntpClient {
    pub fn new(stack: Stack<'static>, config: SntpConfig) -> Self {
        Self { stack, config }
    }

    async fn request(&self, server: &str) -> Result<Timestamp, NetworkError> {
        let server_ip = self
            .stack
            .dns_query(server, DnsQueryType::A)
            .await
            .map_err(|_| NetworkError::DnsError)?
            .first()
            .copied()
            .ok_or(NetworkError::DnsError)?;

        let server_endpoint = IpEndpoint::new(server_ip, NTP_PORT);
        debug!("Resolved {} to {}", server, Debug2Format(&server_endpoint));

        let mut rx_meta = [PacketMetadata::EMPTY; 2];
        let mut rx_buffer = [0u8; 64];
        let mut tx_meta = [PacketMetadata::EMPTY; 2];
        let mut tx_buffer = [0u8; 64];
        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|_| NetworkError::SocketError)?;

        let request = request_packet();
        let sent_at = Instant::now();
        socket
            .send_to(&request, server_endpoint)
            .await
            .map_err(|_| NetworkError::SocketError)?;

        let mut response = [0u8; NTP_PACKET_LEN];
        let timeout = Timer::after(Duration::from_millis(self.config.timeout_ms));
        let (recv_len, from_addr) = match select(timeout, socket.recv_from(&mut response)).await
        {
            Either::First(_) => return Err(NetworkError::Timeout),
            Either::Second(result) => result.map_err(|_| NetworkError::SocketError)?,
        };
        let rtt = Instant::now().duration_since(sent_at);

        if from_addr.endpoint.addr != server_ip {
            warn!("NTP reply from unexpected source {}", Debug2Format(&from_addr));
            return Err(NetworkError::InvalidResponse);
        }

        let timestamp = parse_response(&response[..recv_len], self.config.max_stratum)?;
        let correction_us = (rtt.as_micros() / 2).min(self.config.max_rtt_correction_us);
        debug!(
            "NTP {}: {}.{:06} UTC, RTT correction {} us",
            server, timestamp.unix_secs, timestamp.micros, correction_us
        );

        Ok(timestamp.saturating_add(core::time::Duration::from_micros(correction_us)))
    }
}

impl TimeSource for SntpClient {
    async fn fetch(&mut self) -> Result<Timestamp, NetworkError> {
        for server in self.config.servers {
            match self.request(server).await {
                Ok(timestamp) => return Ok(timestamp),
                Err(e) => warn!("SNTP request to {} failed: {:?}", server, e),
            }
        }
        info!("No SNTP server answered");
        Err(NetworkError::AllServersFailed)
    }
}
