//! TLS 1.3 session setup using embedded-tls
//!
//! # Limitations
//!
//! - Certificate verification is disabled (`NoVerify`); the broker is
//!   authenticated by nothing but its DNS name
//! - Single connection at a time (static buffers, see `src/buffers.rs`)

use defmt::{error, info, Debug2Format};
use embassy_net::dns::DnsQueryType;
use embassy_net::{IpEndpoint, Stack};
use embassy_time::Duration;
use embedded_tls::{
    Aes128GcmSha256, CryptoProvider, NoVerify, TlsConfig, TlsConnection, TlsContext, TlsVerifier,
};
use hal_abstractions::{NetworkError, TlsError};

use super::socket::AsyncTcpSocket;

/// TLS stream the broker session runs over
pub type TlsStream = TlsConnection<'static, AsyncTcpSocket<'static>, Aes128GcmSha256>;

/// Simple crypto provider that wraps an RNG for TLS operations
struct SimpleCryptoProvider<'a, RNG> {
    rng: &'a mut RNG,
    verifier: NoVerify,
}

impl<'a, RNG> SimpleCryptoProvider<'a, RNG> {
    fn new(rng: &'a mut RNG) -> Self {
        Self {
            rng,
            verifier: NoVerify,
        }
    }
}

impl<RNG> CryptoProvider for SimpleCryptoProvider<'_, RNG>
where
    RNG: rand_core::CryptoRngCore,
{
    type CipherSuite = Aes128GcmSha256;
    type Signature = &'static [u8];

    fn rng(&mut self) -> impl rand_core::CryptoRngCore {
        &mut *self.rng
    }

    fn verifier(
        &mut self,
    ) -> Result<&mut impl TlsVerifier<Self::CipherSuite>, embedded_tls::TlsError> {
        Ok(&mut self.verifier)
    }
}

/// Where and how to open a TLS session
pub struct TlsTarget<'a> {
    /// Hostname used for DNS and SNI
    pub host: &'a str,
    pub port: u16,
    pub socket_timeout: Duration,
}

/// Buffers a TLS session borrows for its whole life
pub struct TlsBuffers {
    pub tcp_rx: &'static mut [u8],
    pub tcp_tx: &'static mut [u8],
    pub tls_read: &'static mut [u8],
    pub tls_write: &'static mut [u8],
}

/// Resolve `target`, connect over TCP and complete the TLS 1.3 handshake
pub async fn open<RNG>(
    stack: Stack<'static>,
    target: &TlsTarget<'_>,
    buffers: TlsBuffers,
    rng: &mut RNG,
) -> Result<TlsStream, NetworkError>
where
    RNG: rand_core::RngCore + rand_core::CryptoRng,
{
    let server_ip = stack
        .dns_query(target.host, DnsQueryType::A)
        .await
        .map_err(|e| {
            error!("DNS query failed: {:?}", Debug2Format(&e));
            NetworkError::DnsError
        })?
        .first()
        .copied()
        .ok_or_else(|| {
            error!("DNS returned no results for {}", target.host);
            NetworkError::DnsError
        })?;

    let endpoint = IpEndpoint::new(server_ip, target.port);
    info!("Resolved {} to {}", target.host, Debug2Format(&endpoint));

    let mut socket = AsyncTcpSocket::new(
        stack,
        buffers.tcp_rx,
        buffers.tcp_tx,
        target.socket_timeout,
    );
    socket.connect(endpoint).await?;

    let config = TlsConfig::new().with_server_name(target.host);
    let mut connection: TlsStream =
        TlsConnection::new(socket, buffers.tls_read, buffers.tls_write);

    let provider = SimpleCryptoProvider::new(rng);
    connection
        .open(TlsContext::new(&config, provider))
        .await
        .map_err(|e| {
            error!("TLS handshake failed: {:?}", Debug2Format(&e));
            TlsError::HandshakeFailed
        })?;

    info!("TLS 1.3 session established with {}", target.host);
    Ok(connection)
}
