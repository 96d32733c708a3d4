//! Error types shared between the core logic and board implementations

/// TLS transport errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TlsError {
    /// TLS handshake failed
    HandshakeFailed,
    /// TLS alert received from peer
    AlertReceived,
    /// TLS connection closed unexpectedly
    ConnectionClosed,
}

/// MQTT protocol errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MqttError {
    /// CONNECT was rejected or never acknowledged
    ConnectionFailed,
    /// SUBSCRIBE failed or was rejected
    SubscribeFailed,
    /// PUBLISH failed
    PublishFailed,
    /// Malformed packet, topic or string
    ProtocolError,
    /// Packet or topic did not fit its buffer
    BufferError,
}

/// Network client operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkError {
    /// DNS resolution failed
    DnsError,
    /// Socket bind/connect error
    SocketError,
    /// Request timeout
    Timeout,
    /// Invalid response from server
    InvalidResponse,
    /// Server error (e.g., invalid stratum for NTP)
    ServerError,
    /// All configured servers failed
    AllServersFailed,
    /// Operation requires an established session
    NotConnected,
    /// TLS layer failure
    Tls(TlsError),
    /// MQTT layer failure
    Mqtt(MqttError),
}

impl From<TlsError> for NetworkError {
    fn from(e: TlsError) -> Self {
        Self::Tls(e)
    }
}

impl From<MqttError> for NetworkError {
    fn from(e: MqttError) -> Self {
        Self::Mqtt(e)
    }
}

impl core::fmt::Display for TlsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::HandshakeFailed => write!(f, "TLS handshake failed"),
            Self::AlertReceived => write!(f, "TLS alert received"),
            Self::ConnectionClosed => write!(f, "TLS connection closed"),
        }
    }
}

impl core::fmt::Display for MqttError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "MQTT connection failed"),
            Self::SubscribeFailed => write!(f, "MQTT subscribe failed"),
            Self::PublishFailed => write!(f, "MQTT publish failed"),
            Self::ProtocolError => write!(f, "MQTT protocol error"),
            Self::BufferError => write!(f, "MQTT buffer error"),
        }
    }
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DnsError => write!(f, "DNS resolution failed"),
            Self::SocketError => write!(f, "Socket error"),
            Self::Timeout => write!(f, "Request timeout"),
            Self::InvalidResponse => write!(f, "Invalid response"),
            Self::ServerError => write!(f, "Server error"),
            Self::AllServersFailed => write!(f, "All servers failed"),
            Self::NotConnected => write!(f, "Not connected"),
            Self::Tls(e) => write!(f, "{}", e),
            Self::Mqtt(e) => write!(f, "{}", e),
        }
    }
}

// Implement core::error::Error for no_std compatibility
impl core::error::Error for TlsError {}
impl core::error::Error for MqttError {}
impl core::error::Error for NetworkError {}

impl embedded_io_async::Error for NetworkError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        match self {
            Self::SocketError | Self::Tls(TlsError::ConnectionClosed) => {
                embedded_io_async::ErrorKind::BrokenPipe
            }
            Self::Timeout => embedded_io_async::ErrorKind::TimedOut,
            Self::InvalidResponse => embedded_io_async::ErrorKind::InvalidData,
            _ => embedded_io_async::ErrorKind::Other,
        }
    }
}

/// Wall clock errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// Clock has never been set
    NotInitialized,
    /// Clock hardware rejected the access
    HardwareError,
    /// Timestamp cannot be represented by the clock
    OutOfRange,
}

impl core::fmt::Display for ClockError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "Clock not initialized"),
            Self::HardwareError => write!(f, "Clock hardware error"),
            Self::OutOfRange => write!(f, "Timestamp out of clock range"),
        }
    }
}

impl core::error::Error for ClockError {}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io_async::{Error, ErrorKind};

    #[test]
    fn test_nested_errors_convert() {
        let e: NetworkError = TlsError::HandshakeFailed.into();
        assert_eq!(e, NetworkError::Tls(TlsError::HandshakeFailed));

        let e: NetworkError = MqttError::SubscribeFailed.into();
        assert_eq!(e, NetworkError::Mqtt(MqttError::SubscribeFailed));
    }

    #[test]
    fn test_io_error_kinds() {
        assert_eq!(NetworkError::Timeout.kind(), ErrorKind::TimedOut);
        assert_eq!(NetworkError::SocketError.kind(), ErrorKind::BrokenPipe);
        assert_eq!(
            NetworkError::Tls(TlsError::ConnectionClosed).kind(),
            ErrorKind::BrokenPipe
        );
        assert_eq!(NetworkError::DnsError.kind(), ErrorKind::Other);
    }
}
