//! Network client traits
//!
//! Boards implement these on top of their network stack. Implementors
//! report failures as [`NetworkError`] values rather than panicking; the
//! supervisors in `bottle-core` decide when to retry.

use crate::error::NetworkError;
use crate::time::Timestamp;

/// Provider of authoritative network time
///
/// # Example Implementation
/// ```ignore
/// struct SntpClient { config: SntpConfig }
///
/// impl TimeSource for SntpClient {
///     async fn fetch(&mut self) -> Result<Timestamp, NetworkError> {
///         // Perform one SNTP exchange
///     }
/// }
/// ```
pub trait TimeSource {
    /// Query the current UTC time once, without retrying
    async fn fetch(&mut self) -> Result<Timestamp, NetworkError>;
}

/// Something that happened on a feed session during one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeedEvent<'a> {
    /// Nothing arrived before the poll deadline
    Idle,
    /// Protocol traffic with no application meaning (keep-alive answers,
    /// acknowledgements); more may be pending, so poll again
    Control,
    /// The broker acknowledged a subscription
    Subscribed { granted_qos: u8 },
    /// An application message arrived
    Message { topic: &'a str, payload: &'a [u8] },
    /// The session ended; the transport must be reconnected before reuse
    Disconnected,
}

/// Publish/subscribe session
///
/// `poll` must return within a bounded time even when the broker is silent
/// (report [`FeedEvent::Idle`]) so the caller's loop keeps running.
pub trait FeedTransport {
    /// Establish a fresh session, dropping any previous one
    async fn connect(&mut self) -> Result<(), NetworkError>;

    /// Request delivery of messages published to `topic`
    async fn subscribe(&mut self, topic: &str) -> Result<(), NetworkError>;

    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool)
        -> Result<(), NetworkError>;

    /// Drive protocol I/O (keep-alive included) and report the next event
    async fn poll(&mut self) -> Result<FeedEvent<'_>, NetworkError>;
}
