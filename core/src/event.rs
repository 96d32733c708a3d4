//! Feed event payloads
//!
//! Events arrive as small JSON objects:
//!
//! ```json
//! {"event": "new-bottle", "event-ts": "2024-05-01T13:45:00", "ounces": 4}
//! ```
//!
//! Only `event` and `event-ts` are interpreted; unknown fields are ignored.

use serde::Deserialize;

use crate::calendar::TimeParseError;

/// Event name that restarts a countdown
pub const NEW_BOTTLE_EVENT: &str = "new-bottle";

/// Decoded event payload borrowing from the raw message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EventPayload<'a> {
    #[serde(borrow, default)]
    pub event: Option<&'a str>,
    #[serde(rename = "event-ts", borrow, default)]
    pub event_ts: Option<&'a str>,
}

impl<'a> EventPayload<'a> {
    pub fn decode(payload: &'a [u8]) -> Result<Self, EventError> {
        serde_json_core::from_slice::<EventPayload<'a>>(payload)
            .map(|(event, _)| event)
            .map_err(|_| EventError::Malformed)
    }

    pub fn is_new_bottle(&self) -> bool {
        self.event == Some(NEW_BOTTLE_EVENT)
    }
}

/// Event decode errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventError {
    /// Payload is not a JSON object of the expected shape
    Malformed,
    /// `event-ts` is absent
    MissingTimestamp,
    /// `event-ts` is not a valid ISO-8601 timestamp
    InvalidTimestamp(TimeParseError),
}

impl From<TimeParseError> for EventError {
    fn from(e: TimeParseError) -> Self {
        Self::InvalidTimestamp(e)
    }
}

impl core::fmt::Display for EventError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => write!(f, "Malformed event payload"),
            Self::MissingTimestamp => write!(f, "Event payload has no event-ts"),
            Self::InvalidTimestamp(e) => write!(f, "Invalid event-ts: {}", e),
        }
    }
}

impl core::error::Error for EventError {}

/// Discriminator selecting `new-bottle` events
///
/// Undecodable payloads are not new-bottle events.
pub fn is_new_bottle_event(payload: &[u8]) -> bool {
    EventPayload::decode(payload).is_ok_and(|event| event.is_new_bottle())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_payload() {
        let payload = br#"{"event":"new-bottle","event-ts":"2024-05-01T13:45:00","ounces":4}"#;
        let event = EventPayload::decode(payload).unwrap();
        assert_eq!(event.event, Some("new-bottle"));
        assert_eq!(event.event_ts, Some("2024-05-01T13:45:00"));
        assert!(event.is_new_bottle());
    }

    #[test]
    fn test_decode_missing_fields() {
        let event = EventPayload::decode(br#"{"ounces": 2.5}"#).unwrap();
        assert_eq!(event.event, None);
        assert_eq!(event.event_ts, None);
        assert!(!event.is_new_bottle());
    }

    #[test]
    fn test_discriminator() {
        assert!(is_new_bottle_event(
            br#"{"event": "new-bottle", "event-ts": "2024-05-01"}"#
        ));
        assert!(!is_new_bottle_event(
            br#"{"event": "low-battery", "event-ts": "2024-05-01"}"#
        ));
        assert!(!is_new_bottle_event(b"not json"));
        assert!(!is_new_bottle_event(b"\0"));
        assert!(!is_new_bottle_event(b""));
    }
}
