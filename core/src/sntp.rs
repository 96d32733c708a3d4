//! SNTP packet format
//!
//! Builds the 48 byte client request and validates a server reply
//! (RFC 4330). The UDP exchange itself lives with the board's network
//! stack.

use hal_abstractions::{NetworkError, Timestamp};

pub const NTP_PORT: u16 = 123;
pub const NTP_PACKET_LEN: usize = 48;
/// LI=0, VN=3, Mode=3 (client)
const NTP_CLIENT_REQUEST: u8 = 0x1B;
/// Mode field of a server reply
const NTP_MODE_SERVER: u8 = 4;

/// Client request with every field but the header zeroed
pub fn request_packet() -> [u8; NTP_PACKET_LEN] {
    let mut request = [0u8; NTP_PACKET_LEN];
    request[0] = NTP_CLIENT_REQUEST;
    request
}

/// Validate an SNTP reply and extract its transmit timestamp
pub fn parse_response(packet: &[u8], max_stratum: u8) -> Result<Timestamp, NetworkError> {
    if packet.len() < NTP_PACKET_LEN {
        return Err(NetworkError::InvalidResponse);
    }

    if packet[0] & 0x07 != NTP_MODE_SERVER {
        warn!("Rejecting NTP reply with mode {}", packet[0] & 0x07);
        return Err(NetworkError::InvalidResponse);
    }

    let stratum = packet[1];
    if stratum == 0 || stratum > max_stratum {
        warn!("Rejecting NTP stratum {} (max {})", stratum, max_stratum);
        return Err(NetworkError::ServerError);
    }

    let secs = u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]);
    let frac = u32::from_be_bytes([packet[44], packet[45], packet[46], packet[47]]);
    if secs == 0 {
        return Err(NetworkError::InvalidResponse);
    }

    Ok(Timestamp::from_ntp(u64::from(secs), frac))
}
