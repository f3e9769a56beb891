//! Binary packet codec: version byte, postcard-encoded header, payload body.
//!
//! Wire format:
//!
//! ```text
//! +---------+------------------+---------------------------+
//! | version | header (postcard)| payload body (postcard)   |
//! | u8      | variable         | header.total_size bytes   |
//! +---------+------------------+---------------------------+
//! ```
//!
//! `total_size` lets the decoder detect datagrams truncated in flight, and
//! the header/payload kind cross-check catches desynchronized senders.

use crate::header::{PacketHeader, PacketKind};
use crate::packets::Payload;

/// Current wire-protocol version, prepended to every datagram.
pub const PROTOCOL_VERSION: u8 = 1;

/// Largest payload one unreliable datagram can carry (IPv4 UDP maximum).
pub const MAX_DATAGRAM_BYTES: usize = 65_507;

/// Errors raised by packet (de)serialization.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The datagram was empty.
    #[error("empty datagram")]
    EmptyDatagram,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The body length does not match the header's `total_size`.
    #[error("truncated packet: header announces {expected} body bytes, got {actual}")]
    Truncated {
        /// `total_size` from the header.
        expected: u32,
        /// Bytes actually present after the header.
        actual: usize,
    },

    /// The payload discriminant disagrees with the header kind.
    #[error("payload kind {payload:?} does not match header kind {header:?}")]
    KindMismatch {
        /// Kind announced by the header.
        header: PacketKind,
        /// Kind of the decoded payload.
        payload: PacketKind,
    },

    /// The encoded packet exceeds one datagram.
    #[error("encoded packet is {size} bytes, datagram limit is {MAX_DATAGRAM_BYTES}")]
    Oversized {
        /// Encoded size in bytes.
        size: usize,
    },

    /// Postcard (de)serialization failed.
    #[error("serialization error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A fully-typed packet: header plus matching payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Header; `total_size` is filled in by [`encode_packet`].
    pub header: PacketHeader,
    /// Typed body.
    pub payload: Payload,
}

impl Packet {
    /// Builds a packet with a header derived from the payload.
    pub fn new(
        payload: Payload,
        tick: u64,
        packet_counter: u32,
        session_tag: u32,
        client_id: u16,
    ) -> Self {
        Self {
            header: PacketHeader {
                kind: payload.kind(),
                total_size: 0,
                tick,
                packet_counter,
                session_tag,
                client_id,
            },
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Serializes a packet into one datagram.
///
/// # Errors
///
/// Returns [`CodecError::Oversized`] if the result would not fit a single
/// datagram, or a postcard error on serialization failure.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, CodecError> {
    let body = postcard::to_allocvec(&packet.payload)?;

    let header = PacketHeader {
        kind: packet.payload.kind(),
        total_size: body.len() as u32,
        ..packet.header
    };
    let header_bytes = postcard::to_allocvec(&header)?;

    let mut out = Vec::with_capacity(1 + header_bytes.len() + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&body);

    if out.len() > MAX_DATAGRAM_BYTES {
        return Err(CodecError::Oversized { size: out.len() });
    }
    Ok(out)
}

/// Deserializes one datagram into a typed packet.
///
/// # Errors
///
/// Returns [`CodecError`] on version mismatch, truncation, kind mismatch, or
/// malformed postcard data.
pub fn decode_packet(data: &[u8]) -> Result<Packet, CodecError> {
    let (&version, rest) = data.split_first().ok_or(CodecError::EmptyDatagram)?;
    if version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let (header, body) = take_header(rest)?;
    if body.len() != header.total_size as usize {
        return Err(CodecError::Truncated {
            expected: header.total_size,
            actual: body.len(),
        });
    }

    let payload: Payload = postcard::from_bytes(body)?;
    if payload.kind() != header.kind {
        return Err(CodecError::KindMismatch {
            header: header.kind,
            payload: payload.kind(),
        });
    }

    Ok(Packet { header, payload })
}

fn take_header(data: &[u8]) -> Result<(PacketHeader, &[u8]), CodecError> {
    Ok(postcard::take_from_bytes::<PacketHeader>(data)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::Ping;

    fn ping_packet() -> Packet {
        Packet::new(Payload::Ping(Ping { sequence: 7 }), 100, 5, 0xDEAD_BEEF, 3)
    }

    #[test]
    fn test_roundtrip_preserves_header_and_payload() {
        let packet = ping_packet();
        let bytes = encode_packet(&packet).unwrap();
        let decoded = decode_packet(&bytes).unwrap();

        assert_eq!(decoded.payload, packet.payload);
        assert_eq!(decoded.header.tick, 100);
        assert_eq!(decoded.header.packet_counter, 5);
        assert_eq!(decoded.header.session_tag, 0xDEAD_BEEF);
        assert_eq!(decoded.header.client_id, 3);
        assert_eq!(decoded.header.kind, PacketKind::Ping);
    }

    #[test]
    fn test_total_size_matches_body() {
        let bytes = encode_packet(&ping_packet()).unwrap();
        let decoded = decode_packet(&bytes).unwrap();
        assert!(decoded.header.total_size > 0);
    }

    #[test]
    fn test_version_byte_is_first() {
        let bytes = encode_packet(&ping_packet()).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut bytes = encode_packet(&ping_packet()).unwrap();
        bytes[0] = 99;
        assert!(matches!(
            decode_packet(&bytes),
            Err(CodecError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_empty_datagram_rejected() {
        assert!(matches!(decode_packet(&[]), Err(CodecError::EmptyDatagram)));
    }

    #[test]
    fn test_truncated_datagram_rejected() {
        let bytes = encode_packet(&ping_packet()).unwrap();
        let result = decode_packet(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn test_corrupted_body_rejected() {
        let mut bytes = encode_packet(&ping_packet()).unwrap();
        let last = bytes.len() - 1;
        bytes.truncate(last);
        bytes.push(0xFF);
        assert!(decode_packet(&bytes).is_err());
    }

    #[test]
    fn test_empty_payload_variant_roundtrips() {
        let packet = Packet::new(Payload::ClientDisconnect, 1, 1, 42, 9);
        let bytes = encode_packet(&packet).unwrap();
        let decoded = decode_packet(&bytes).unwrap();
        assert_eq!(decoded.payload, Payload::ClientDisconnect);
        assert_eq!(decoded.header.kind, PacketKind::ClientDisconnect);
    }
}
