//! RTP fixed header (RFC 3550 §5.1).
//!
//! # Wire Format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! ```
//!
//! All multi-byte fields are big-endian. CSRC lists and header extensions
//! follow the fixed part; they are not interpreted here.

use thiserror::Error;

use super::StreamIdentity;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 12;

const VERSION_SHIFT: u8 = 6;
const PADDING_BIT: u8 = 0b0010_0000;
const EXTENSION_BIT: u8 = 0b0001_0000;
const CSRC_COUNT_MASK: u8 = 0b0000_1111;
const MARKER_BIT: u8 = 0b1000_0000;
const PAYLOAD_TYPE_MASK: u8 = 0b0111_1111;

/// Errors from [`RtpHeader::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// Datagram shorter than the fixed header.
    #[error("datagram too short for RTP header: need {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },
}

/// Parsed view of an RTP fixed header, in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: StreamIdentity,
}

impl RtpHeader {
    /// Parses the fixed header at the start of `packet`.
    ///
    /// The length is checked before any byte is read, so every input length
    /// is safe. The version is reported, not validated.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::TooShort`] if `packet` is under [`HEADER_SIZE`].
    pub fn parse(packet: &[u8]) -> Result<Self, HeaderError> {
        let Some(fixed) = packet.first_chunk::<HEADER_SIZE>() else {
            return Err(HeaderError::TooShort {
                need: HEADER_SIZE,
                have: packet.len(),
            });
        };

        let [b0, b1, s0, s1, t0, t1, t2, t3, i0, i1, i2, i3] = *fixed;

        Ok(Self {
            version: b0 >> VERSION_SHIFT,
            padding: b0 & PADDING_BIT != 0,
            extension: b0 & EXTENSION_BIT != 0,
            csrc_count: b0 & CSRC_COUNT_MASK,
            marker: b1 & MARKER_BIT != 0,
            payload_type: b1 & PAYLOAD_TYPE_MASK,
            sequence: u16::from_be_bytes([s0, s1]),
            timestamp: u32::from_be_bytes([t0, t1, t2, t3]),
            ssrc: StreamIdentity::new(u32::from_be_bytes([i0, i1, i2, i3])),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a version-2 packet with the given fields followed by `payload`.
    pub(crate) fn packet(sequence: u16, timestamp: u32, ssrc: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.push(2 << VERSION_SHIFT);
        buf.push(96);
        buf.extend_from_slice(&sequence.to_be_bytes());
        buf.extend_from_slice(&timestamp.to_be_bytes());
        buf.extend_from_slice(&ssrc.to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn rejects_every_short_length() {
        let full = packet(1, 2, 3, &[]);
        for len in 0..HEADER_SIZE {
            assert_eq!(
                RtpHeader::parse(&full[..len]),
                Err(HeaderError::TooShort {
                    need: HEADER_SIZE,
                    have: len
                })
            );
        }
    }

    #[test]
    fn header_only_packet_parses() {
        let header = RtpHeader::parse(&packet(7, 8, 9, &[])).unwrap();
        assert_eq!(header.sequence, 7);
        assert_eq!(header.ssrc, StreamIdentity::new(9));
    }

    #[test]
    fn converts_from_network_order() {
        let buf = packet(0x0102, 0x0304_0506, 0x1234_ABCD, b"payload");
        let header = RtpHeader::parse(&buf).unwrap();
        assert_eq!(header.version, 2);
        assert_eq!(header.payload_type, 96);
        assert_eq!(header.sequence, 0x0102);
        assert_eq!(header.timestamp, 0x0304_0506);
        assert_eq!(header.ssrc.as_u32(), 0x1234_ABCD);
    }

    #[test]
    fn extracts_bit_fields() {
        let mut buf = packet(0, 0, 0, &[]);
        // V=2 P=1 X=1 CC=5, M=1 PT=127
        buf[0] = 0b1011_0101;
        buf[1] = 0b1111_1111;
        let header = RtpHeader::parse(&buf).unwrap();
        assert_eq!(header.version, 2);
        assert!(header.padding);
        assert!(header.extension);
        assert_eq!(header.csrc_count, 5);
        assert!(header.marker);
        assert_eq!(header.payload_type, 127);

        buf[0] = 0b0100_0000;
        buf[1] = 0b0000_0000;
        let header = RtpHeader::parse(&buf).unwrap();
        assert_eq!(header.version, 1);
        assert!(!header.padding);
        assert!(!header.extension);
        assert_eq!(header.csrc_count, 0);
        assert!(!header.marker);
        assert_eq!(header.payload_type, 0);
    }
}
