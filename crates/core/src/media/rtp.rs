use crate::error::{ParseErrorKind, Result};

/// Length of the RTP fixed header.
pub const RTP_HEADER_LEN: usize = 12;

/// A received RTP packet (RFC 3550 §5.1), borrowing its payload.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                  CSRC list (CC × 32 bits)                     |
/// |            header extension (if X), payload, padding (if P)   |
/// ```
///
/// The payload is only valid for the lifetime of the borrowed datagram, so
/// depacketizers copy whatever they keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpPacket<'a> {
    /// Codec payload with CSRCs, extension and padding removed.
    pub payload: &'a [u8],
    /// Marker bit: set on the last packet of a video frame.
    pub marker: bool,
    /// Media clock timestamp (90 kHz for video).
    pub timestamp: u32,
    pub sequence: u16,
    pub ssrc: u32,
    pub payload_type: u8,
}

impl<'a> RtpPacket<'a> {
    /// Wrap a payload whose RTP framing was already removed by the transport.
    pub fn new(payload: &'a [u8], marker: bool, timestamp: u32) -> Self {
        Self {
            payload,
            marker,
            timestamp,
            sequence: 0,
            ssrc: 0,
            payload_type: 0,
        }
    }

    /// Parse a complete RTP datagram.
    ///
    /// Version must be 2. The CSRC list and header extension are skipped;
    /// the padding count in the last octet is stripped from the payload.
    pub fn parse(datagram: &'a [u8]) -> Result<Self> {
        if datagram.len() < RTP_HEADER_LEN {
            return Err(ParseErrorKind::RtpTooShort.into());
        }

        let version = datagram[0] >> 6;
        if version != 2 {
            return Err(ParseErrorKind::UnsupportedVersion(version).into());
        }
        let padding = datagram[0] & 0x20 != 0;
        let extension = datagram[0] & 0x10 != 0;
        let csrc_count = usize::from(datagram[0] & 0x0f);

        let marker = datagram[1] & 0x80 != 0;
        let payload_type = datagram[1] & 0x7f;
        let sequence = u16::from_be_bytes([datagram[2], datagram[3]]);
        let timestamp = u32::from_be_bytes([datagram[4], datagram[5], datagram[6], datagram[7]]);
        let ssrc = u32::from_be_bytes([datagram[8], datagram[9], datagram[10], datagram[11]]);

        let mut start = RTP_HEADER_LEN + 4 * csrc_count;
        if extension {
            let ext = datagram
                .get(start..start + 4)
                .ok_or(ParseErrorKind::TruncatedExtension)?;
            let words = usize::from(u16::from_be_bytes([ext[2], ext[3]]));
            start += 4 + 4 * words;
        }
        if start > datagram.len() {
            return Err(ParseErrorKind::TruncatedExtension.into());
        }

        let mut end = datagram.len();
        if padding {
            let count = usize::from(datagram[end - 1]);
            if count == 0 || count > end - start {
                return Err(ParseErrorKind::InvalidPadding.into());
            }
            end -= count;
        }

        Ok(Self {
            payload: &datagram[start..end],
            marker,
            timestamp,
            sequence,
            ssrc,
            payload_type,
        })
    }
}
