//! RFC 2435 payload header parsing.
//!
//! Every RTP/JPEG payload starts with an 8-byte main header, optionally
//! followed by a restart marker header and, on the first fragment of a frame
//! using Q ≥ 128, a quantization table header:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | Type-specific |              Fragment Offset                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      Type     |       Q       |     Width     |     Height    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |       Restart Interval        |F|L|       Restart Count       |  types 64-127
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      MBZ      |   Precision   |             Length            |  Q >= 128, offset 0
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Quantization Table Data                    |
//! |                              ...                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! All multi-byte fields are big-endian. Everything after the headers is
//! entropy-coded scan data.

use super::template::QUANT_TABLE_LEN;
use crate::error::{ParseErrorKind, Result};

/// Length of the main header.
pub const MAIN_HEADER_LEN: usize = 8;
/// Length of the restart marker header.
pub const RESTART_HEADER_LEN: usize = 4;
/// Length of the quantization table header, excluding table data.
pub const QUANT_HEADER_LEN: usize = 4;
/// The only inline table length this depacketizer accepts: two 8-bit tables.
pub const INLINE_TABLES_LEN: u16 = (2 * QUANT_TABLE_LEN) as u16;

/// Restart marker header (RFC 2435 §3.1.7), present for types 64–127.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartHeader {
    pub interval: u16,
    pub first: bool,
    pub last: bool,
    /// 14-bit restart count.
    pub count: u16,
}

/// Quantization table header (RFC 2435 §3.1.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantHeader {
    pub mbz: u8,
    pub precision: u8,
    /// Declared table data length: 0 (reuse tables previously sent with
    /// this Q) or 128.
    pub length: u16,
    /// Luma then chroma table, present when `length == 128`.
    pub tables: Option<[u8; 2 * QUANT_TABLE_LEN]>,
}

/// A decoded RFC 2435 payload header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegHeader {
    pub type_specific: u8,
    /// Byte offset of this fragment's scan data within the frame (24-bit).
    pub fragment_offset: u32,
    pub jpeg_type: u8,
    pub q: u8,
    /// Width in pixels (the wire carries multiples of 8).
    pub width: u16,
    /// Height in pixels (the wire carries multiples of 8).
    pub height: u16,
    pub restart: Option<RestartHeader>,
    pub quant: Option<QuantHeader>,
}

impl JpegHeader {
    /// Decode the headers at the start of `payload`.
    ///
    /// The quantization table header is only expected when `Q ≥ 128` and the
    /// fragment offset is 0; later fragments of such a frame start their
    /// scan data right after the main (and restart) header.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < MAIN_HEADER_LEN {
            return Err(ParseErrorKind::JpegHeaderTooShort.into());
        }

        let type_specific = payload[0];
        let fragment_offset = u32::from_be_bytes([0, payload[1], payload[2], payload[3]]);
        let jpeg_type = payload[4];
        let q = payload[5];
        let width = u16::from(payload[6]) * 8;
        let height = u16::from(payload[7]) * 8;
        let mut pos = MAIN_HEADER_LEN;

        let restart = if (64..=127).contains(&jpeg_type) {
            let b = payload
                .get(pos..pos + RESTART_HEADER_LEN)
                .ok_or(ParseErrorKind::RestartHeaderTooShort)?;
            pos += RESTART_HEADER_LEN;
            let flags = u16::from_be_bytes([b[2], b[3]]);
            Some(RestartHeader {
                interval: u16::from_be_bytes([b[0], b[1]]),
                first: flags & 0x8000 != 0,
                last: flags & 0x4000 != 0,
                count: flags & 0x3fff,
            })
        } else {
            None
        };

        let quant = if q >= 128 && fragment_offset == 0 {
            let b = payload
                .get(pos..pos + QUANT_HEADER_LEN)
                .ok_or(ParseErrorKind::QuantHeaderTooShort)?;
            pos += QUANT_HEADER_LEN;
            let length = u16::from_be_bytes([b[2], b[3]]);
            let tables = match length {
                0 => None,
                INLINE_TABLES_LEN => {
                    let data = payload
                        .get(pos..pos + INLINE_TABLES_LEN as usize)
                        .ok_or(ParseErrorKind::QuantTablesTruncated)?;
                    pos += INLINE_TABLES_LEN as usize;
                    let mut tables = [0u8; 2 * QUANT_TABLE_LEN];
                    tables.copy_from_slice(data);
                    Some(tables)
                }
                other => return Err(ParseErrorKind::UnsupportedQuantLength(other).into()),
            };
            Some(QuantHeader {
                mbz: b[0],
                precision: b[1],
                length,
                tables,
            })
        } else {
            None
        };

        let header = JpegHeader {
            type_specific,
            fragment_offset,
            jpeg_type,
            q,
            width,
            height,
            restart,
            quant,
        };
        debug_assert_eq!(header.encoded_len(), pos);
        Ok(header)
    }

    /// Number of payload bytes taken by the headers; scan data starts here.
    pub fn encoded_len(&self) -> usize {
        let mut len = MAIN_HEADER_LEN;
        if self.restart.is_some() {
            len += RESTART_HEADER_LEN;
        }
        if let Some(quant) = &self.quant {
            len += QUANT_HEADER_LEN;
            if quant.tables.is_some() {
                len += INLINE_TABLES_LEN as usize;
            }
        }
        len
    }

    /// Serialize the headers (the inverse of [`parse`](Self::parse)).
    ///
    /// Width and height are written in 8-pixel units; the fragment offset is
    /// truncated to 24 bits.
    pub fn write(&self, out: &mut Vec<u8>) {
        let offset = self.fragment_offset.to_be_bytes();
        out.push(self.type_specific);
        out.extend_from_slice(&offset[1..]);
        out.push(self.jpeg_type);
        out.push(self.q);
        out.push((self.width / 8) as u8);
        out.push((self.height / 8) as u8);

        if let Some(r) = &self.restart {
            let flags = (u16::from(r.first) << 15) | (u16::from(r.last) << 14) | (r.count & 0x3fff);
            out.extend_from_slice(&r.interval.to_be_bytes());
            out.extend_from_slice(&flags.to_be_bytes());
        }

        if let Some(quant) = &self.quant {
            out.push(quant.mbz);
            out.push(quant.precision);
            out.extend_from_slice(&quant.length.to_be_bytes());
            if let Some(tables) = &quant.tables {
                out.extend_from_slice(tables);
            }
        }
    }
}
