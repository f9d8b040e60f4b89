//! RTP/JPEG depacketizer (RFC 2435).
//!
//! RFC 2435 transmits only the entropy-coded scan of each JPEG image. The
//! marker segments are dropped by the sender and rebuilt here from a fixed
//! [`template`] plus the few values carried in each packet's payload header
//! ([`header`]):
//!
//! - **Fragment offset**: absolute byte position of the packet's scan data
//!   within the frame. Because it is absolute, a lost packet shows up as a
//!   gap between the offset expected and the one received; no sequence
//!   numbers are needed.
//! - **Type, width, height, Q**: patched into SOF0 and the two DQT
//!   segments, but only from the first fragment (offset 0) of a frame.
//!
//! Fragments are written straight into one preallocated buffer that starts
//! with the template header, so reassembly does not allocate. When the
//! packet with the marker bit arrives the frame is either copied out as a
//! [`VideoFrame`] or, if any fragment was missing, out of place or
//! malformed, dropped. Either way the state is reset for the next frame;
//! corruption never outlives the frame it occurred in.
//!
//! ```text
//! ACCUMULATING --marker bit--> BOUNDARY (emit or discard) --> ACCUMULATING
//! ```

pub mod header;
pub mod qtables;
pub mod template;

use std::fmt;

use header::{JpegHeader, QuantHeader};
use template::{DATA_OFFSET, QUANT_TABLE_LEN, TEMPLATE};

use super::rtp::RtpPacket;
use super::{Depacketizer, DepacketizerStats, VideoFrame};
use crate::error::{DepayError, Result};

/// Default reassembly buffer size, header included.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1_000_000;

/// Static payload type for JPEG (RFC 3551 §6).
pub const PAYLOAD_TYPE: u8 = 26;

type QuantTables = [u8; 2 * QUANT_TABLE_LEN];

/// Tunables for a [`JpegDepacketizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepacketizerConfig {
    /// Size of the reassembly buffer, including the 623-byte header. Frames
    /// larger than this are dropped.
    pub buffer_capacity: usize,
    /// Derive quantization tables for Q 1–99 (RFC 2435 Appendix A).
    /// When false, frames using predefined Q values keep whatever tables the
    /// header already holds.
    pub derive_quant_tables: bool,
}

impl Default for DepacketizerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            derive_quant_tables: true,
        }
    }
}

impl DepacketizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity < DATA_OFFSET {
            return Err(DepayError::InvalidConfig(format!(
                "buffer capacity {} is smaller than the {DATA_OFFSET}-byte JPEG header",
                self.buffer_capacity
            )));
        }
        Ok(())
    }
}

/// Reassembles RFC 2435 fragments of one stream into complete JPEG files.
pub struct JpegDepacketizer {
    /// Template header followed by the scan data of the frame in progress.
    buffer: Box<[u8]>,
    /// End of the last fragment written.
    write_cursor: usize,
    /// Scan bytes written so far for the frame; the offset the next
    /// fragment must carry.
    expected_offset: u32,
    corrupted: bool,
    /// Timestamp of the first packet of the frame in progress.
    frame_timestamp: Option<u32>,
    last_emitted_timestamp: Option<u32>,
    width: u16,
    height: u16,
    derive_quant_tables: bool,
    /// Tables per Q value: inline tables as last received for Q ≥ 128,
    /// derived tables for Q < 128.
    qtables: Vec<Option<QuantTables>>,
    stats: DepacketizerStats,
}

impl JpegDepacketizer {
    /// Create with the default configuration.
    pub fn new() -> Self {
        Self::build(&DepacketizerConfig::default())
    }

    pub fn with_config(config: &DepacketizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: &DepacketizerConfig) -> Self {
        let mut buffer = vec![0u8; config.buffer_capacity].into_boxed_slice();
        buffer[..DATA_OFFSET].copy_from_slice(&TEMPLATE);
        tracing::debug!(
            capacity = config.buffer_capacity,
            "JPEG depacketizer created"
        );
        Self {
            buffer,
            write_cursor: DATA_OFFSET,
            expected_offset: 0,
            corrupted: false,
            frame_timestamp: None,
            last_emitted_timestamp: None,
            width: 0,
            height: 0,
            derive_quant_tables: config.derive_quant_tables,
            qtables: vec![None; 256],
            stats: DepacketizerStats::default(),
        }
    }

    /// The fragment offset the next packet must carry for the frame in
    /// progress to stay intact.
    pub fn expected_offset(&self) -> u32 {
        self.expected_offset
    }

    /// Whether the frame in progress will be dropped at its boundary.
    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    /// Timestamp of the most recently emitted frame.
    pub fn last_emitted_timestamp(&self) -> Option<u32> {
        self.last_emitted_timestamp
    }

    /// Flag the frame in progress. Returns true the first time per frame,
    /// so callers log each corrupted frame once.
    fn mark_corrupted(&mut self) -> bool {
        !std::mem::replace(&mut self.corrupted, true)
    }

    fn write_fragment(&mut self, header: &JpegHeader, scan: &[u8]) {
        let offset = header.fragment_offset;
        tracing::trace!(offset, len = scan.len(), q = header.q, "JPEG fragment");

        if offset != self.expected_offset && self.mark_corrupted() {
            tracing::debug!(
                expected = self.expected_offset,
                actual = offset,
                "fragment offset mismatch, frame will be dropped"
            );
        }

        if offset == 0 {
            self.apply_frame_header(header);
        }

        let start = DATA_OFFSET + offset as usize;
        let end = start + scan.len();
        if end > self.buffer.len() {
            if self.mark_corrupted() {
                tracing::debug!(
                    offset,
                    len = scan.len(),
                    capacity = self.buffer.len(),
                    "fragment exceeds reassembly buffer, frame will be dropped"
                );
            }
            return;
        }

        // Fragments after a mismatch are still written; the frame is dropped
        // at its boundary regardless.
        self.buffer[start..end].copy_from_slice(scan);
        self.write_cursor = end;
        self.expected_offset = (end - DATA_OFFSET) as u32;
    }

    /// Patch dimensions, sampling and quantization tables from a first
    /// fragment.
    fn apply_frame_header(&mut self, header: &JpegHeader) {
        let q = header.q;
        let tables = match &header.quant {
            Some(QuantHeader {
                tables: Some(tables),
                ..
            }) => {
                self.qtables[usize::from(q)] = Some(*tables);
                Some(*tables)
            }
            Some(_) => {
                let cached = self.qtables[usize::from(q)];
                if cached.is_none() {
                    tracing::debug!(
                        q,
                        "no quantization tables received yet for Q, keeping previous"
                    );
                }
                cached
            }
            None if self.derive_quant_tables => self.derived_tables(q),
            None => None,
        };

        let out = &mut self.buffer[..DATA_OFFSET];
        if let Some(tables) = &tables {
            template::write_quant_tables(out, tables);
        }
        template::write_dimensions(out, header.width, header.height);
        template::write_sampling(out, header.jpeg_type);
        self.width = header.width;
        self.height = header.height;
    }

    fn derived_tables(&mut self, q: u8) -> Option<QuantTables> {
        let slot = &mut self.qtables[usize::from(q)];
        if slot.is_none() {
            *slot = qtables::derived_tables(q);
        }
        *slot
    }

    fn finish_frame(&mut self, timestamp: u32) -> Option<VideoFrame> {
        let frame = if self.corrupted {
            self.stats.discarded_frames += 1;
            tracing::debug!(timestamp, "discarding corrupted JPEG frame");
            None
        } else {
            if let Some(last) = self.last_emitted_timestamp {
                // Serial-number comparison; RTP timestamps wrap.
                if (timestamp.wrapping_sub(last) as i32) <= 0 {
                    self.stats.non_increasing_timestamps += 1;
                    tracing::debug!(timestamp, last, "frame timestamp did not advance");
                }
            }
            self.last_emitted_timestamp = Some(timestamp);
            self.stats.frames += 1;
            tracing::trace!(timestamp, len = self.write_cursor, "JPEG frame complete");
            Some(VideoFrame {
                data: self.buffer[..self.write_cursor].to_vec(),
                timestamp,
                is_key_frame: true,
                width: self.width,
                height: self.height,
            })
        };
        self.start_next_frame();
        frame
    }

    fn start_next_frame(&mut self) {
        self.expected_offset = 0;
        self.corrupted = false;
        self.frame_timestamp = None;
    }
}

impl Default for JpegDepacketizer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for JpegDepacketizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JpegDepacketizer")
            .field("capacity", &self.buffer.len())
            .field("write_cursor", &self.write_cursor)
            .field("expected_offset", &self.expected_offset)
            .field("corrupted", &self.corrupted)
            .field("frame_timestamp", &self.frame_timestamp)
            .field("last_emitted_timestamp", &self.last_emitted_timestamp)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Depacketizer for JpegDepacketizer {
    fn push(&mut self, packet: &RtpPacket<'_>) -> Option<VideoFrame> {
        self.stats.packets += 1;

        match self.frame_timestamp {
            None => self.frame_timestamp = Some(packet.timestamp),
            Some(ts) if ts != packet.timestamp => {
                self.stats.timestamp_changes += 1;
                tracing::debug!(
                    frame = ts,
                    packet = packet.timestamp,
                    "timestamp changed within frame"
                );
            }
            Some(_) => {}
        }

        match JpegHeader::parse(packet.payload) {
            Ok(header) => {
                let scan = &packet.payload[header.encoded_len()..];
                self.write_fragment(&header, scan);
            }
            Err(e) => {
                if self.mark_corrupted() {
                    tracing::debug!(error = %e, "bad RTP/JPEG header, frame will be dropped");
                }
            }
        }

        if packet.marker {
            self.finish_frame(packet.timestamp)
        } else {
            None
        }
    }

    fn reset(&mut self) {
        if self.in_progress() {
            self.stats.discarded_frames += 1;
            tracing::debug!(
                written = self.expected_offset,
                "abandoning JPEG frame in progress"
            );
        }
        self.start_next_frame();
    }

    fn in_progress(&self) -> bool {
        self.frame_timestamp.is_some()
    }

    fn stats(&self) -> DepacketizerStats {
        self.stats
    }
}
