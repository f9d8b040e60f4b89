//! Media codecs and RTP depacketization.
//!
//! This module provides the [`Depacketizer`] trait and codec-specific
//! implementations that turn a stream of RTP packets back into complete,
//! independently decodable video frames.
//!
//! ## RTP overview (RFC 3550)
//!
//! Each encoded video frame arrives as one or more RTP packets. Every RTP
//! packet carries a 12-byte fixed header ([`rtp::RtpPacket`]) containing:
//!
//! - **Sequence number** (16-bit, wrapping): for reordering and loss detection.
//! - **Timestamp** (32-bit): media clock, 90 kHz for video; shared by all
//!   packets of one frame.
//! - **SSRC** (32-bit): identifies the sending stream.
//! - **Marker bit**: set on the last packet of a frame.
//!
//! ## Supported codecs
//!
//! | Codec | Module | RFC | Status |
//! |-------|--------|-----|--------|
//! | JPEG  | [`jpeg`] | [RFC 2435](https://tools.ietf.org/html/rfc2435) | Implemented |

pub mod jpeg;
pub mod rtp;

use rtp::RtpPacket;

/// A complete frame handed from a depacketizer to its consumer.
///
/// The data is an owned copy; the depacketizer reuses its reassembly
/// buffer for the next frame, so the consumer may keep frames as long as it
/// likes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// The encoded image (for JPEG, a complete JFIF file).
    pub data: Vec<u8>,
    /// RTP timestamp of the packet carrying the marker bit.
    pub timestamp: u32,
    /// Whether the frame decodes on its own. Always true for JPEG.
    pub is_key_frame: bool,
    pub width: u16,
    pub height: u16,
}

impl VideoFrame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Counters kept by a depacketizer over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepacketizerStats {
    /// Packets passed to [`Depacketizer::push`].
    pub packets: u64,
    /// Frames emitted.
    pub frames: u64,
    /// Frames dropped because of loss, reordering or malformed headers,
    /// or abandoned by [`Depacketizer::reset`].
    pub discarded_frames: u64,
    /// Emitted frames whose timestamp did not advance past the previous one.
    pub non_increasing_timestamps: u64,
    /// Packets whose timestamp differed from the first packet of their
    /// frame. Advisory only.
    pub timestamp_changes: u64,
}

/// Codec-specific RTP depacketizer.
///
/// One instance holds the reassembly state of exactly one stream and must
/// be fed by a single producer, in arrival order. It performs no I/O and
/// never blocks; each call to [`push`](Self::push) is a complete unit of
/// work.
///
/// ## Implementing a new codec
///
/// 1. Create a new module (e.g. `media/h264.rs`)
/// 2. Implement `Depacketizer` for your type
/// 3. Register it with a [`crate::stream::StreamRegistry`] via
///    [`insert`](crate::stream::StreamRegistry::insert)
pub trait Depacketizer: Send {
    /// Consume one packet. Returns the completed frame when the packet
    /// closes a frame that was reassembled without errors.
    fn push(&mut self, packet: &RtpPacket<'_>) -> Option<VideoFrame>;

    /// Abandon the frame in progress, as if a boundary had been reached
    /// with the frame discarded.
    fn reset(&mut self);

    /// Whether packets of an unfinished frame have been consumed.
    fn in_progress(&self) -> bool;

    fn stats(&self) -> DepacketizerStats;
}
