//! Reassembly of JPEG frames from RTP packets (RFC 2435).
//!
//! Feed the packets of one stream into a [`JpegDepacketizer`] in arrival
//! order; every packet carrying the marker bit yields either a complete JPEG
//! file or nothing, if the frame lost a fragment on the way.
//!
//! ```
//! use rtpjpeg::{Depacketizer, JpegDepacketizer, RtpPacket};
//!
//! let mut depacketizer = JpegDepacketizer::new();
//! // type-specific, fragment offset (24 bits), type, Q, width/8, height/8
//! let payload = [0, 0, 0, 0, 1, 50, 40, 30, 0xAA, 0xBB];
//! let frame = depacketizer
//!     .push(&RtpPacket::new(&payload, true, 3000))
//!     .expect("single-packet frame");
//! assert_eq!((frame.width, frame.height), (320, 240));
//! assert_eq!(frame.len(), 623 + 2);
//! ```

pub mod error;
pub mod media;
pub mod stream;
pub mod transport;

pub use error::{DepayError, ParseErrorKind, Result};
pub use media::jpeg::{DepacketizerConfig, JpegDepacketizer};
pub use media::rtp::RtpPacket;
pub use media::{Depacketizer, DepacketizerStats, VideoFrame};
pub use stream::{Stream, StreamConfig, StreamRegistry};
