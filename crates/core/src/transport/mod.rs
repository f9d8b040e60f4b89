//! Network transport feeding RTP packets into the depacketizers.
//!
//! Only plain RTP over UDP is handled: each datagram is one RTP packet,
//! delivered to the stream for its SSRC in arrival order. There is no
//! jitter buffer, reordering or retransmission; lost or reordered packets
//! simply cost the frame they belong to.
//!
//! Future: interleaved RTP over an RTSP TCP connection (RFC 2326 §10.12)
//! would feed the same [`StreamRegistry`](crate::stream::StreamRegistry).

pub mod udp;

pub use udp::{UdpReceiver, receive_loop};
