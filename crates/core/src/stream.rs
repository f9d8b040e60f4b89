use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::media::jpeg::{DepacketizerConfig, JpegDepacketizer};
use crate::media::rtp::RtpPacket;
use crate::media::{Depacketizer, DepacketizerStats, VideoFrame};

/// Default limit on how long one frame may take to reassemble.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

/// Default time without packets after which a stream is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-stream reassembly settings used by a [`StreamRegistry`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Configuration for each stream's [`JpegDepacketizer`].
    pub depacketizer: DepacketizerConfig,
    /// A frame still incomplete after this long is discarded when the next
    /// packet arrives. `None` waits forever.
    pub frame_timeout: Option<Duration>,
    /// Streams silent for this long are removed by
    /// [`StreamRegistry::evict_idle`]. `None` keeps them forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            depacketizer: DepacketizerConfig::default(),
            frame_timeout: Some(DEFAULT_FRAME_TIMEOUT),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        self.depacketizer.validate()
    }
}

struct StreamState {
    depacketizer: Box<dyn Depacketizer>,
    /// When the first packet of the frame in progress arrived.
    frame_started: Option<Instant>,
    last_packet: Instant,
}

/// One incoming RTP stream (one SSRC) and its reassembly state.
///
/// The depacketizer sits behind a mutex so that a stream can be fed from
/// any thread; packets must still be pushed in arrival order.
pub struct Stream {
    ssrc: u32,
    frame_timeout: Option<Duration>,
    state: Mutex<StreamState>,
}

impl Stream {
    pub fn new(
        ssrc: u32,
        depacketizer: Box<dyn Depacketizer>,
        frame_timeout: Option<Duration>,
        now: Instant,
    ) -> Self {
        Self {
            ssrc,
            frame_timeout,
            state: Mutex::new(StreamState {
                depacketizer,
                frame_started: None,
                last_packet: now,
            }),
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Feed one packet received at `now`.
    ///
    /// A frame that has been in progress for longer than the frame timeout
    /// is discarded before the packet is processed.
    pub fn push(&self, packet: &RtpPacket<'_>, now: Instant) -> Option<VideoFrame> {
        let mut state = self.state.lock();
        state.last_packet = now;

        if let (Some(timeout), Some(started)) = (self.frame_timeout, state.frame_started) {
            let elapsed = now.saturating_duration_since(started);
            if elapsed > timeout {
                tracing::warn!(
                    ssrc = format_args!("{:#010X}", self.ssrc),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "frame reassembly timed out, discarding"
                );
                state.depacketizer.reset();
                state.frame_started = None;
            }
        }

        let frame = state.depacketizer.push(packet);
        state.frame_started = if state.depacketizer.in_progress() {
            Some(state.frame_started.unwrap_or(now))
        } else {
            None
        };
        frame
    }

    /// Discard the frame in progress.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.depacketizer.reset();
        state.frame_started = None;
    }

    pub fn stats(&self) -> DepacketizerStats {
        self.state.lock().depacketizer.stats()
    }

    /// Time since the last packet.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state.lock().last_packet)
    }
}

/// Registry of active streams, keyed by SSRC.
///
/// Each SSRC gets its own depacketizer on first sight, so interleaved
/// streams arriving on one socket never share reassembly state. Cloning the
/// registry yields another handle to the same streams.
#[derive(Clone)]
pub struct StreamRegistry {
    streams: Arc<RwLock<HashMap<u32, Arc<Stream>>>>,
    config: Arc<StreamConfig>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::from_validated(StreamConfig::default())
    }

    pub fn with_config(config: StreamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: StreamConfig) -> Self {
        Self {
            streams: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
        }
    }

    /// Register a stream with a custom depacketizer. Replaces any existing
    /// stream with the same SSRC.
    pub fn insert(&self, ssrc: u32, depacketizer: Box<dyn Depacketizer>) -> Arc<Stream> {
        let stream = Arc::new(Stream::new(
            ssrc,
            depacketizer,
            self.config.frame_timeout,
            Instant::now(),
        ));
        self.streams.write().insert(ssrc, stream.clone());
        tracing::info!(ssrc = format_args!("{:#010X}", ssrc), "stream registered");
        stream
    }

    /// Look up the stream for `ssrc`, creating a JPEG stream if it is new.
    pub fn get_or_insert(&self, ssrc: u32, now: Instant) -> Result<Arc<Stream>> {
        if let Some(stream) = self.get(ssrc) {
            return Ok(stream);
        }

        let mut streams = self.streams.write();
        if let Some(stream) = streams.get(&ssrc) {
            return Ok(stream.clone());
        }
        let depacketizer = JpegDepacketizer::with_config(&self.config.depacketizer)?;
        let stream = Arc::new(Stream::new(
            ssrc,
            Box::new(depacketizer),
            self.config.frame_timeout,
            now,
        ));
        streams.insert(ssrc, stream.clone());
        tracing::info!(ssrc = format_args!("{:#010X}", ssrc), "stream registered");
        Ok(stream)
    }

    pub fn get(&self, ssrc: u32) -> Option<Arc<Stream>> {
        self.streams.read().get(&ssrc).cloned()
    }

    /// Tear down a stream (e.g. on RTCP BYE).
    pub fn remove(&self, ssrc: u32) -> Option<Arc<Stream>> {
        let removed = self.streams.write().remove(&ssrc);
        if removed.is_some() {
            tracing::info!(ssrc = format_args!("{:#010X}", ssrc), "stream removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }

    /// SSRCs of all registered streams, ascending.
    pub fn ssrcs(&self) -> Vec<u32> {
        let mut ssrcs: Vec<u32> = self.streams.read().keys().copied().collect();
        ssrcs.sort_unstable();
        ssrcs
    }

    /// Remove streams that have not received a packet within the idle
    /// timeout. Returns the removed SSRCs.
    pub fn evict_idle(&self, now: Instant) -> Vec<u32> {
        let Some(idle_timeout) = self.config.idle_timeout else {
            return Vec::new();
        };

        let mut evicted = Vec::new();
        self.streams.write().retain(|&ssrc, stream| {
            let keep = stream.idle_for(now) <= idle_timeout;
            if !keep {
                evicted.push(ssrc);
            }
            keep
        });
        for ssrc in &evicted {
            tracing::info!(ssrc = format_args!("{:#010X}", ssrc), "idle stream removed");
        }
        evicted
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::jpeg::header::{JpegHeader, QuantHeader};

    fn jpeg_payload(offset: u32, scan: &[u8]) -> Vec<u8> {
        let header = JpegHeader {
            type_specific: 0,
            fragment_offset: offset,
            jpeg_type: 1,
            q: 255,
            width: 64,
            height: 48,
            restart: None,
            quant: (offset == 0).then(|| QuantHeader {
                mbz: 0,
                precision: 0,
                length: 128,
                tables: Some([1; 128]),
            }),
        };
        let mut out = Vec::new();
        header.write(&mut out);
        out.extend_from_slice(scan);
        out
    }

    #[test]
    fn get_or_insert_reuses_stream() {
        let registry = StreamRegistry::new();
        let now = Instant::now();
        let a = registry.get_or_insert(0x1234, now).unwrap();
        let b = registry.get_or_insert(0x1234, now).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.ssrc(), 0x1234);
        assert_eq!(registry.len(), 1);

        registry.get_or_insert(0x0001, now).unwrap();
        assert_eq!(registry.ssrcs(), vec![0x0001, 0x1234]);
    }

    #[test]
    fn streams_are_independent() {
        let registry = StreamRegistry::new();
        let now = Instant::now();
        let a = registry.get_or_insert(1, now).unwrap();
        let b = registry.get_or_insert(2, now).unwrap();

        let first = jpeg_payload(0, &[0xAA; 10]);
        let second = jpeg_payload(10, &[0xBB; 10]);
        assert!(a.push(&RtpPacket::new(&first, false, 0), now).is_none());
        // B's complete frame does not disturb A's frame in progress.
        assert!(b.push(&RtpPacket::new(&first, true, 0), now).is_some());
        let frame = a.push(&RtpPacket::new(&second, true, 0), now).unwrap();
        assert_eq!(frame.len(), 623 + 20);
    }

    #[test]
    fn remove_stream() {
        let registry = StreamRegistry::new();
        registry.get_or_insert(7, Instant::now()).unwrap();
        assert!(registry.remove(7).is_some());
        assert!(registry.remove(7).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn insert_custom_depacketizer() {
        let registry = StreamRegistry::new();
        let config = DepacketizerConfig {
            buffer_capacity: 700,
            derive_quant_tables: false,
        };
        let d = JpegDepacketizer::with_config(&config).unwrap();
        let stream = registry.insert(9, Box::new(d));
        assert!(Arc::ptr_eq(&stream, &registry.get(9).unwrap()));

        let big = jpeg_payload(0, &[0; 100]);
        let packet = RtpPacket::new(&big, true, 0);
        assert!(stream.push(&packet, Instant::now()).is_none());
        assert_eq!(stream.stats().discarded_frames, 1);
    }

    #[test]
    fn stalled_frame_times_out() {
        let registry = StreamRegistry::new();
        let t0 = Instant::now();
        let stream = registry.get_or_insert(1, t0).unwrap();

        let partial = jpeg_payload(0, &[0; 100]);
        stream.push(&RtpPacket::new(&partial, false, 0), t0);

        let complete = jpeg_payload(0, &[0; 10]);
        let later = t0 + DEFAULT_FRAME_TIMEOUT + Duration::from_millis(1);
        let frame = stream.push(&RtpPacket::new(&complete, true, 3000), later);
        assert_eq!(frame.map(|f| f.timestamp), Some(3000));
        assert_eq!(stream.stats().discarded_frames, 1);
    }

    #[test]
    fn no_timeout_keeps_waiting() {
        let config = StreamConfig {
            frame_timeout: None,
            ..Default::default()
        };
        let registry = StreamRegistry::with_config(config).unwrap();
        let t0 = Instant::now();
        let stream = registry.get_or_insert(1, t0).unwrap();

        let head = jpeg_payload(0, &[0; 100]);
        stream.push(&RtpPacket::new(&head, false, 0), t0);
        let later = t0 + Duration::from_secs(3600);
        let tail = jpeg_payload(100, &[0; 10]);
        let frame = stream.push(&RtpPacket::new(&tail, true, 0), later);
        assert_eq!(frame.map(|f| f.len()), Some(623 + 110));
    }

    #[test]
    fn explicit_reset() {
        let registry = StreamRegistry::new();
        let now = Instant::now();
        let stream = registry.get_or_insert(1, now).unwrap();
        let head = jpeg_payload(0, &[0; 100]);
        stream.push(&RtpPacket::new(&head, false, 0), now);
        stream.reset();
        assert_eq!(stream.stats().discarded_frames, 1);
    }

    #[test]
    fn evict_idle_streams() {
        let registry = StreamRegistry::new();
        let t0 = Instant::now();
        registry.get_or_insert(1, t0).unwrap();
        let busy = registry.get_or_insert(2, t0).unwrap();

        let later = t0 + DEFAULT_IDLE_TIMEOUT + Duration::from_secs(1);
        let frame = jpeg_payload(0, &[0; 4]);
        busy.push(&RtpPacket::new(&frame, true, 0), later);

        assert_eq!(registry.evict_idle(later), vec![1]);
        assert_eq!(registry.ssrcs(), vec![2]);
    }

    #[test]
    fn eviction_disabled() {
        let config = StreamConfig {
            idle_timeout: None,
            ..Default::default()
        };
        let registry = StreamRegistry::with_config(config).unwrap();
        let t0 = Instant::now();
        registry.get_or_insert(1, t0).unwrap();
        let next_day = t0 + Duration::from_secs(86400);
        assert!(registry.evict_idle(next_day).is_empty());
    }

    #[test]
    fn invalid_config_rejected() {
        let config = StreamConfig {
            depacketizer: DepacketizerConfig {
                buffer_capacity: 10,
                derive_quant_tables: true,
            },
            ..Default::default()
        };
        assert!(StreamRegistry::with_config(config).is_err());
    }
}
