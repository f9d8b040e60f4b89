use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::media::VideoFrame;
use crate::media::rtp::RtpPacket;
use crate::stream::StreamRegistry;

/// How long [`UdpReceiver::recv`] blocks before giving the caller a chance
/// to check its stop flag.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Largest datagram accepted; anything longer is truncated by the socket.
pub const MAX_DATAGRAM_LEN: usize = 65_536;

/// How often [`receive_loop`] sweeps idle streams.
const EVICT_INTERVAL: Duration = Duration::from_secs(1);

/// Pause after a failed receive so a persistent socket error cannot spin.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Source of datagrams for [`receive_loop`].
trait DatagramSource {
    fn recv<'a>(&self, buf: &'a mut [u8]) -> Result<Option<(&'a [u8], SocketAddr)>>;
}

/// UDP socket receiving RTP datagrams.
pub struct UdpReceiver {
    socket: UdpSocket,
}

impl UdpReceiver {
    /// Bind to `addr` (e.g. `0.0.0.0:5004`, or port 0 for an ephemeral port).
    pub fn bind(addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        tracing::info!(addr = %socket.local_addr()?, "RTP receiver bound");
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive one datagram into `buf`. Returns `Ok(None)` when nothing
    /// arrived within [`POLL_INTERVAL`].
    pub fn recv<'a>(&self, buf: &'a mut [u8]) -> Result<Option<(&'a [u8], SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok((len, from)) => Ok(Some((&buf[..len], from))),
            Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl DatagramSource for UdpReceiver {
    fn recv<'a>(&self, buf: &'a mut [u8]) -> Result<Option<(&'a [u8], SocketAddr)>> {
        UdpReceiver::recv(self, buf)
    }
}

/// Blocking receive loop: parse each datagram as RTP, feed it to the stream
/// for its SSRC and call `on_frame(ssrc, frame)` for every completed frame.
///
/// Datagrams with a different payload type (when `payload_type` is set) or
/// an unparsable RTP header are dropped. Checks the `running` flag between
/// datagrams, at least every [`POLL_INTERVAL`], and returns once it is
/// cleared.
pub fn receive_loop<F>(
    receiver: UdpReceiver,
    registry: StreamRegistry,
    payload_type: Option<u8>,
    running: Arc<AtomicBool>,
    on_frame: F,
) where
    F: FnMut(u32, VideoFrame),
{
    run(&receiver, &registry, payload_type, &running, on_frame);
}

fn run<S, F>(
    source: &S,
    registry: &StreamRegistry,
    payload_type: Option<u8>,
    running: &AtomicBool,
    mut on_frame: F,
) where
    S: DatagramSource,
    F: FnMut(u32, VideoFrame),
{
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
    let mut last_sweep = Instant::now();

    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now.saturating_duration_since(last_sweep) >= EVICT_INTERVAL {
            registry.evict_idle(now);
            last_sweep = now;
        }

        let (datagram, from) = match source.recv(&mut buf) {
            Ok(Some(received)) => received,
            Ok(None) => continue,
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "UDP receive error");
                    thread::sleep(ERROR_BACKOFF);
                }
                continue;
            }
        };

        let packet = match RtpPacket::parse(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!(%from, error = %e, "dropping non-RTP datagram");
                continue;
            }
        };
        if payload_type.is_some_and(|pt| pt != packet.payload_type) {
            tracing::trace!(
                %from,
                pt = packet.payload_type,
                "dropping packet with foreign payload type"
            );
            continue;
        }

        let stream = match registry.get_or_insert(packet.ssrc, now) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "cannot create stream");
                continue;
            }
        };
        if let Some(frame) = stream.push(&packet, now) {
            on_frame(stream.ssrc(), frame);
        }
    }
    tracing::debug!("receive loop exited");
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io;

    use super::*;
    use crate::error::DepayError;

    /// Fails every receive and clears `running` after `limit` calls.
    struct FailingSource<'a> {
        calls: Cell<u32>,
        limit: u32,
        running: &'a AtomicBool,
    }

    impl DatagramSource for FailingSource<'_> {
        fn recv<'b>(&self, _buf: &'b mut [u8]) -> Result<Option<(&'b [u8], SocketAddr)>> {
            let calls = self.calls.get() + 1;
            self.calls.set(calls);
            if calls >= self.limit {
                self.running.store(false, Ordering::SeqCst);
            }
            Err(DepayError::Io(io::Error::other("network unreachable")))
        }
    }

    #[test]
    fn recv_times_out_without_data() {
        let receiver = UdpReceiver::bind("127.0.0.1:0").unwrap();
        let mut buf = [0u8; 64];
        assert!(receiver.recv(&mut buf).unwrap().is_none());
    }

    #[test]
    fn recv_returns_datagram() {
        let receiver = UdpReceiver::bind("127.0.0.1:0").unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(&[1, 2, 3], receiver.local_addr().unwrap())
            .unwrap();

        let mut buf = [0u8; 64];
        let (data, from) = receiver.recv(&mut buf).unwrap().expect("datagram");
        assert_eq!(data, &[1, 2, 3]);
        assert_eq!(from, sender.local_addr().unwrap());
    }

    #[test]
    fn receive_errors_back_off() {
        let running = AtomicBool::new(true);
        let source = FailingSource {
            calls: Cell::new(0),
            limit: 3,
            running: &running,
        };
        let registry = StreamRegistry::new();
        let mut frames = 0;
        let started = Instant::now();
        run(&source, &registry, None, &running, |_, _| frames += 1);

        assert_eq!(frames, 0);
        assert_eq!(source.calls.get(), 3);
        assert!(started.elapsed() >= 2 * ERROR_BACKOFF);
    }
}
