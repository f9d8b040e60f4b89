//! End-to-end: RTP/JPEG datagrams over UDP loopback through `receive_loop`.

use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rtpjpeg::StreamRegistry;
use rtpjpeg::transport::{UdpReceiver, receive_loop};

fn rtp(marker: bool, pt: u8, seq: u16, ts: u32, ssrc: u32, payload: &[u8]) -> Vec<u8> {
    let mut d = vec![0x80, (u8::from(marker) << 7) | pt];
    d.extend_from_slice(&seq.to_be_bytes());
    d.extend_from_slice(&ts.to_be_bytes());
    d.extend_from_slice(&ssrc.to_be_bytes());
    d.extend_from_slice(payload);
    d
}

/// RFC 2435 payload, Q=50 (derived tables), 64x48.
fn jpeg(offset: u32, scan: &[u8]) -> Vec<u8> {
    let o = offset.to_be_bytes();
    let mut p = vec![0, o[1], o[2], o[3], 1, 50, 8, 6];
    p.extend_from_slice(scan);
    p
}

#[test]
fn frames_from_two_interleaved_streams() {
    let receiver = UdpReceiver::bind("127.0.0.1:0").unwrap();
    let addr = receiver.local_addr().unwrap();
    let registry = StreamRegistry::new();
    let running = Arc::new(AtomicBool::new(true));
    let (tx, rx) = mpsc::channel();

    let loop_registry = registry.clone();
    let loop_running = running.clone();
    let handle = thread::spawn(move || {
        receive_loop(receiver, loop_registry, Some(26), loop_running, |ssrc, frame| {
            let _ = tx.send((ssrc, frame));
        });
    });

    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    let datagrams = [
        rtp(false, 26, 1, 3000, 0xA, &jpeg(0, &[0xA1; 500])),
        rtp(false, 26, 7, 9000, 0xB, &jpeg(0, &[0xB1; 200])),
        rtp(true, 26, 2, 3000, 0xA, &jpeg(500, &[0xA2; 300])),
        rtp(true, 96, 3, 6000, 0xA, &jpeg(0, &[0; 10])), // foreign payload type
        vec![0xFF; 4],                                   // not RTP
        rtp(true, 26, 8, 9000, 0xB, &jpeg(200, &[0xB2; 100])),
    ];
    for d in &datagrams {
        sender.send_to(d, addr).unwrap();
        // Keep loopback delivery in order without overrunning the socket.
        thread::sleep(Duration::from_millis(5));
    }

    let (ssrc_a, frame_a) = rx.recv_timeout(Duration::from_secs(5)).expect("frame A");
    let (ssrc_b, frame_b) = rx.recv_timeout(Duration::from_secs(5)).expect("frame B");

    running.store(false, Ordering::SeqCst);
    handle.join().unwrap();

    assert_eq!(ssrc_a, 0xA);
    assert_eq!(frame_a.len(), 623 + 800);
    assert_eq!(frame_a.timestamp, 3000);
    assert_eq!((frame_a.width, frame_a.height), (64, 48));

    assert_eq!(ssrc_b, 0xB);
    assert_eq!(frame_b.len(), 623 + 300);
    assert_eq!(frame_b.timestamp, 9000);

    assert!(rx.try_recv().is_err());
    assert_eq!(registry.ssrcs(), vec![0xA, 0xB]);
    assert_eq!(registry.get(0xA).unwrap().stats().packets, 2);
}
