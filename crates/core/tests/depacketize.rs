//! Frame reassembly through the public API: the reference scenarios of
//! RFC 2435 reassembly plus randomized fragmentation.

use rand::Rng;
use rtpjpeg::media::jpeg::header::{JpegHeader, QuantHeader};
use rtpjpeg::media::jpeg::template::{self, DATA_OFFSET, TEMPLATE};
use rtpjpeg::{Depacketizer, JpegDepacketizer, RtpPacket, VideoFrame};

/// Payload for a 320x240 type-1 frame using Q=200 with inline tables.
fn payload(offset: u32, tables: [u8; 128], scan: &[u8]) -> Vec<u8> {
    let header = JpegHeader {
        type_specific: 0,
        fragment_offset: offset,
        jpeg_type: 1,
        q: 200,
        width: 320,
        height: 240,
        restart: None,
        quant: (offset == 0).then(|| QuantHeader {
            mbz: 0,
            precision: 0,
            length: 128,
            tables: Some(tables),
        }),
    };
    let mut out = Vec::new();
    header.write(&mut out);
    out.extend_from_slice(scan);
    out
}

/// Split `scan` at the given sizes and push every fragment; returns the
/// frame emitted by the marker packet.
fn push_fragments(
    d: &mut JpegDepacketizer,
    tables: [u8; 128],
    scan: &[u8],
    sizes: &[usize],
    timestamp: u32,
) -> VideoFrame {
    let mut offset = 0;
    let mut result = None;
    for (i, &size) in sizes.iter().enumerate() {
        let last = i == sizes.len() - 1;
        let p = payload(offset as u32, tables, &scan[offset..offset + size]);
        result = d.push(&RtpPacket::new(&p, last, timestamp));
        if !last {
            assert!(result.is_none(), "frame emitted before marker");
        }
        offset += size;
    }
    assert_eq!(offset, scan.len());
    result.expect("frame emitted on marker")
}

#[test]
fn single_packet_reference_frame() {
    let mut d = JpegDepacketizer::new();
    let p = payload(0, [0x10; 128], &[0xAA; 10]);
    assert_eq!(p.len(), 8 + 4 + 128 + 10);

    let frame = d.push(&RtpPacket::new(&p, true, 0)).expect("frame");

    let mut expected = TEMPLATE.to_vec();
    expected[163..167].copy_from_slice(&[0x00, 0xF0, 0x01, 0x40]);
    expected[25..89].fill(0x10);
    expected[94..158].fill(0x10);
    expected.extend_from_slice(&[0xAA; 10]);

    assert_eq!(frame.len(), 633);
    assert_eq!(frame.data, expected);
    assert!(frame.is_key_frame);
}

#[test]
fn two_packet_frame() {
    let mut d = JpegDepacketizer::new();
    let frame = push_fragments(&mut d, [1; 128], &[7; 150], &[100, 50], 90);
    assert_eq!(frame.len(), 773);
    assert!(!d.is_corrupted());
}

#[test]
fn gap_emits_nothing_and_leaves_clean_state() {
    let mut d = JpegDepacketizer::new();
    let first = payload(0, [1; 128], &[0; 100]);
    let gapped = payload(150, [1; 128], &[0; 50]);
    assert!(d.push(&RtpPacket::new(&first, false, 0)).is_none());
    assert!(d.push(&RtpPacket::new(&gapped, true, 0)).is_none());
    assert_eq!(d.expected_offset(), 0);
    assert!(!d.is_corrupted());
}

#[test]
fn random_fragmentation_matches_single_packet() {
    let mut rng = rand::rng();

    for round in 0..20u32 {
        let len = (rng.random::<u32>() % 20_000 + 1) as usize;
        let scan: Vec<u8> = (0..len).map(|_| rng.random::<u8>()).collect();
        let mut tables = [0u8; 128];
        tables.iter_mut().for_each(|b| *b = rng.random::<u8>());

        let mut sizes = Vec::new();
        let mut remaining = len;
        while remaining > 0 {
            let size = ((rng.random::<u32>() % 1400 + 1) as usize).min(remaining);
            sizes.push(size);
            remaining -= size;
        }

        let ts = round * 3000;
        let mut whole = JpegDepacketizer::new();
        let expected = push_fragments(&mut whole, tables, &scan, &[len], ts);
        let mut split = JpegDepacketizer::new();
        let actual = push_fragments(&mut split, tables, &scan, &sizes, ts);

        assert_eq!(actual, expected, "{} fragments", sizes.len());
        assert_eq!(&actual.data[DATA_OFFSET..], &scan[..]);
    }
}

#[test]
fn dropped_fragment_loses_only_its_frame() {
    let mut rng = rand::rng();
    let scan: Vec<u8> = (0..4000).map(|_| rng.random::<u8>()).collect();
    let sizes = [1000, 1000, 1000, 1000];
    let mut d = JpegDepacketizer::new();

    // Frame 1 without its third fragment.
    for (i, offset) in [0usize, 1000, 3000].into_iter().enumerate() {
        let p = payload(offset as u32, [1; 128], &scan[offset..offset + 1000]);
        let out = d.push(&RtpPacket::new(&p, i == 2, 0));
        assert!(out.is_none());
    }

    // Frame 2 intact.
    let frame = push_fragments(&mut d, [1; 128], &scan, &sizes, 3000);
    assert_eq!(frame.len(), DATA_OFFSET + 4000);
    assert_eq!(frame.timestamp, 3000);

    let stats = d.stats();
    assert_eq!(stats.frames, 1);
    assert_eq!(stats.discarded_frames, 1);
    assert_eq!(stats.packets, 7);
}

#[test]
fn frames_are_independent_of_reassembly_buffer() {
    let mut d = JpegDepacketizer::new();
    let first = push_fragments(&mut d, [1; 128], &[0x11; 64], &[64], 0);
    let second = push_fragments(&mut d, [2; 128], &[0x22; 64], &[64], 3000);

    assert!(first.data[DATA_OFFSET..].iter().all(|&b| b == 0x11));
    assert!(second.data[DATA_OFFSET..].iter().all(|&b| b == 0x22));
    assert_eq!(first.data[template::QUANT_TABLE_1_OFFSET], 1);
    assert_eq!(second.data[template::QUANT_TABLE_1_OFFSET], 2);
}
