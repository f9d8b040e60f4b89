//! Skeleton baseline JPEG header shared by every reassembled frame.
//!
//! RFC 2435 strips all marker segments from the scan and only carries the
//! values that change between frames (dimensions, type, quantization tables)
//! in its payload header. Everything else is fixed, so a single header is
//! built once and the variable fields are patched in place at fixed offsets:
//!
//! ```text
//! offset  segment
//!      0  SOI
//!      2  APP0 (JFIF 1.01)
//!     20  DQT  table 0 (luma)        values at  25..89
//!     89  DQT  table 1 (chroma)      values at  94..158
//!    158  SOF0 baseline, 3 comps     height at 163, width at 165
//!    177  DHT  luma DC
//!    210  DHT  luma AC
//!    393  DHT  chroma DC
//!    426  DHT  chroma AC
//!    609  SOS
//!    623  entropy-coded scan data
//! ```
//!
//! The offsets are protocol constants; [`build_template`] asserts each of
//! them at compile time.

/// Offset of the 64 luma quantizer values.
pub const QUANT_TABLE_1_OFFSET: usize = 25;
/// Offset of the 64 chroma quantizer values.
pub const QUANT_TABLE_2_OFFSET: usize = 94;
/// Offset of the big-endian SOF0 height field.
pub const HEIGHT_OFFSET: usize = 163;
/// Offset of the big-endian SOF0 width field.
pub const WIDTH_OFFSET: usize = 165;
/// Offset of the luma component's sampling factors in SOF0.
pub const SAMPLING_OFFSET: usize = 169;
/// Offset of the first byte of scan data; also the template length.
pub const DATA_OFFSET: usize = 623;

/// Size of one 8-bit quantization table.
pub const QUANT_TABLE_LEN: usize = 64;

/// Sampling byte for RFC 2435 type 0: h=2, v=1 (4:2:2).
pub const SAMPLING_422: u8 = 0x21;
/// Sampling byte for RFC 2435 type 1: h=2, v=2 (4:2:0).
pub const SAMPLING_420: u8 = 0x22;

// Huffman tables from RFC 2435 Appendix B (JPEG Annex K.3).

const LUM_DC_CODELENS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
const LUM_DC_SYMBOLS: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
const LUM_AC_CODELENS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];

#[rustfmt::skip]
const LUM_AC_SYMBOLS: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12,
    0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08,
    0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52, 0xd1, 0xf0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16,
    0x17, 0x18, 0x19, 0x1a, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39,
    0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59,
    0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79,
    0x7a, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98,
    0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7,
    0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6,
    0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5,
    0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4,
    0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2,
    0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea,
    0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

const CHM_DC_CODELENS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
const CHM_DC_SYMBOLS: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
const CHM_AC_CODELENS: [u8; 16] = [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];

#[rustfmt::skip]
const CHM_AC_SYMBOLS: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21,
    0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71,
    0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91,
    0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33, 0x52, 0xf0,
    0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34,
    0xe1, 0x25, 0xf1, 0x17, 0x18, 0x19, 0x1a, 0x26,
    0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38,
    0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
    0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58,
    0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68,
    0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78,
    0x79, 0x7a, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96,
    0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5,
    0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4,
    0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3,
    0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2,
    0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda,
    0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9,
    0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

/// The complete header template. Quantization tables and dimensions are
/// zero until the first frame patches them.
pub const TEMPLATE: [u8; DATA_OFFSET] = build_template();

const fn put(buf: &mut [u8; DATA_OFFSET], pos: usize, bytes: &[u8]) -> usize {
    let mut i = 0;
    while i < bytes.len() {
        buf[pos + i] = bytes[i];
        i += 1;
    }
    pos + bytes.len()
}

const fn put_huffman(
    buf: &mut [u8; DATA_OFFSET],
    pos: usize,
    codelens: &[u8; 16],
    symbols: &[u8],
    table_class: u8,
    table_no: u8,
) -> usize {
    let len = (3 + codelens.len() + symbols.len()) as u8;
    let class_and_id = (table_class << 4) | table_no;
    let pos = put(buf, pos, &[0xff, 0xc4, 0x00, len, class_and_id]);
    let pos = put(buf, pos, codelens);
    put(buf, pos, symbols)
}

const fn build_template() -> [u8; DATA_OFFSET] {
    let mut t = [0u8; DATA_OFFSET];

    let mut p = put(&mut t, 0, &[0xff, 0xd8]); // SOI

    #[rustfmt::skip]
    let app0: [u8; 18] = [
        0xff, 0xe0, 0x00, 0x10,
        b'J', b'F', b'I', b'F', 0x00,
        0x01, 0x01, // version 1.01
        0x01,       // density in dots per inch
        0x00, 0x60, // 96 dpi horizontal
        0x00, 0x60, // 96 dpi vertical
        0x00, 0x00, // no thumbnail
    ];
    p = put(&mut t, p, &app0);

    p = put(&mut t, p, &[0xff, 0xdb, 0x00, 0x43, 0x00]); // DQT, 8-bit, table 0
    assert!(p == QUANT_TABLE_1_OFFSET);
    p += QUANT_TABLE_LEN;

    p = put(&mut t, p, &[0xff, 0xdb, 0x00, 0x43, 0x01]); // DQT, 8-bit, table 1
    assert!(p == QUANT_TABLE_2_OFFSET);
    p += QUANT_TABLE_LEN;

    p = put(&mut t, p, &[0xff, 0xc0, 0x00, 0x11, 0x08]); // SOF0, 8-bit precision
    assert!(p == HEIGHT_OFFSET);
    p += 2;
    assert!(p == WIDTH_OFFSET);
    p += 2;

    #[rustfmt::skip]
    let components: [u8; 10] = [
        0x03,
        0x01, SAMPLING_420, 0x00, // Y, quant table 0
        0x02, 0x11, 0x01,         // Cb, quant table 1
        0x03, 0x11, 0x01,         // Cr, quant table 1
    ];
    assert!(p + 2 == SAMPLING_OFFSET);
    p = put(&mut t, p, &components);

    p = put_huffman(&mut t, p, &LUM_DC_CODELENS, &LUM_DC_SYMBOLS, 0, 0);
    p = put_huffman(&mut t, p, &LUM_AC_CODELENS, &LUM_AC_SYMBOLS, 1, 0);
    p = put_huffman(&mut t, p, &CHM_DC_CODELENS, &CHM_DC_SYMBOLS, 0, 1);
    p = put_huffman(&mut t, p, &CHM_AC_CODELENS, &CHM_AC_SYMBOLS, 1, 1);

    #[rustfmt::skip]
    let sos: [u8; 14] = [
        0xff, 0xda, 0x00, 0x0c,
        0x03,
        0x01, 0x00, // Y: DC 0, AC 0
        0x02, 0x11, // Cb: DC 1, AC 1
        0x03, 0x11, // Cr: DC 1, AC 1
        0x00, 0x3f, 0x00, // spectral selection 0..63, no approximation
    ];
    p = put(&mut t, p, &sos);
    assert!(p == DATA_OFFSET);

    t
}

/// Write frame dimensions (in pixels) into the SOF0 segment.
pub fn write_dimensions(header: &mut [u8], width: u16, height: u16) {
    let (h, w) = (HEIGHT_OFFSET, WIDTH_OFFSET);
    header[h..h + 2].copy_from_slice(&height.to_be_bytes());
    header[w..w + 2].copy_from_slice(&width.to_be_bytes());
}

/// Write the luma and chroma tables (64 bytes each, zig-zag order).
pub fn write_quant_tables(header: &mut [u8], tables: &[u8; 2 * QUANT_TABLE_LEN]) {
    let (luma, chroma) = tables.split_at(QUANT_TABLE_LEN);
    let (t1, t2) = (QUANT_TABLE_1_OFFSET, QUANT_TABLE_2_OFFSET);
    header[t1..t1 + QUANT_TABLE_LEN].copy_from_slice(luma);
    header[t2..t2 + QUANT_TABLE_LEN].copy_from_slice(chroma);
}

/// Set the luma sampling factors from the RFC 2435 type field.
///
/// Type 0 (and its restart variant 64) is 4:2:2; every other type uses
/// 4:2:0.
pub fn write_sampling(header: &mut [u8], jpeg_type: u8) {
    header[SAMPLING_OFFSET] = if jpeg_type & 0x3f == 0 {
        SAMPLING_422
    } else {
        SAMPLING_420
    };
}
