//! Quantization tables for the predefined Q values 1–99 (RFC 2435 §4.2,
//! Appendix A).
//!
//! Senders using Q < 128 do not transmit their tables; both ends derive them
//! by scaling the example tables of JPEG Annex K with the IJG quality
//! formula.

use super::template::QUANT_TABLE_LEN;

#[rustfmt::skip]
const ZIGZAG: [usize; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Table K.1, natural order.
#[rustfmt::skip]
const LUMA_QUANTIZER: [u32; 64] = [
    16, 11, 10, 16,  24,  40,  51,  61,
    12, 12, 14, 19,  26,  58,  60,  55,
    14, 13, 16, 24,  40,  57,  69,  56,
    14, 17, 22, 29,  51,  87,  80,  62,
    18, 22, 37, 56,  68, 109, 103,  77,
    24, 35, 55, 64,  81, 104, 113,  92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103,  99,
];

/// Table K.2, natural order.
#[rustfmt::skip]
const CHROMA_QUANTIZER: [u32; 64] = [
    17, 18, 24, 47, 99, 99, 99, 99,
    18, 21, 26, 66, 99, 99, 99, 99,
    24, 26, 56, 99, 99, 99, 99, 99,
    47, 66, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// Luma then chroma table in zig-zag order, or `None` when `q` is not one
/// of the defined values 1–99.
pub fn derived_tables(q: u8) -> Option<[u8; 2 * QUANT_TABLE_LEN]> {
    if !(1..=99).contains(&q) {
        return None;
    }
    let q = u32::from(q);
    let scale = if q < 50 { 5000 / q } else { 200 - q * 2 };

    let mut tables = [0u8; 2 * QUANT_TABLE_LEN];
    for (i, &natural) in ZIGZAG.iter().enumerate() {
        let luma = (LUMA_QUANTIZER[natural] * scale + 50) / 100;
        let chroma = (CHROMA_QUANTIZER[natural] * scale + 50) / 100;
        tables[i] = luma.clamp(1, 255) as u8;
        tables[i + QUANT_TABLE_LEN] = chroma.clamp(1, 255) as u8;
    }
    Some(tables)
}
