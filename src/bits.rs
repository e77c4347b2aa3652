//! Fixed-offset field extraction.
//!
//! Offsets are dictated by the record layout and always lie inside the block, so these
//! read straight from fixed-size arrays instead of going through a parser.
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Combines two bytes into a big-endian word.
pub const fn word(high: u8, low: u8) -> u16 {
    (high as u16) << 8 | low as u16
}

/// Reads a big-endian word starting at `offset`.
///
/// # Panics
///
/// Panics if `offset + 2` is past the end of `data`.
pub fn word_at<const N: usize>(data: &[u8; N], offset: usize) -> u16 {
    BigEndian::read_u16(&data[offset..offset + 2])
}

/// Reads a little-endian word starting at `offset`. Suica stores balances this way.
///
/// # Panics
///
/// Panics if `offset + 2` is past the end of `data`.
pub fn le_word_at<const N: usize>(data: &[u8; N], offset: usize) -> u16 {
    LittleEndian::read_u16(&data[offset..offset + 2])
}

/// Reads a big-endian 24-bit integer starting at `offset`.
///
/// # Panics
///
/// Panics if `offset + 3` is past the end of `data`.
pub fn u24_at<const N: usize>(data: &[u8; N], offset: usize) -> u32 {
    BigEndian::read_u24(&data[offset..offset + 3])
}
