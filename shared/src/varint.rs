//! VarInt / VarLong codec
//!
//! The protocol encodes integers with 7 payload bits per byte, least
//! significant group first, and uses the high bit of each byte to signal
//! that another byte follows. A 32-bit value takes 1-5 bytes, a 64-bit
//! value 1-10 bytes.
//!
//! Writers peel the one and two byte cases explicitly since they make up
//! nearly all frame lengths and packet ids seen on the wire. The peeled
//! paths must stay byte-identical to [`write_var_int_generic`], which is
//! the reference encoding.

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Longest encoding of a 32-bit VarInt
pub const MAX_VAR_INT_BYTES: usize = 5;
/// Longest encoding of a 64-bit VarLong
pub const MAX_VAR_LONG_BYTES: usize = 10;
/// Largest value representable in a 3-byte (21-bit) VarInt
pub const MAX_21_BIT_VALUE: usize = (1 << 21) - 1;

const VAR_INT_LENGTHS: [usize; 33] = build_length_table::<33>();
const VAR_LONG_LENGTHS: [usize; 65] = build_length_table::<65>();

/// Maps a leading-zero count to an encoded length.
const fn build_length_table<const N: usize>() -> [usize; N] {
    let mut table = [0usize; N];
    let width = N - 1;
    let mut zeros = 0;
    while zeros < N {
        let bits = width - zeros;
        table[zeros] = if bits == 0 { 1 } else { (bits + 6) / 7 };
        zeros += 1;
    }
    table
}

/// Number of bytes [`write_var_int`] produces for `value`
pub fn var_int_bytes(value: u32) -> usize {
    VAR_INT_LENGTHS[value.leading_zeros() as usize]
}

/// Number of bytes [`write_var_long`] produces for `value`
pub fn var_long_bytes(value: u64) -> usize {
    VAR_LONG_LENGTHS[value.leading_zeros() as usize]
}

/// Reads a VarInt, scanning at most `min(5, remaining)` bytes.
///
/// Fails with `CorruptedFrame` when no terminating byte is found inside
/// that window, which covers both truncated input and over-long encodings.
pub fn read_var_int(buf: &mut impl Buf) -> Result<u32> {
    let max_read = MAX_VAR_INT_BYTES.min(buf.remaining());
    let mut value = 0u32;

    for index in 0..max_read {
        let byte = buf.get_u8();
        value |= u32::from(byte & 0x7F) << (index * 7);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    Err(ProtocolError::corrupted("bad VarInt"))
}

/// Reads a VarLong, scanning at most `min(10, remaining)` bytes.
pub fn read_var_long(buf: &mut impl Buf) -> Result<u64> {
    let max_read = MAX_VAR_LONG_BYTES.min(buf.remaining());
    let mut value = 0u64;

    for index in 0..max_read {
        let byte = buf.get_u8();
        value |= u64::from(byte & 0x7F) << (index * 7);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    Err(ProtocolError::corrupted("bad VarLong"))
}

/// Writes `value` using the minimal number of bytes.
#[inline]
pub fn write_var_int(buf: &mut impl BufMut, value: u32) {
    if value & (u32::MAX << 7) == 0 {
        buf.put_u8(value as u8);
    } else if value & (u32::MAX << 14) == 0 {
        let w = ((value & 0x7F) | 0x80) << 8 | (value >> 7);
        buf.put_u16(w as u16);
    } else {
        write_var_int_full(buf, value);
    }
}

fn write_var_int_full(buf: &mut impl BufMut, value: u32) {
    if value & (u32::MAX << 21) == 0 {
        let w = ((value & 0x7F) | 0x80) << 16 | (((value >> 7) & 0x7F) | 0x80) << 8 | (value >> 14);
        buf.put_uint(u64::from(w), 3);
    } else if value & (u32::MAX << 28) == 0 {
        let w = ((value & 0x7F) | 0x80) << 24
            | (((value >> 7) & 0x7F) | 0x80) << 16
            | (((value >> 14) & 0x7F) | 0x80) << 8
            | (value >> 21);
        buf.put_u32(w);
    } else {
        let w = ((value & 0x7F) | 0x80) << 24
            | (((value >> 7) & 0x7F) | 0x80) << 16
            | (((value >> 14) & 0x7F) | 0x80) << 8
            | (((value >> 21) & 0x7F) | 0x80);
        buf.put_u32(w);
        buf.put_u8((value >> 28) as u8);
    }
}

/// Reference encoder: one byte per loop iteration, no special cases.
pub fn write_var_int_generic(buf: &mut impl BufMut, mut value: u32) {
    loop {
        if value & !0x7F == 0 {
            buf.put_u8(value as u8);
            return;
        }
        buf.put_u8(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
}

/// Writes a 64-bit `value` using the minimal number of bytes.
pub fn write_var_long(buf: &mut impl BufMut, mut value: u64) {
    if value & (u64::MAX << 7) == 0 {
        buf.put_u8(value as u8);
        return;
    }
    if value & (u64::MAX << 14) == 0 {
        let w = ((value & 0x7F) | 0x80) << 8 | (value >> 7);
        buf.put_u16(w as u16);
        return;
    }
    loop {
        if value & !0x7F == 0 {
            buf.put_u8(value as u8);
            return;
        }
        buf.put_u8(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
}

/// Writes `value` as exactly three bytes, padding with continuation bits.
///
/// `value` must not exceed [`MAX_21_BIT_VALUE`].
pub fn write_21bit_var_int(buf: &mut impl BufMut, value: u32) {
    debug_assert!(value as usize <= MAX_21_BIT_VALUE);
    let w = ((value & 0x7F) | 0x80) << 16 | (((value >> 7) & 0x7F) | 0x80) << 8 | (value >> 14);
    buf.put_uint(u64::from(w), 3);
}

/// A reserved 3-byte length prefix inside a buffer.
///
/// Frames whose length is only known after the body was written reserve
/// the prefix first, write the body, then backpatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a reserved length must be backpatched"]
pub struct LengthMark {
    offset: usize,
}

impl LengthMark {
    pub const WIDTH: usize = 3;

    /// Appends a placeholder prefix to `buf`.
    pub fn reserve(buf: &mut BytesMut) -> Self {
        let offset = buf.len();
        write_21bit_var_int(buf, 0);
        Self { offset }
    }

    /// Overwrites the placeholder with the number of bytes written after it.
    ///
    /// Returns that length, or `FrameTooLarge` if it does not fit in 21 bits.
    /// On failure the buffer is left untouched.
    pub fn backpatch(self, buf: &mut BytesMut) -> Result<usize> {
        let body_start = self.offset + Self::WIDTH;
        if buf.len() < body_start {
            return Err(ProtocolError::corrupted("length mark outside buffer"));
        }

        let length = buf.len() - body_start;
        if length > MAX_21_BIT_VALUE {
            return Err(ProtocolError::FrameTooLarge {
                size: length,
                max: MAX_21_BIT_VALUE,
            });
        }

        let mut slot = &mut buf[self.offset..body_start];
        write_21bit_var_int(&mut slot, length as u32);
        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        write_var_int(&mut out, value);
        out
    }

    fn encode_generic(value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        write_var_int_generic(&mut out, value);
        out
    }

    fn sample_values() -> impl Iterator<Item = u32> {
        let boundaries = (0..32).flat_map(|bit| {
            let edge = 1u32 << bit;
            [edge - 1, edge, edge.saturating_add(1)]
        });
        let stride = (0..=u32::MAX).step_by(65_537);
        boundaries.chain(stride).chain([u32::MAX - 1, u32::MAX])
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(1), vec![0x01]);
        assert_eq!(encode(127), vec![0x7F]);
        assert_eq!(encode(128), vec![0x80, 0x01]);
        assert_eq!(encode(255), vec![0xFF, 0x01]);
        assert_eq!(encode(25_565), vec![0xDD, 0xC7, 0x01]);
        assert_eq!(encode(2_097_151), vec![0xFF, 0xFF, 0x7F]);
        assert_eq!(encode(2_147_483_647), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x07]);
        assert_eq!(encode(u32::MAX), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn test_roundtrip_and_length_agree() {
        for value in sample_values() {
            let bytes = encode(value);
            assert_eq!(var_int_bytes(value), bytes.len(), "length of {}", value);

            let mut slice = &bytes[..];
            assert_eq!(read_var_int(&mut slice).unwrap(), value);
            assert!(slice.is_empty());
        }
    }

    #[test]
    fn test_zero_has_length_one() {
        assert_eq!(var_int_bytes(0), 1);
        assert_eq!(var_long_bytes(0), 1);
    }

    #[test]
    fn test_peeled_paths_match_generic_exhaustively() {
        // Every one and two byte value
        for value in 0..(1u32 << 14) {
            assert_eq!(encode(value), encode_generic(value), "value {}", value);
        }
    }

    #[test]
    fn test_full_path_matches_generic() {
        for value in sample_values().filter(|v| *v >= 1 << 14) {
            let mut full = Vec::new();
            write_var_int_full(&mut full, value);
            assert_eq!(full, encode_generic(value), "value {}", value);
        }
    }

    #[test]
    fn test_truncated_input_is_corrupted() {
        let mut buf: &[u8] = &[0x80, 0x80];
        let result = read_var_int(&mut buf);
        assert!(matches!(result, Err(ProtocolError::CorruptedFrame(_))));
        // Scan stopped at the end of the available bytes
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_input_is_corrupted() {
        let mut buf: &[u8] = &[];
        assert!(read_var_int(&mut buf).is_err());
    }

    #[test]
    fn test_overlong_var_int_stops_after_five_bytes() {
        let mut buf: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x42];
        assert!(read_var_int(&mut buf).is_err());
        assert_eq!(buf, &[0x01, 0x42]);
    }

    #[test]
    fn test_var_long_roundtrip() {
        let values = [0u64, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, 1 << 56, u64::MAX];
        for value in values {
            let mut out = Vec::new();
            write_var_long(&mut out, value);
            assert_eq!(out.len(), var_long_bytes(value));

            let mut slice = &out[..];
            assert_eq!(read_var_long(&mut slice).unwrap(), value);
        }
        let mut max = Vec::new();
        write_var_long(&mut max, u64::MAX);
        assert_eq!(max.len(), MAX_VAR_LONG_BYTES);
    }

    #[test]
    fn test_21bit_encoding_is_fixed_width() {
        for value in [0u32, 1, 300, MAX_21_BIT_VALUE as u32] {
            let mut out = Vec::new();
            write_21bit_var_int(&mut out, value);
            assert_eq!(out.len(), 3);

            let mut slice = &out[..];
            assert_eq!(read_var_int(&mut slice).unwrap(), value);
        }
    }

    #[test]
    fn test_length_mark_backpatch() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"xx");
        let mark = LengthMark::reserve(&mut buf);
        buf.extend_from_slice(&[7u8; 300]);

        assert_eq!(mark.backpatch(&mut buf).unwrap(), 300);
        assert_eq!(&buf[..2], b"xx");

        let mut prefix = &buf[2..5];
        assert_eq!(read_var_int(&mut prefix).unwrap(), 300);
        assert_eq!(buf.len(), 2 + 3 + 300);
    }

    #[test]
    fn test_length_mark_rejects_oversized_body() {
        let mut buf = BytesMut::new();
        let mark = LengthMark::reserve(&mut buf);
        buf.resize(LengthMark::WIDTH + MAX_21_BIT_VALUE + 1, 0);

        let result = mark.backpatch(&mut buf);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }
}
