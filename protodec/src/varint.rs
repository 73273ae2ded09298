//! LEB128 variable-length integer decoding.
//!
//! Every function here is pure over the input slice and reports how many
//! bytes it consumed, leaving cursor bookkeeping to the caller.

// This module uses `as` casts which have been thoroughly reviewed for correctness.
#![allow(clippy::as_conversions)]

use crate::error::DecodeError;
use crate::util::{likely, unlikely};

/// Maximum number of bytes a varint may span before it overflows 64 bits.
pub const MAX_VARINT_LEN: usize = 10;

const MSB: u8 = 0b1000_0000;
const LOW_BITS: u8 = 0b0111_1111;

/// Decodes a varint from the front of `data`.
///
/// Returns the value and the number of bytes read. Bits past the 64th are
/// discarded, matching the reference protobuf implementations, so a tenth
/// byte is always accepted as long as it terminates the varint.
///
/// Fails with [`Overflow`] if a terminating byte was not found within
/// [`MAX_VARINT_LEN`] bytes and with [`Truncated`] if `data` ran out first.
///
/// [`Overflow`]: crate::error::DecodeErrorKind::Overflow
/// [`Truncated`]: crate::error::DecodeErrorKind::Truncated
#[inline(always)]
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize), DecodeError> {
    // Fast path, most varints on the wire are a single byte.
    match data.first() {
        Some(&b) if likely(b < MSB) => Ok((u64::from(b), 1)),
        _ => decode_varint_slow(data),
    }
}

#[inline(never)]
fn decode_varint_slow(data: &[u8]) -> Result<(u64, usize), DecodeError> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    let mut idx = 0;

    loop {
        // N.B. The overflow check precedes the bounds check so ten
        // continuation bytes at the very end of a buffer report `Overflow`.
        if unlikely(shift >= 64) {
            return Err(DecodeError::overflow());
        }
        let Some(&b) = data.get(idx) else {
            return Err(DecodeError::truncated());
        };
        idx += 1;
        value |= u64::from(b & LOW_BITS) << shift;
        if b < MSB {
            return Ok((value, idx));
        }
        shift += 7;
    }
}

/// Returns the length of the varint at the front of `data` without decoding it.
#[inline]
pub fn varint_len(data: &[u8]) -> Result<usize, DecodeError> {
    for (idx, b) in data.iter().take(MAX_VARINT_LEN).enumerate() {
        if *b < MSB {
            return Ok(idx + 1);
        }
    }
    if data.len() >= MAX_VARINT_LEN {
        Err(DecodeError::overflow())
    } else {
        Err(DecodeError::truncated())
    }
}

/// Un-zigzags the low 32 bits of a decoded varint.
#[inline(always)]
pub const fn zigzag_decode32(value: u64) -> i32 {
    let v = value as u32;
    ((v >> 1) as i32) ^ -((v & 1) as i32)
}

/// Un-zigzags a decoded varint.
#[inline(always)]
pub const fn zigzag_decode64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use proptest::prelude::*;

    use super::*;
    use crate::error::DecodeErrorKind;

    fn encode(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        leb128::write::unsigned(&mut buf, value).expect("writing to a Vec");
        buf
    }

    #[test]
    fn test_single_byte() {
        assert_eq!(decode_varint(&[0x00]).unwrap(), (0, 1));
        assert_eq!(decode_varint(&[0x7f, 0xff]).unwrap(), (127, 1));
    }

    #[test]
    fn test_multi_byte() {
        assert_eq!(decode_varint(&[0x80, 0x01]).unwrap(), (128, 2));
        assert_eq!(decode_varint(&[0xac, 0x02]).unwrap(), (300, 2));
        let max = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert_eq!(decode_varint(&max).unwrap(), (u64::MAX, 10));
    }

    #[test]
    fn test_tenth_byte_high_bits_are_discarded() {
        let data = [0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x7f];
        assert_eq!(decode_varint(&data).unwrap(), (1 << 63, 10));
    }

    #[test]
    fn test_overflow() {
        let data = [0xff; 11];
        assert_eq!(
            decode_varint(&data).unwrap_err().kind(),
            DecodeErrorKind::Overflow
        );
        // Ten continuation bytes with nothing after them still overflows.
        let data = [0xff; 10];
        assert_eq!(
            decode_varint(&data).unwrap_err().kind(),
            DecodeErrorKind::Overflow
        );
        assert_eq!(varint_len(&data).unwrap_err().kind(), DecodeErrorKind::Overflow);
    }

    #[test]
    fn test_truncated() {
        for data in [&[][..], &[0x80][..], &[0xff, 0xff, 0xff][..]] {
            assert_eq!(
                decode_varint(data).unwrap_err().kind(),
                DecodeErrorKind::Truncated
            );
            assert_eq!(varint_len(data).unwrap_err().kind(), DecodeErrorKind::Truncated);
        }
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag_decode32(0), 0);
        assert_eq!(zigzag_decode32(1), -1);
        assert_eq!(zigzag_decode32(2), 1);
        assert_eq!(zigzag_decode32(3), -2);
        assert_eq!(zigzag_decode32(0xffff_fffe), i32::MAX);
        assert_eq!(zigzag_decode32(0xffff_ffff), i32::MIN);
        assert_eq!(zigzag_decode64(u64::MAX - 1), i64::MAX);
        assert_eq!(zigzag_decode64(u64::MAX), i64::MIN);
    }

    proptest! {
        #[test]
        fn proptest_decode_matches_leb128(value: u64, trailing in proptest::collection::vec(any::<u8>(), 0..4)) {
            let mut buf = encode(value);
            let expected_len = buf.len();
            buf.extend_from_slice(&trailing);

            let (decoded, len) = decode_varint(&buf).unwrap();
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(len, expected_len);
            prop_assert_eq!(varint_len(&buf).unwrap(), expected_len);
        }

        #[test]
        fn proptest_zigzag_matches_prost(value: i64) {
            let mut buf = Vec::new();
            prost::encoding::sint64::encode(1, &value, &mut buf);
            // Skip the one byte key.
            let (raw, _) = decode_varint(&buf[1..]).unwrap();
            prop_assert_eq!(zigzag_decode64(raw), value);
        }

        #[test]
        fn proptest_zigzag32_matches_prost(value: i32) {
            let mut buf = Vec::new();
            prost::encoding::sint32::encode(1, &value, &mut buf);
            let (raw, _) = decode_varint(&buf[1..]).unwrap();
            prop_assert_eq!(zigzag_decode32(raw), value);
        }
    }
}
