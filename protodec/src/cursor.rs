//! A bounds-checked read cursor over an encoded message.
//!
//! [`DecodeCursor`] is the only state a synthesized decoder threads through a
//! decode call. Every read validates that `offset + delta` neither wraps nor
//! passes the end of the buffer before the offset is moved, so the offset is
//! monotonically non-decreasing and never exceeds the buffer length.

// This module uses `as` casts which have been thoroughly reviewed for correctness.
#![allow(clippy::as_conversions)]

use crate::error::{DecodeError, MalformedTagReason};
use crate::util::unlikely;
use crate::varint::{decode_varint, varint_len, zigzag_decode32, zigzag_decode64};
use crate::wire::WireType;

/// Default number of nested messages (or groups) a decode may descend into.
pub const DEFAULT_RECURSION_LIMIT: u32 = 100;

/// Mutable read state for one decode call: the input buffer, the current
/// offset into it, and how many more levels of nesting may be entered.
#[derive(Debug, Clone)]
pub struct DecodeCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    depth_budget: u32,
}

impl<'a> DecodeCursor<'a> {
    /// Creates a cursor positioned at the start of `buf`.
    #[inline]
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_recursion_limit(buf, DEFAULT_RECURSION_LIMIT)
    }

    /// Creates a cursor that allows at most `limit` levels of nesting.
    #[inline]
    pub fn with_recursion_limit(buf: &'a [u8], limit: u32) -> Self {
        DecodeCursor {
            buf,
            pos: 0,
            depth_budget: limit,
        }
    }

    /// Current read offset.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the buffer this cursor reads from.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline(always)]
    pub fn has_remaining(&self) -> bool {
        self.pos < self.buf.len()
    }

    /// The unread tail of the buffer.
    #[inline(always)]
    pub fn remaining_slice(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Returns the bytes consumed since `start`, a value previously returned
    /// by [`DecodeCursor::position`].
    #[inline]
    pub fn raw_since(&self, start: usize) -> &'a [u8] {
        self.buf.get(start..self.pos).unwrap_or_default()
    }

    /// Moves the offset forward by `delta`, returning the old offset.
    #[inline(always)]
    fn advance(&mut self, delta: usize) -> Result<usize, DecodeError> {
        let Some(end) = self.pos.checked_add(delta) else {
            return Err(DecodeError::invalid_length());
        };
        if unlikely(end > self.buf.len()) {
            return Err(DecodeError::truncated());
        }
        let start = self.pos;
        self.pos = end;
        Ok(start)
    }

    #[inline(always)]
    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let start = self.advance(len)?;
        Ok(&self.buf[start..self.pos])
    }

    #[inline(always)]
    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    #[inline(always)]
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let (value, len) = decode_varint(self.remaining_slice())?;
        self.pos += len;
        Ok(value)
    }

    /// Reads an `int32` (or `enum`). Negative values arrive sign-extended to
    /// ten bytes, keeping the low 32 bits recovers them.
    #[inline]
    pub fn read_int32(&mut self) -> Result<i32, DecodeError> {
        Ok(self.read_varint()? as i32)
    }

    #[inline]
    pub fn read_int64(&mut self) -> Result<i64, DecodeError> {
        Ok(self.read_varint()? as i64)
    }

    #[inline]
    pub fn read_uint32(&mut self) -> Result<u32, DecodeError> {
        Ok(self.read_varint()? as u32)
    }

    #[inline]
    pub fn read_uint64(&mut self) -> Result<u64, DecodeError> {
        self.read_varint()
    }

    #[inline]
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_varint()? != 0)
    }

    #[inline]
    pub fn read_zigzag32(&mut self) -> Result<i32, DecodeError> {
        Ok(zigzag_decode32(self.read_varint()?))
    }

    #[inline]
    pub fn read_zigzag64(&mut self) -> Result<i64, DecodeError> {
        Ok(zigzag_decode64(self.read_varint()?))
    }

    #[inline]
    pub fn read_fixed32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    #[inline]
    pub fn read_fixed64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    #[inline]
    pub fn read_sfixed32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    #[inline]
    pub fn read_sfixed64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    #[inline]
    pub fn read_float(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_bits(self.read_fixed32()?))
    }

    #[inline]
    pub fn read_double(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(self.read_fixed64()?))
    }

    /// Reads the length prefix of a length-delimited value.
    ///
    /// A length that would be negative as a signed offset fails with
    /// [`InvalidLength`](crate::error::DecodeErrorKind::InvalidLength).
    #[inline]
    pub fn read_length(&mut self) -> Result<usize, DecodeError> {
        let len = self.read_varint()?;
        if unlikely(len > isize::MAX as u64) {
            return Err(DecodeError::invalid_length());
        }
        usize::try_from(len).map_err(|_| DecodeError::invalid_length())
    }

    /// Reads a length-delimited span and returns it without copying.
    #[inline]
    pub fn read_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_length()?;
        self.take(len)
    }

    /// Reads a length-delimited span that must be valid UTF-8.
    #[inline]
    pub fn read_string(&mut self, field: &'static str) -> Result<&'a str, DecodeError> {
        let bytes = self.read_bytes()?;
        core::str::from_utf8(bytes).map_err(|_| DecodeError::invalid_utf8(field))
    }

    /// Reads a length-delimited span holding an embedded message and returns
    /// a cursor restricted to it, one nesting level deeper than `self`.
    #[inline]
    pub fn read_nested(&mut self) -> Result<DecodeCursor<'a>, DecodeError> {
        if unlikely(self.depth_budget == 0) {
            return Err(DecodeError::recursion_limit_reached());
        }
        let span = self.read_bytes()?;
        Ok(DecodeCursor {
            buf: span,
            pos: 0,
            depth_budget: self.depth_budget - 1,
        })
    }

    /// Reads the length-delimited block of a packed repeated field.
    #[inline]
    pub fn read_packed(&mut self) -> Result<DecodeCursor<'a>, DecodeError> {
        let span = self.read_bytes()?;
        Ok(DecodeCursor {
            buf: span,
            pos: 0,
            depth_budget: self.depth_budget,
        })
    }

    /// Reads a field key and splits it into field number and wire type.
    ///
    /// Rejects keys that do not fit in 32 bits, field number zero, and an
    /// end-group wire type, which is never valid outside of a group.
    #[inline]
    pub fn read_key(&mut self) -> Result<(u32, WireType), DecodeError> {
        let key = self.read_varint()?;
        let Ok(key) = u32::try_from(key) else {
            return Err(DecodeError::malformed_tag(MalformedTagReason::KeyTooLarge));
        };
        let raw_wire_type = (key & 0b111) as u8;
        if unlikely(raw_wire_type == WireType::EGroup.into_val()) {
            return Err(DecodeError::malformed_tag(
                MalformedTagReason::EndGroupOutsideGroup,
            ));
        }
        let number = key >> 3;
        if unlikely(number == 0) {
            return Err(DecodeError::malformed_tag(
                MalformedTagReason::FieldNumberOutOfRange,
            ));
        }
        let wire_type = WireType::try_from_val(raw_wire_type)?;
        Ok((number, wire_type))
    }

    /// Skips one value of `wire_type` whose key has already been consumed,
    /// returning the number of bytes skipped.
    ///
    /// A start-group skips everything up to and including its balancing
    /// end-group, descending through any groups nested inside it.
    pub fn skip_value(&mut self, wire_type: WireType) -> Result<usize, DecodeError> {
        let start = self.pos;
        match wire_type {
            WireType::Varint => {
                let len = varint_len(self.remaining_slice())?;
                self.advance(len)?;
            }
            WireType::I64 => {
                self.advance(8)?;
            }
            WireType::I32 => {
                self.advance(4)?;
            }
            WireType::Len => {
                let len = self.read_length()?;
                self.advance(len)?;
            }
            WireType::SGroup => self.skip_group()?,
            WireType::EGroup => return Err(DecodeError::unexpected_end_of_group()),
        }
        Ok(self.pos - start)
    }

    fn skip_group(&mut self) -> Result<(), DecodeError> {
        let mut depth: u32 = 1;
        loop {
            let key = self.read_varint()?;
            match WireType::try_from_val((key & 0b111) as u8)? {
                WireType::SGroup => {
                    depth += 1;
                    if unlikely(depth > self.depth_budget) {
                        return Err(DecodeError::recursion_limit_reached());
                    }
                }
                WireType::EGroup => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                other => {
                    self.skip_value(other)?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use proptest::prelude::*;

    use super::*;
    use crate::error::DecodeErrorKind;

    #[test]
    fn test_fixed_width() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0xff];
        let mut cur = DecodeCursor::new(&data);
        assert_eq!(cur.read_fixed32().unwrap(), 0x0403_0201);
        assert_eq!(cur.position(), 4);
        assert_eq!(
            cur.read_fixed64().unwrap_err().kind(),
            DecodeErrorKind::Truncated
        );
        // A failed read leaves the offset untouched.
        assert_eq!(cur.position(), 4);
        assert_eq!(cur.read_sfixed32().unwrap(), 0x0807_0605);
        assert_eq!(cur.remaining(), 1);
    }

    #[test]
    fn test_float_double() {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&(-2.25f64).to_le_bytes());
        let mut cur = DecodeCursor::new(&data);
        assert_eq!(cur.read_float().unwrap(), 1.5);
        assert_eq!(cur.read_double().unwrap(), -2.25);
        assert!(!cur.has_remaining());
    }

    #[test]
    fn test_negative_int32_is_sign_extended() {
        let mut buf = Vec::new();
        prost::encoding::int32::encode(1, &-5, &mut buf);
        let mut cur = DecodeCursor::new(&buf);
        assert_eq!(cur.read_key().unwrap(), (1, WireType::Varint));
        assert_eq!(cur.read_int32().unwrap(), -5);
        assert!(!cur.has_remaining());
    }

    #[test]
    fn test_read_key() {
        let mut cur = DecodeCursor::new(&[0x08, 0x12, 0x7d]);
        assert_eq!(cur.read_key().unwrap(), (1, WireType::Varint));
        assert_eq!(cur.read_key().unwrap(), (2, WireType::Len));
        assert_eq!(cur.read_key().unwrap(), (15, WireType::I32));
    }

    #[test]
    fn test_read_key_rejects_malformed() {
        let field_zero = DecodeCursor::new(&[0x00]).read_key().unwrap_err();
        assert_eq!(
            field_zero.kind(),
            DecodeErrorKind::MalformedTag {
                reason: MalformedTagReason::FieldNumberOutOfRange
            }
        );

        let end_group = DecodeCursor::new(&[0x0c]).read_key().unwrap_err();
        assert_eq!(
            end_group.kind(),
            DecodeErrorKind::MalformedTag {
                reason: MalformedTagReason::EndGroupOutsideGroup
            }
        );

        let wire_type_six = DecodeCursor::new(&[0x0e]).read_key().unwrap_err();
        assert_eq!(
            wire_type_six.kind(),
            DecodeErrorKind::InvalidWireType { value: 6 }
        );

        // 2^35, does not fit in a u32.
        let huge = [0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        let too_large = DecodeCursor::new(&huge).read_key().unwrap_err();
        assert_eq!(
            too_large.kind(),
            DecodeErrorKind::MalformedTag {
                reason: MalformedTagReason::KeyTooLarge
            }
        );
    }

    #[test]
    fn test_read_bytes_bounds() {
        let mut cur = DecodeCursor::new(&[0x03, b'a', b'b', b'c', 0x00]);
        assert_eq!(cur.read_bytes().unwrap(), b"abc");
        assert_eq!(cur.read_bytes().unwrap(), b"");
        assert!(!cur.has_remaining());

        let mut cur = DecodeCursor::new(&[0x03, b'a', b'b']);
        assert_eq!(
            cur.read_bytes().unwrap_err().kind(),
            DecodeErrorKind::Truncated
        );

        // A length that turns negative as a signed offset.
        let huge = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        let mut cur = DecodeCursor::new(&huge);
        assert_eq!(
            cur.read_bytes().unwrap_err().kind(),
            DecodeErrorKind::InvalidLength
        );
    }

    #[test]
    fn test_read_string_utf8() {
        let mut cur = DecodeCursor::new(&[0x02, 0xc3, 0xa9]);
        assert_eq!(cur.read_string("name").unwrap(), "é");

        let mut cur = DecodeCursor::new(&[0x01, 0xff]);
        assert_eq!(
            cur.read_string("name").unwrap_err().kind(),
            DecodeErrorKind::InvalidUtf8 { field: "name" }
        );
    }

    #[test]
    fn test_read_nested_limits_depth() {
        let data = [0x02, 0x00, 0x00];
        let mut cur = DecodeCursor::with_recursion_limit(&data, 1);
        let mut inner = cur.read_nested().unwrap();
        assert_eq!(inner.len(), 2);
        assert_eq!(
            inner.read_nested().unwrap_err().kind(),
            DecodeErrorKind::RecursionLimitReached
        );
    }

    #[test]
    fn test_skip_varint_and_fixed() {
        let data = [0x80, 0x01, 1, 2, 3, 4, 1, 2, 3, 4, 5, 6, 7, 8, 99];
        let mut cur = DecodeCursor::new(&data);
        assert_eq!(cur.skip_value(WireType::Varint).unwrap(), 2);
        assert_eq!(cur.skip_value(WireType::I32).unwrap(), 4);
        assert_eq!(cur.skip_value(WireType::I64).unwrap(), 8);
        assert_eq!(cur.remaining_slice(), &[99]);
        assert_eq!(
            cur.skip_value(WireType::I32).unwrap_err().kind(),
            DecodeErrorKind::Truncated
        );
    }

    #[test]
    fn test_skip_len() {
        let mut cur = DecodeCursor::new(&[3, 1, 2, 3, 99]);
        assert_eq!(cur.skip_value(WireType::Len).unwrap(), 4);
        assert_eq!(cur.remaining_slice(), &[99]);

        let mut cur = DecodeCursor::new(&[5, 1, 2]);
        assert_eq!(
            cur.skip_value(WireType::Len).unwrap_err().kind(),
            DecodeErrorKind::Truncated
        );
    }

    #[test]
    fn test_skip_nested_groups() {
        // Key for field 1 start-group has already been read. Inside:
        //   field 2 varint 150, field 3 start-group { field 4 fixed32 }, end 3, end 1
        let data = [
            0x10, 0x96, 0x01, // field 2, varint 150
            0x1b, // field 3, start group
            0x25, 1, 2, 3, 4, // field 4, fixed32
            0x1c, // field 3, end group
            0x0c, // field 1, end group
            0x08, 0x01, // trailing field 1, varint 1
        ];
        let mut cur = DecodeCursor::new(&data);
        assert_eq!(cur.skip_value(WireType::SGroup).unwrap(), 11);
        assert_eq!(cur.read_key().unwrap(), (1, WireType::Varint));
    }

    #[test]
    fn test_skip_unbalanced_groups() {
        // An end-group seen before any group was opened.
        let mut cur = DecodeCursor::new(&[]);
        assert_eq!(
            cur.skip_value(WireType::EGroup).unwrap_err().kind(),
            DecodeErrorKind::UnexpectedEndOfGroup
        );

        // A group that never closes.
        let mut cur = DecodeCursor::new(&[0x10, 0x01, 0x1b]);
        assert_eq!(
            cur.skip_value(WireType::SGroup).unwrap_err().kind(),
            DecodeErrorKind::Truncated
        );
    }

    #[test]
    fn test_skip_group_depth_is_bounded() {
        let mut data = Vec::new();
        data.resize(16, 0x0b);
        let mut cur = DecodeCursor::with_recursion_limit(&data, 8);
        assert_eq!(
            cur.skip_value(WireType::SGroup).unwrap_err().kind(),
            DecodeErrorKind::RecursionLimitReached
        );
    }

    #[test]
    fn test_raw_since() {
        let data = [0x08, 0x96, 0x01, 0x10];
        let mut cur = DecodeCursor::new(&data);
        let start = cur.position();
        let (_, wire_type) = cur.read_key().unwrap();
        cur.skip_value(wire_type).unwrap();
        assert_eq!(cur.raw_since(start), &[0x08, 0x96, 0x01]);
    }

    proptest! {
        #[test]
        fn proptest_reads_never_pass_end(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut cur = DecodeCursor::new(&data);
            while cur.has_remaining() {
                let before = cur.position();
                let Ok((_, wire_type)) = cur.read_key() else { break };
                if cur.skip_value(wire_type).is_err() {
                    break;
                }
                prop_assert!(cur.position() > before);
                prop_assert!(cur.position() <= data.len());
            }
            prop_assert!(cur.position() <= data.len());
        }
    }
}
