//! Field keys: field-number bounds and the six wire types.

// Discriminant casts only.
#![allow(clippy::as_conversions)]

use crate::error::DecodeError;

pub const MINIMUM_FIELD_NUMBER: u32 = 1;
/// Largest field number, `2^29 - 1`; the key keeps three bits for the wire type.
pub const MAXIMUM_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Framing of the value that follows a key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum WireType {
    /// `int32`, `int64`, `uint32`, `uint64`, `sint32`, `sint64`, `bool`, `enum`.
    Varint = 0,
    /// `fixed64`, `sfixed64`, `double`.
    I64 = 1,
    /// Length prefix then payload: `string`, `bytes`, messages, packed blocks.
    Len = 2,
    SGroup = 3,
    EGroup = 4,
    /// `fixed32`, `sfixed32`, `float`.
    I32 = 5,
}

static_assertions::assert_eq_size!(WireType, Option<WireType>);
static_assertions::const_assert!(MAXIMUM_FIELD_NUMBER << 3 >> 3 == MAXIMUM_FIELD_NUMBER);

impl WireType {
    /// Wire type for the low three bits of a key; 6 and 7 are rejected.
    #[inline(always)]
    pub fn try_from_val(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::SGroup),
            4 => Ok(WireType::EGroup),
            5 => Ok(WireType::I32),
            _ => Err(DecodeError::invalid_wire_type(value)),
        }
    }

    #[inline(always)]
    pub const fn into_val(self) -> u8 {
        self as u8
    }

    /// Returns the encoded key for `field_number` with this wire type.
    #[inline]
    pub const fn key(self, field_number: u32) -> u32 {
        (field_number << 3) | self as u32
    }
}

impl TryFrom<u8> for WireType {
    type Error = DecodeError;

    #[inline(always)]
    fn try_from(value: u8) -> Result<Self, DecodeError> {
        WireType::try_from_val(value)
    }
}

impl core::fmt::Display for WireType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            WireType::Varint => "varint",
            WireType::I64 => "fixed64",
            WireType::Len => "length-delimited",
            WireType::SGroup => "start-group",
            WireType::EGroup => "end-group",
            WireType::I32 => "fixed32",
        };
        f.write_str(name)
    }
}
