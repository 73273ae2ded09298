//! Message-level decoding entry points.

use alloc::vec::Vec;

use crate::cursor::DecodeCursor;
use crate::error::DecodeError;

/// Trait implemented by every synthesized decoder.
///
/// Decoding follows protobuf merge semantics: decoding into an instance that
/// already holds values overwrites singular fields, appends to repeated
/// fields, and overwrites map entries per key. Decoding the same buffer twice
/// into one instance is therefore not idempotent when the message has repeated
/// fields.
pub trait DecodeMessage: Default {
    /// Fully-qualified protobuf name, reported by
    /// [`DecodeErrorKind::RequiredFieldMissing`](crate::error::DecodeErrorKind::RequiredFieldMissing).
    const NAME: &'static str;

    /// Decodes every remaining byte of `cur` into `self`.
    fn merge_from(&mut self, cur: &mut DecodeCursor<'_>) -> Result<(), DecodeError>;

    /// Decodes `buf` into `self`.
    fn merge(&mut self, buf: &[u8]) -> Result<(), DecodeError> {
        self.merge_from(&mut DecodeCursor::new(buf))
    }

    /// Decodes `buf` into a fresh instance.
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut message = Self::default();
        message.merge(buf)?;
        Ok(message)
    }

    /// Decodes a possibly non-contiguous buffer into a fresh instance.
    fn decode_buf<B: bytes::Buf>(mut buf: B) -> Result<Self, DecodeError> {
        let len = buf.remaining();
        let bytes = buf.copy_to_bytes(len);
        Self::decode(&bytes)
    }
}

/// One extension field occurrence, kept as the raw bytes of its key and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionField {
    pub number: u32,
    pub raw: Vec<u8>,
}

/// Untyped store for fields that fall inside a message's extension ranges.
///
/// Occurrences are kept in wire order and never interpreted; resolving them
/// against extension declarations is left to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    fields: Vec<ExtensionField>,
}

impl Extensions {
    /// Appends the raw encoding (key included) of one extension occurrence.
    pub fn append(&mut self, number: u32, raw: &[u8]) {
        self.fields.push(ExtensionField {
            number,
            raw: raw.to_vec(),
        });
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtensionField> + '_ {
        self.fields.iter()
    }

    /// Concatenated raw bytes of every occurrence of `number`, in wire order.
    pub fn raw_for(&self, number: u32) -> Vec<u8> {
        self.fields
            .iter()
            .filter(|field| field.number == number)
            .flat_map(|field| field.raw.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions_keep_wire_order() {
        let mut extensions = Extensions::default();
        assert!(extensions.is_empty());

        extensions.append(100, &[0xa0, 0x06, 0x01]);
        extensions.append(101, &[0xa8, 0x06, 0x02]);
        extensions.append(100, &[0xa0, 0x06, 0x03]);

        assert_eq!(extensions.len(), 3);
        let numbers: Vec<_> = extensions.iter().map(|f| f.number).collect();
        assert_eq!(numbers, [100, 101, 100]);
        assert_eq!(
            extensions.raw_for(100),
            [0xa0, 0x06, 0x01, 0xa0, 0x06, 0x03]
        );
        assert!(extensions.raw_for(7).is_empty());
    }
}
