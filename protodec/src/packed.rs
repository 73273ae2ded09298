//! Element-count hints for packed repeated fields.
//!
//! Decoders use these to pre-size the destination sequence before decoding a
//! packed block. They are capacity hints only: a malformed block may make the
//! count wrong, and the element loop that follows is what actually determines
//! how many values are appended.

/// Counts the varint elements in a packed block: every byte with its high bit
/// clear terminates exactly one varint.
#[inline]
pub fn varint_element_count(span: &[u8]) -> usize {
    span.iter().filter(|b| **b < 0x80).count()
}

/// Counts the elements of a packed block of `width`-byte values.
#[inline]
pub fn fixed_element_count(span: &[u8], width: usize) -> usize {
    span.len() / width
}

/// A well-formed `bool` occupies exactly one byte, so the hint is the length.
#[inline]
pub fn bool_element_count(span: &[u8]) -> usize {
    span.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_count_with_multi_byte_elements() {
        // 1, 300, 2, 16384
        let span = [0x01, 0xac, 0x02, 0x02, 0x80, 0x80, 0x01];
        assert_eq!(varint_element_count(&span), 4);
    }

    #[test]
    fn test_varint_count_ignores_unterminated_tail() {
        // A trailing continuation byte is not counted; the element loop is
        // the one that reports the truncation.
        let span = [0x01, 0x02, 0x80];
        assert_eq!(varint_element_count(&span), 2);
    }

    #[test]
    fn test_fixed_count() {
        assert_eq!(fixed_element_count(&[0; 16], 4), 4);
        assert_eq!(fixed_element_count(&[0; 16], 8), 2);
        // Ragged blocks round down.
        assert_eq!(fixed_element_count(&[0; 10], 4), 2);
        assert_eq!(bool_element_count(&[1, 0, 1]), 3);
    }
}
