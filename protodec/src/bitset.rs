//! Presence tracking for `required` fields.

/// One bit per declared required field, indexed by the field's position in
/// the message's required-field list rather than by its field number.
///
/// Created zeroed at the start of a decode call, set as each required field
/// is decoded, and checked once after the whole message has been read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredFieldBitset<const WORDS: usize> {
    words: [u64; WORDS],
}

impl<const WORDS: usize> RequiredFieldBitset<WORDS> {
    /// Number of words needed to track `count` required fields.
    pub const fn words_for(count: usize) -> usize {
        count.div_ceil(64)
    }

    #[inline(always)]
    pub const fn new() -> Self {
        RequiredFieldBitset { words: [0; WORDS] }
    }

    #[inline(always)]
    pub fn set(&mut self, bit: usize) {
        self.words[bit / 64] |= 1 << (bit % 64);
    }

    #[inline(always)]
    pub fn is_set(&self, bit: usize) -> bool {
        self.words[bit / 64] & (1 << (bit % 64)) != 0
    }

    /// Returns the index of the first of `count` required fields that was
    /// never set, if any.
    pub fn first_missing(&self, count: usize) -> Option<usize> {
        (0..count).find(|bit| !self.is_set(*bit))
    }
}

impl<const WORDS: usize> Default for RequiredFieldBitset<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::RequiredFieldBitset;

    #[test]
    fn test_words_for() {
        assert_eq!(RequiredFieldBitset::<1>::words_for(1), 1);
        assert_eq!(RequiredFieldBitset::<1>::words_for(64), 1);
        assert_eq!(RequiredFieldBitset::<1>::words_for(65), 2);
    }

    #[test]
    fn test_set_and_check() {
        let mut bits = RequiredFieldBitset::<2>::new();
        assert_eq!(bits.first_missing(70), Some(0));

        for bit in 0..70 {
            if bit != 66 {
                bits.set(bit);
            }
        }
        assert_eq!(bits.first_missing(70), Some(66));
        // Only the declared count is consulted.
        assert_eq!(bits.first_missing(66), None);

        bits.set(66);
        // Setting twice is harmless.
        bits.set(66);
        assert!(bits.is_set(66));
        assert_eq!(bits.first_missing(70), None);
    }
}
