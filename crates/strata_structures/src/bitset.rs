//! ComponentBitset - fixed-width set of component IDs

use core::fmt;

/// Number of machine words backing a [`ComponentBitset`]
pub const BITSET_WORDS: usize = 2;

/// Number of distinct component IDs a bitset can hold
pub const MAX_COMPONENTS: usize = BITSET_WORDS * ComponentBitset::BITS_PER_WORD;

/// Fixed-capacity bit vector keyed by component ID.
///
/// Plain value type: copied freely, compared by equality and combined with
/// bitwise OR. Bit `i` set means component ID `i` is a member.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentBitset {
    words: [u64; BITSET_WORDS],
}

impl ComponentBitset {
    /// Bits per word
    const BITS_PER_WORD: usize = 64;

    /// The empty set
    pub const EMPTY: Self = Self { words: [0; BITSET_WORDS] };

    /// Create an empty bitset
    #[inline]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Build a bitset from a list of bit indices
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        let mut set = Self::new();
        for index in indices {
            set.set(index);
        }
        set
    }

    /// Set a bit
    #[inline]
    pub fn set(&mut self, index: usize) {
        assert!(index < MAX_COMPONENTS, "bit {} out of range", index);
        let word = index / Self::BITS_PER_WORD;
        let bit = index % Self::BITS_PER_WORD;
        self.words[word] |= 1u64 << bit;
    }

    /// Builder-style [`set`](Self::set)
    #[inline]
    pub fn with(mut self, index: usize) -> Self {
        self.set(index);
        self
    }

    /// Clear a bit
    #[inline]
    pub fn clear(&mut self, index: usize) {
        assert!(index < MAX_COMPONENTS, "bit {} out of range", index);
        let word = index / Self::BITS_PER_WORD;
        let bit = index % Self::BITS_PER_WORD;
        self.words[word] &= !(1u64 << bit);
    }

    /// Get a bit. Indices past the capacity read as unset.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        if index >= MAX_COMPONENTS {
            return false;
        }
        let word = index / Self::BITS_PER_WORD;
        let bit = index % Self::BITS_PER_WORD;
        (self.words[word] & (1u64 << bit)) != 0
    }

    /// Count set bits
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Check if no bits are set
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Bitwise OR
    #[inline]
    pub fn union(&self, other: &ComponentBitset) -> ComponentBitset {
        let mut words = self.words;
        for (word, other) in words.iter_mut().zip(other.words.iter()) {
            *word |= *other;
        }
        ComponentBitset { words }
    }

    /// Bitwise AND
    #[inline]
    pub fn intersection(&self, other: &ComponentBitset) -> ComponentBitset {
        let mut words = self.words;
        for (word, other) in words.iter_mut().zip(other.words.iter()) {
            *word &= *other;
        }
        ComponentBitset { words }
    }

    /// True if at least one bit is set in both sets
    #[inline]
    pub fn intersects(&self, other: &ComponentBitset) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// True if every bit of `other` is also set in `self`
    #[inline]
    pub fn contains_all(&self, other: &ComponentBitset) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == *b)
    }

    /// Iterate over set bit indices in ascending order
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            (0..Self::BITS_PER_WORD).filter_map(move |bit| {
                if word & (1u64 << bit) != 0 {
                    Some(word_idx * Self::BITS_PER_WORD + bit)
                } else {
                    None
                }
            })
        })
    }

    /// Get the raw words
    #[inline]
    pub fn as_words(&self) -> &[u64; BITSET_WORDS] {
        &self.words
    }
}

impl core::ops::BitOr for ComponentBitset {
    type Output = ComponentBitset;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(&rhs)
    }
}

impl core::ops::BitOrAssign for ComponentBitset {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(&rhs);
    }
}

impl fmt::Debug for ComponentBitset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter_ones()).finish()
    }
}
