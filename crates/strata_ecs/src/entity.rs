//! Entity - Unique identifiers for game objects
//!
//! A handle packs three fields into one `u64`:
//!
//! | bits    | field      |
//! |---------|------------|
//! | 0..32   | index      |
//! | 32..63  | generation |
//! | 63      | zombie     |

use std::fmt;

/// Entity identifier with generation for ABA protection
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(u64);

impl Entity {
    const INDEX_MASK: u64 = 0xFFFF_FFFF;
    const GENERATION_SHIFT: u32 = 32;
    /// Largest representable generation
    pub const MAX_GENERATION: u32 = (1 << 31) - 1;
    const ZOMBIE_BIT: u64 = 1 << 63;

    /// Index reserved for the null handle
    pub const NULL_INDEX: u32 = u32::MAX;

    /// Create a new entity
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        let generation = (generation & Self::MAX_GENERATION) as u64;
        Self((generation << Self::GENERATION_SHIFT) | index as u64)
    }

    /// Create an invalid/null entity
    #[inline]
    pub const fn null() -> Self {
        Self::new(Self::NULL_INDEX, 0)
    }

    /// Get the entity index
    #[inline]
    pub const fn index(&self) -> u32 {
        (self.0 & Self::INDEX_MASK) as u32
    }

    /// Get the generation
    #[inline]
    pub const fn generation(&self) -> u32 {
        ((self.0 >> Self::GENERATION_SHIFT) as u32) & Self::MAX_GENERATION
    }

    /// Check the zombie flag
    #[inline]
    pub const fn is_zombie(&self) -> bool {
        self.0 & Self::ZOMBIE_BIT != 0
    }

    /// Same handle with the zombie flag set
    #[inline]
    pub const fn to_zombie(self) -> Self {
        Self(self.0 | Self::ZOMBIE_BIT)
    }

    /// Same handle with the zombie flag cleared
    #[inline]
    pub const fn to_live(self) -> Self {
        Self(self.0 & !Self::ZOMBIE_BIT)
    }

    /// Check if this is a null entity
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.index() == Self::NULL_INDEX
    }

    /// Raw bits
    #[inline]
    pub const fn to_bits(&self) -> u64 {
        self.0
    }

    /// Create from raw bits
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Generation that follows `generation` when an index is reused.
    ///
    /// Wraps from [`MAX_GENERATION`](Self::MAX_GENERATION) back to 1; zero is
    /// never handed out so a zeroed handle is never live.
    #[inline]
    pub const fn next_generation(generation: u32) -> u32 {
        if generation >= Self::MAX_GENERATION {
            1
        } else {
            generation + 1
        }
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else if self.is_zombie() {
            write!(f, "Entity({}v{}, zombie)", self.index(), self.generation())
        } else {
            write!(f, "Entity({}v{})", self.index(), self.generation())
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{}v{}", self.index(), self.generation())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_creation() {
        let e = Entity::new(5, 3);
        assert_eq!(e.index(), 5);
        assert_eq!(e.generation(), 3);
        assert!(!e.is_null());
        assert!(!e.is_zombie());
    }

    #[test]
    fn test_entity_null() {
        let e = Entity::null();
        assert!(e.is_null());
        assert_eq!(Entity::default(), e);
    }

    #[test]
    fn test_zombie_flag_keeps_identity() {
        let e = Entity::new(42, 7);
        let z = e.to_zombie();

        assert!(z.is_zombie());
        assert_eq!(z.index(), 42);
        assert_eq!(z.generation(), 7);
        assert_ne!(z, e);
        assert_eq!(z.to_live(), e);
    }

    #[test]
    fn test_fields_do_not_overlap() {
        let e = Entity::new(u32::MAX - 1, Entity::MAX_GENERATION);
        assert_eq!(e.index(), u32::MAX - 1);
        assert_eq!(e.generation(), Entity::MAX_GENERATION);
        assert!(!e.is_zombie());
        assert_eq!(Entity::from_bits(e.to_bits()), e);
    }

    #[test]
    fn test_generation_wraps_past_zero() {
        assert_eq!(Entity::next_generation(1), 2);
        assert_eq!(Entity::next_generation(Entity::MAX_GENERATION), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(Entity::new(3, 9).to_string(), "3v9");
        assert_eq!(format!("{:?}", Entity::new(3, 9).to_zombie()), "Entity(3v9, zombie)");
    }
}
