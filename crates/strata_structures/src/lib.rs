//! # strata_structures - Fixed-width data structures
//!
//! Value types shared by the storage engine:
//! - ComponentBitset: the set of component IDs present in an archetype or
//!   required by a query

pub mod bitset;

pub use bitset::{ComponentBitset, BITSET_WORDS, MAX_COMPONENTS};

pub mod prelude {
    pub use crate::bitset::{ComponentBitset, MAX_COMPONENTS};
}
