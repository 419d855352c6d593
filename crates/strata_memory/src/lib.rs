//! # strata_memory - Column Storage
//!
//! Memory primitives for archetype storage:
//! - PageArena: reserve a large address range, commit pages on demand
//! - Chunk: one component column growing in place, never relocating

pub mod chunk;
pub mod error;
pub mod page_arena;

pub use chunk::{Chunk, ElementLayout};
pub use error::{MemoryError, Result};
pub use page_arena::{default_arena, HeapPageArena, PageArena, Reservation};

#[cfg(windows)]
pub use page_arena::VirtualPageArena;

/// Align a value up to the given alignment
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Check if a pointer is aligned
#[inline]
pub fn is_aligned(ptr: *const u8, align: usize) -> bool {
    (ptr as usize) & (align - 1) == 0
}

pub mod prelude {
    pub use crate::{Chunk, ElementLayout, MemoryError, PageArena, Reservation};
    pub use crate::{align_up, default_arena, is_aligned};
}
