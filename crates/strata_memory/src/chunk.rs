//! Chunk - one component column of one archetype
//!
//! The column reserves its whole address range at construction and commits
//! fixed-size increments as elements are appended. Elements never move on
//! growth; they only move when a swap-remove fills a hole from the end.

use std::mem;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use crate::page_arena::{PageArena, Reservation};
use crate::{align_up, MemoryError, Result};

/// Type-erased description of a column element
#[derive(Clone, Copy, Debug)]
pub struct ElementLayout {
    /// Size in bytes
    pub size: usize,
    /// Alignment in bytes
    pub align: usize,
    /// Drop glue, if the type needs dropping
    pub drop_fn: Option<unsafe fn(*mut u8)>,
}

unsafe fn drop_erased<T>(ptr: *mut u8) {
    ptr::drop_in_place(ptr as *mut T);
}

impl ElementLayout {
    /// Layout of a Rust type
    pub fn of<T>() -> Self {
        Self {
            size: mem::size_of::<T>(),
            align: mem::align_of::<T>(),
            drop_fn: if mem::needs_drop::<T>() {
                Some(drop_erased::<T>)
            } else {
                None
            },
        }
    }

    /// Distance between consecutive elements
    #[inline]
    pub fn stride(&self) -> usize {
        align_up(self.size, self.align)
    }
}

/// A growable column of same-typed elements with stable addresses.
///
/// Invariant: `len() * stride() <= committed_bytes() <= reserved_bytes()`.
pub struct Chunk {
    layout: ElementLayout,
    stride: usize,
    /// Start of element storage. Dangling (but aligned) for zero-sized elements.
    base: NonNull<u8>,
    /// `None` for zero-sized elements
    reservation: Option<Reservation>,
    arena: Arc<dyn PageArena>,
    commit_increment: usize,
    /// Maximum number of elements
    capacity: usize,
    /// Number of occupied slots
    end_index: usize,
}

// Safety: the chunk exclusively owns its reservation; element types are Send + Sync
unsafe impl Send for Chunk {}
unsafe impl Sync for Chunk {}

impl Chunk {
    /// Reserve a column able to hold `capacity` elements.
    ///
    /// Nothing is committed until the first append.
    pub fn new(
        layout: ElementLayout,
        capacity: usize,
        arena: Arc<dyn PageArena>,
        commit_increment: usize,
    ) -> Result<Self> {
        let page_size = arena.page_size();
        if layout.align > page_size {
            return Err(MemoryError::UnsupportedAlignment {
                align: layout.align,
                page_size,
            });
        }

        let stride = layout.stride();
        let commit_increment = align_up(commit_increment.max(page_size), page_size);

        let (base, reservation) = if stride == 0 {
            // Safety: alignment is a non-zero power of two
            let dangling = unsafe { NonNull::new_unchecked(layout.align as *mut u8) };
            (dangling, None)
        } else {
            let bytes = capacity
                .checked_mul(stride)
                .ok_or(MemoryError::ReservationFailed { size: usize::MAX })?;
            let reservation = arena.reserve(bytes)?;
            (reservation.base(), Some(reservation))
        };

        Ok(Self {
            layout,
            stride,
            base,
            reservation,
            arena,
            commit_increment,
            capacity,
            end_index: 0,
        })
    }

    /// Element layout
    #[inline]
    pub fn layout(&self) -> &ElementLayout {
        &self.layout
    }

    /// Distance between consecutive elements in bytes
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of occupied slots
    #[inline]
    pub fn len(&self) -> usize {
        self.end_index
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end_index == 0
    }

    /// Maximum number of elements
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes backed by memory
    #[inline]
    pub fn committed_bytes(&self) -> usize {
        self.reservation.as_ref().map_or(0, Reservation::committed)
    }

    /// Bytes of reserved address space
    #[inline]
    pub fn reserved_bytes(&self) -> usize {
        self.reservation.as_ref().map_or(0, Reservation::size)
    }

    /// Make sure the next slot is backed by memory, committing one more
    /// increment if needed. Does not change `len()`.
    pub fn prepare_append(&mut self) -> Result<()> {
        if self.end_index >= self.capacity {
            return Err(MemoryError::ReservationExhausted {
                requested: (self.end_index + 1).saturating_mul(self.stride),
                reserved: self.reserved_bytes(),
            });
        }

        let Some(reservation) = self.reservation.as_mut() else {
            return Ok(());
        };

        let needed = (self.end_index + 1) * self.stride;
        if needed > reservation.committed() {
            let offset = reservation.committed();
            let target = align_up(needed, self.commit_increment).min(reservation.size());
            self.arena.commit(reservation, offset, target - offset)?;
            log::trace!(
                "Column of stride {} committed {} bytes",
                self.stride,
                reservation.committed()
            );
        }

        Ok(())
    }

    /// Claim the next slot and return its index.
    ///
    /// # Safety
    /// [`prepare_append`](Self::prepare_append) must have succeeded since the
    /// last append, and the slot must be initialized before it is read,
    /// removed or dropped.
    #[inline]
    pub unsafe fn append_slot(&mut self) -> usize {
        debug_assert!(self.end_index < self.capacity);
        debug_assert!((self.end_index + 1) * self.stride <= self.committed_bytes());
        let index = self.end_index;
        self.end_index += 1;
        index
    }

    /// Append a typed value
    pub fn push<T>(&mut self, value: T) -> Result<usize> {
        debug_assert_eq!(mem::size_of::<T>(), self.layout.size, "element type mismatch");
        self.prepare_append()?;
        unsafe {
            let index = self.append_slot();
            self.write(index, value);
            Ok(index)
        }
    }

    /// Raw pointer to the slot at `index`
    #[inline]
    pub fn ptr_at(&self, index: usize) -> *mut u8 {
        self.base.as_ptr().wrapping_add(index * self.stride)
    }

    /// Write a value into a slot without dropping the previous contents
    ///
    /// # Safety
    /// `index` must be a claimed slot and `T` must match the element type
    #[inline]
    pub unsafe fn write<T>(&mut self, index: usize, value: T) {
        debug_assert!(index < self.end_index);
        ptr::write(self.ptr_at(index) as *mut T, value);
    }

    /// Get an element
    ///
    /// # Safety
    /// `index` must be in bounds and `T` must match the element type
    #[inline]
    pub unsafe fn get<T>(&self, index: usize) -> &T {
        debug_assert!(index < self.end_index);
        &*(self.ptr_at(index) as *const T)
    }

    /// Get an element mutably
    ///
    /// # Safety
    /// `index` must be in bounds and `T` must match the element type
    #[inline]
    pub unsafe fn get_mut<T>(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.end_index);
        &mut *(self.ptr_at(index) as *mut T)
    }

    /// Pointer to an element, or `None` when out of bounds
    #[inline]
    pub fn get_raw(&self, index: usize) -> Option<NonNull<u8>> {
        if index >= self.end_index {
            return None;
        }
        NonNull::new(self.ptr_at(index))
    }

    /// All occupied slots as a slice
    ///
    /// # Safety
    /// `T` must match the element type
    #[inline]
    pub unsafe fn as_slice<T>(&self) -> &[T] {
        debug_assert_eq!(mem::size_of::<T>(), self.layout.size, "element type mismatch");
        std::slice::from_raw_parts(self.base.as_ptr() as *const T, self.end_index)
    }

    /// Swap-remove: drop the element at `index`, move the last element into
    /// its place and shrink by one. Returns `true` if an element was moved.
    pub fn remove_slot(&mut self, index: usize) -> bool {
        assert!(index < self.end_index, "slot {} out of bounds", index);

        if let Some(drop_fn) = self.layout.drop_fn {
            // Safety: slot is in bounds and initialized
            unsafe { drop_fn(self.ptr_at(index)) };
        }

        self.fill_hole(index)
    }

    /// Swap-remove without dropping, for elements whose ownership moved elsewhere
    pub fn forget_slot(&mut self, index: usize) -> bool {
        assert!(index < self.end_index, "slot {} out of bounds", index);
        self.fill_hole(index)
    }

    fn fill_hole(&mut self, index: usize) -> bool {
        let last = self.end_index - 1;
        if index != last {
            // Safety: both slots are in bounds and distinct
            unsafe {
                ptr::copy_nonoverlapping(self.ptr_at(last), self.ptr_at(index), self.layout.size);
            }
        }
        self.end_index -= 1;
        index != last
    }

    /// Move the element at `index` into a new slot of `target`, then
    /// swap-remove it here. Returns the slot index in `target`.
    ///
    /// # Safety
    /// `target` must hold the same element type and its
    /// [`prepare_append`](Self::prepare_append) must have succeeded.
    pub unsafe fn move_slot_into(&mut self, index: usize, target: &mut Chunk) -> usize {
        debug_assert_eq!(self.layout.size, target.layout.size);
        debug_assert_eq!(self.layout.align, target.layout.align);

        let target_index = target.append_slot();
        ptr::copy_nonoverlapping(self.ptr_at(index), target.ptr_at(target_index), self.layout.size);
        self.forget_slot(index);
        target_index
    }

    /// Drop every element, keeping the committed memory
    pub fn clear(&mut self) {
        if let Some(drop_fn) = self.layout.drop_fn {
            for index in 0..self.end_index {
                unsafe { drop_fn(self.ptr_at(index)) };
            }
        }
        self.end_index = 0;
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        self.clear();
        if let Some(reservation) = self.reservation.take() {
            self.arena.release(reservation);
        }
    }
}
