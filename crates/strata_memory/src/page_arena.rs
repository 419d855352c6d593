//! Page arenas - reserve address space up front, commit it page by page
//!
//! A column asks for one reservation large enough for its whole lifetime and
//! commits a prefix of it as it grows. Committed memory never moves, so
//! element addresses stay stable across growth.

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{align_up, MemoryError, Result};

/// A reserved address range handed out by a [`PageArena`]
#[derive(Debug)]
pub struct Reservation {
    /// Start of the range (aligned to the arena page size)
    base: NonNull<u8>,
    /// Reserved bytes
    size: usize,
    /// Bytes backed by memory, always a prefix of the range
    committed: usize,
}

// Safety: a reservation is a plain address range; access is mediated by its owner
unsafe impl Send for Reservation {}
unsafe impl Sync for Reservation {}

impl Reservation {
    /// Start of the reserved range
    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Total reserved bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Committed bytes (a prefix of the range)
    #[inline]
    pub fn committed(&self) -> usize {
        self.committed
    }
}

/// Source of reserve-then-commit memory
pub trait PageArena: Send + Sync {
    /// Commit granularity in bytes. Reservations are aligned to it.
    fn page_size(&self) -> usize;

    /// Reserve `size` bytes of address space without backing it
    fn reserve(&self, size: usize) -> Result<Reservation>;

    /// Back `[offset, offset + size)` of a reservation with memory.
    ///
    /// Must not move data that is already committed.
    fn commit(&self, reservation: &mut Reservation, offset: usize, size: usize) -> Result<()>;

    /// Give the whole range back
    fn release(&self, reservation: Reservation);

    /// Total bytes currently reserved through this arena
    fn reserved_bytes(&self) -> usize;

    /// Total bytes currently committed through this arena
    fn committed_bytes(&self) -> usize;
}

/// Arena suitable for this platform
pub fn default_arena() -> Arc<dyn PageArena> {
    #[cfg(windows)]
    {
        Arc::new(VirtualPageArena::new())
    }
    #[cfg(not(windows))]
    {
        Arc::new(HeapPageArena::new())
    }
}

fn check_commit_range(reservation: &Reservation, offset: usize, size: usize) -> Result<usize> {
    let end = offset
        .checked_add(size)
        .ok_or(MemoryError::CommitFailed { offset, size })?;
    if end > reservation.size {
        return Err(MemoryError::ReservationExhausted {
            requested: end,
            reserved: reservation.size,
        });
    }
    Ok(end)
}

/// Portable arena backed by the global allocator.
///
/// Each reservation is one page-aligned allocation. Large allocations are
/// served by the operating system lazily, so untouched pages cost address
/// space only; `commit` validates the range and keeps the accounting.
pub struct HeapPageArena {
    page_size: usize,
    reserved: AtomicUsize,
    committed: AtomicUsize,
}

impl HeapPageArena {
    /// Page size used by [`new`](Self::new)
    pub const DEFAULT_PAGE_SIZE: usize = 4096;

    /// Create an arena with 4 KiB pages
    pub fn new() -> Self {
        Self::with_page_size(Self::DEFAULT_PAGE_SIZE)
    }

    /// Create an arena with a custom page size (power of two)
    pub fn with_page_size(page_size: usize) -> Self {
        assert!(page_size.is_power_of_two(), "page size must be a power of two");
        Self {
            page_size,
            reserved: AtomicUsize::new(0),
            committed: AtomicUsize::new(0),
        }
    }

    fn layout(&self, size: usize) -> Result<Layout> {
        Layout::from_size_align(size, self.page_size)
            .map_err(|_| MemoryError::ReservationFailed { size })
    }
}

impl Default for HeapPageArena {
    fn default() -> Self {
        Self::new()
    }
}

impl PageArena for HeapPageArena {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn reserve(&self, size: usize) -> Result<Reservation> {
        if size == 0 {
            return Err(MemoryError::ReservationFailed { size });
        }
        let size = align_up(size, self.page_size);
        let layout = self.layout(size)?;

        // Safety: layout has a non-zero size
        let ptr = unsafe { alloc::alloc(layout) };
        let base = NonNull::new(ptr).ok_or(MemoryError::ReservationFailed { size })?;

        self.reserved.fetch_add(size, Ordering::Relaxed);
        log::trace!("Reserved {} bytes at {:p}", size, base);

        Ok(Reservation {
            base,
            size,
            committed: 0,
        })
    }

    fn commit(&self, reservation: &mut Reservation, offset: usize, size: usize) -> Result<()> {
        let end = check_commit_range(reservation, offset, size)?;
        if end > reservation.committed {
            self.committed
                .fetch_add(end - reservation.committed, Ordering::Relaxed);
            reservation.committed = end;
        }
        Ok(())
    }

    fn release(&self, reservation: Reservation) {
        self.reserved.fetch_sub(reservation.size, Ordering::Relaxed);
        self.committed
            .fetch_sub(reservation.committed, Ordering::Relaxed);

        // Layout was valid when the reservation was made
        if let Ok(layout) = self.layout(reservation.size) {
            // Safety: base was allocated by `reserve` with this exact layout
            unsafe { alloc::dealloc(reservation.base.as_ptr(), layout) };
        }
    }

    fn reserved_bytes(&self) -> usize {
        self.reserved.load(Ordering::Relaxed)
    }

    fn committed_bytes(&self) -> usize {
        self.committed.load(Ordering::Relaxed)
    }
}

#[cfg(windows)]
pub use self::virtual_memory::VirtualPageArena;

#[cfg(windows)]
mod virtual_memory {
    use super::*;
    use winapi::ctypes::c_void;
    use winapi::um::memoryapi::{VirtualAlloc, VirtualFree};
    use winapi::um::winnt::{MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_NOACCESS, PAGE_READWRITE};

    /// Arena over `VirtualAlloc` reserve/commit
    pub struct VirtualPageArena {
        reserved: AtomicUsize,
        committed: AtomicUsize,
    }

    impl VirtualPageArena {
        const PAGE_SIZE: usize = 4096;

        /// Create a new virtual memory arena
        pub fn new() -> Self {
            Self {
                reserved: AtomicUsize::new(0),
                committed: AtomicUsize::new(0),
            }
        }
    }

    impl Default for VirtualPageArena {
        fn default() -> Self {
            Self::new()
        }
    }

    impl PageArena for VirtualPageArena {
        fn page_size(&self) -> usize {
            Self::PAGE_SIZE
        }

        fn reserve(&self, size: usize) -> Result<Reservation> {
            if size == 0 {
                return Err(MemoryError::ReservationFailed { size });
            }
            let size = align_up(size, Self::PAGE_SIZE);
            let ptr = unsafe {
                VirtualAlloc(core::ptr::null_mut(), size, MEM_RESERVE, PAGE_NOACCESS)
            };
            let base = NonNull::new(ptr as *mut u8).ok_or(MemoryError::ReservationFailed { size })?;

            self.reserved.fetch_add(size, Ordering::Relaxed);
            Ok(Reservation {
                base,
                size,
                committed: 0,
            })
        }

        fn commit(&self, reservation: &mut Reservation, offset: usize, size: usize) -> Result<()> {
            let end = check_commit_range(reservation, offset, size)?;
            if end <= reservation.committed {
                return Ok(());
            }

            let start = reservation.committed;
            let ptr = unsafe {
                VirtualAlloc(
                    reservation.base.as_ptr().add(start) as *mut c_void,
                    end - start,
                    MEM_COMMIT,
                    PAGE_READWRITE,
                )
            };
            if ptr.is_null() {
                return Err(MemoryError::CommitFailed { offset, size });
            }

            self.committed.fetch_add(end - start, Ordering::Relaxed);
            reservation.committed = end;
            Ok(())
        }

        fn release(&self, reservation: Reservation) {
            self.reserved.fetch_sub(reservation.size, Ordering::Relaxed);
            self.committed
                .fetch_sub(reservation.committed, Ordering::Relaxed);
            let ok = unsafe { VirtualFree(reservation.base.as_ptr() as *mut c_void, 0, MEM_RELEASE) };
            if ok == 0 {
                log::error!("VirtualFree failed for reservation at {:p}", reservation.base);
            }
        }

        fn reserved_bytes(&self) -> usize {
            self.reserved.load(Ordering::Relaxed)
        }

        fn committed_bytes(&self) -> usize {
            self.committed.load(Ordering::Relaxed)
        }
    }
}
