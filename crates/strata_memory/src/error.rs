//! Error types for page arenas and chunks

use thiserror::Error;

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors raised while reserving or committing column memory
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The platform refused to reserve address space
    #[error("Failed to reserve {size} bytes of address space")]
    ReservationFailed { size: usize },

    /// The platform refused to back a reserved range
    #[error("Failed to commit {size} bytes at offset {offset}")]
    CommitFailed { offset: usize, size: usize },

    /// A column grew past its reservation
    #[error("Reservation exhausted: {requested} bytes requested, {reserved} reserved")]
    ReservationExhausted { requested: usize, reserved: usize },

    /// Element alignment exceeds what the arena can guarantee
    #[error("Alignment {align} exceeds the arena page size {page_size}")]
    UnsupportedAlignment { align: usize, page_size: usize },
}
