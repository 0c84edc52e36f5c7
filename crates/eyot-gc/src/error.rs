//! Error Module - GC Error Types
//!
//! Defines all error types used by the region allocator and collector.

use thiserror::Error;

/// Main error type for GC operations.
///
/// Most of these are fatal by design: the contracts they guard (pointer
/// ownership, root bookkeeping) are invariants the generated program must
/// uphold, not conditions it can recover from.
#[derive(Debug, Error)]
pub enum GcError {
    #[error("allocation of {size} bytes failed")]
    AllocationFailure { size: usize },

    #[error("root pointer not found in stack root table")]
    RootNotFound,

    #[error("gc list is inconsistent: {0}")]
    Inconsistent(String),

    #[error("page header size is not a multiple of the pointer alignment")]
    BadPageHeaderSize,
}

impl GcError {
    /// Every `GcError` variant here indicates a contract violation by the
    /// caller or an allocator failure; none are recoverable in the sense of
    /// retrying the same operation.
    pub fn is_recoverable(&self) -> bool {
        false
    }
}

pub type Result<T> = std::result::Result<T, GcError>;
