// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Error types for rampart-stack.
use rampart_canary::{Canary, CanaryPosition};
use serde::Serialize;
use thiserror::Error;

use crate::flags::ErrorFlags;
use crate::types::StackHandle;

/// Evidence of corruption found by the integrity supervisor.
///
/// The first five variants are validity faults (structural soundness), the
/// last three are damage faults (tamper detection).
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum Fault {
    /// The instance has been zeroed or was never initialized.
    #[error("instance is missing")]
    MissingInstance,

    /// The instance has no data buffer.
    #[error("data buffer is missing")]
    MissingBuffer,

    /// Logical size exceeds capacity.
    #[error("size {size} exceeds capacity {capacity}")]
    SizeExceedsCapacity {
        /// Stored size.
        size: usize,
        /// Stored capacity.
        capacity: usize,
    },

    /// Capacity is out of bounds or disagrees with the buffer.
    #[error("capacity {capacity} inconsistent with a buffer of {slots} slots")]
    CapacityInconsistent {
        /// Stored capacity.
        capacity: usize,
        /// Slots actually held by the buffer.
        slots: usize,
    },

    /// The instance claims a different handle than the one it was resolved under.
    #[error("resolved under {resolved} but instance claims {stored}")]
    HandleMismatch {
        /// Handle used for the lookup.
        resolved: StackHandle,
        /// Handle stored in the instance.
        stored: StackHandle,
    },

    /// A boundary canary does not hold the sentinel.
    #[error("canary violated at {position}")]
    Canary {
        /// Violated position.
        position: CanaryPosition,
        /// Value found, `None` if the position is missing.
        found: Option<Canary>,
    },

    /// Stored structural hash differs from the recomputed one.
    #[error("structural hash mismatch: stored {stored:#018x}, computed {computed:#018x}")]
    StructHash {
        /// Stored hash.
        stored: u64,
        /// Freshly computed hash.
        computed: u64,
    },

    /// Stored content hash differs from the recomputed one.
    #[error("content hash mismatch: stored {stored:#018x}, computed {computed:#018x}")]
    ContentHash {
        /// Stored hash.
        stored: u64,
        /// Freshly computed hash.
        computed: u64,
    },
}

impl Fault {
    /// True for tamper-detection faults (canaries and hashes).
    pub const fn is_damage(&self) -> bool {
        matches!(
            self,
            Fault::Canary { .. } | Fault::StructHash { .. } | Fault::ContentHash { .. }
        )
    }

    /// Register bits describing this fault.
    pub const fn flags(&self) -> ErrorFlags {
        match self {
            Fault::MissingInstance => ErrorFlags::INVALID_STACK_POINTER,
            Fault::MissingBuffer => ErrorFlags::INVALID_DATA_POINTER,
            Fault::SizeExceedsCapacity { .. } | Fault::CapacityInconsistent { .. } => {
                ErrorFlags::INVALID_SIZE
            }
            Fault::HandleMismatch { .. } => ErrorFlags::INVALID_STACK_ID,
            Fault::Canary { position, .. } => {
                if position.is_metadata() {
                    ErrorFlags::from_bits(
                        ErrorFlags::DAMAGED_STACK.bits() | ErrorFlags::INVALID_STRUCT_CANARY.bits(),
                    )
                } else {
                    ErrorFlags::from_bits(
                        ErrorFlags::DAMAGED_STACK.bits() | ErrorFlags::INVALID_DATA_CANARY.bits(),
                    )
                }
            }
            Fault::StructHash { .. } | Fault::ContentHash { .. } => ErrorFlags::from_bits(
                ErrorFlags::DAMAGED_STACK.bits() | ErrorFlags::INVALID_HASH.bits(),
            ),
        }
    }
}

/// Errors returned by stack operations.
///
/// Everything except [`StackError::Corrupted`] is recoverable and leaves the
/// stack exactly as it was before the call.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum StackError {
    /// The handle is out of range or not occupied.
    #[error("invalid stack handle {0}")]
    InvalidHandle(StackHandle),

    /// Push into a stack already at maximum capacity.
    #[error("stack overflow at capacity {capacity}")]
    Overflow {
        /// Capacity at the time of the push.
        capacity: usize,
    },

    /// Pop from an empty stack.
    #[error("stack underflow")]
    Underflow,

    /// Requested capacity below the allowed minimum.
    #[error("requested capacity {requested} below minimum {min}")]
    RequestedTooLittle {
        /// Requested capacity.
        requested: usize,
        /// Smallest acceptable capacity.
        min: usize,
    },

    /// Requested capacity above the allowed maximum.
    #[error("requested capacity {requested} above maximum {max}")]
    RequestedTooMuch {
        /// Requested capacity.
        requested: usize,
        /// Largest acceptable capacity.
        max: usize,
    },

    /// Every registry slot is occupied.
    #[error("stack registry is full")]
    RegistryFull,

    /// The allocator could not satisfy a request.
    #[error("allocation of {bytes} bytes failed")]
    Allocation {
        /// Requested allocation size.
        bytes: usize,
    },

    /// Handle swapping is disabled by configuration.
    #[error("handle swap is forbidden by configuration")]
    SwapForbidden,

    /// A thread panicked while holding a stack or registry lock.
    #[error("lock poisoned")]
    LockPoisoned,

    /// Corruption was detected and the fault policy is `Report`.
    #[error("stack corrupted: {0}")]
    Corrupted(#[from] Fault),
}

impl StackError {
    /// Register bits describing this error.
    pub const fn flags(&self) -> ErrorFlags {
        match self {
            StackError::InvalidHandle(_) => ErrorFlags::INVALID_STACK_ID,
            StackError::Overflow { .. } => ErrorFlags::OVERFLOW,
            StackError::Underflow => ErrorFlags::UNDERFLOW,
            StackError::RequestedTooLittle { .. } => ErrorFlags::REQUESTED_TOO_LITTLE,
            StackError::RequestedTooMuch { .. } => ErrorFlags::REQUESTED_TOO_MUCH,
            StackError::RegistryFull => ErrorFlags::REGISTRY_FULL,
            StackError::Allocation { .. } => ErrorFlags::ALLOCATION_FAILED,
            StackError::SwapForbidden => ErrorFlags::INVALID_STACK_ID,
            StackError::LockPoisoned => ErrorFlags::INVALID_STACK_POINTER,
            StackError::Corrupted(fault) => fault.flags(),
        }
    }

    /// True if this error reports corruption.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, StackError::Corrupted(_))
    }
}
