// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Accumulated error register.
//!
//! Every failure ORs one bit into the register of the [`crate::Stacks`] that
//! observed it. The register is never cleared implicitly, so a caller can run
//! a batch of operations and decode everything that went wrong afterwards.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};
use core::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// A set of error bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ErrorFlags(u64);

impl ErrorFlags {
    /// No error.
    pub const NONE: ErrorFlags = ErrorFlags(0);
    /// Pop from an empty stack.
    pub const UNDERFLOW: ErrorFlags = ErrorFlags(1);
    /// Push into a stack at maximum capacity.
    pub const OVERFLOW: ErrorFlags = ErrorFlags(1 << 1);
    /// Instance missing behind a handle.
    pub const INVALID_STACK_POINTER: ErrorFlags = ErrorFlags(1 << 2);
    /// Data buffer missing.
    pub const INVALID_DATA_POINTER: ErrorFlags = ErrorFlags(1 << 3);
    /// Size or capacity inconsistent.
    pub const INVALID_SIZE: ErrorFlags = ErrorFlags(1 << 4);
    /// Resize request below the minimum.
    pub const REQUESTED_TOO_LITTLE: ErrorFlags = ErrorFlags(1 << 5);
    /// Capacity request above the maximum.
    pub const REQUESTED_TOO_MUCH: ErrorFlags = ErrorFlags(1 << 6);
    /// A diagnostic sink failed to record or flush.
    pub const INVALID_SINK: ErrorFlags = ErrorFlags(1 << 7);
    /// Any damage (canary or hash) was detected.
    pub const DAMAGED_STACK: ErrorFlags = ErrorFlags(1 << 8);
    /// Structural or content hash mismatch.
    pub const INVALID_HASH: ErrorFlags = ErrorFlags(1 << 9);
    /// Data-block canary violated.
    pub const INVALID_DATA_CANARY: ErrorFlags = ErrorFlags(1 << 10);
    /// Metadata-block canary violated.
    pub const INVALID_STRUCT_CANARY: ErrorFlags = ErrorFlags(1 << 11);
    /// Unknown, released or mismatched handle.
    pub const INVALID_STACK_ID: ErrorFlags = ErrorFlags(1 << 12);
    /// An allocation request failed.
    pub const ALLOCATION_FAILED: ErrorFlags = ErrorFlags(1 << 13);
    /// Every registry slot is occupied.
    pub const REGISTRY_FULL: ErrorFlags = ErrorFlags(1 << 14);

    const NAMED: [(ErrorFlags, &'static str); 15] = [
        (Self::UNDERFLOW, "stack underflow"),
        (Self::OVERFLOW, "stack overflow"),
        (Self::INVALID_STACK_POINTER, "invalid stack pointer"),
        (Self::INVALID_DATA_POINTER, "invalid data pointer"),
        (Self::INVALID_SIZE, "invalid size"),
        (Self::REQUESTED_TOO_LITTLE, "requested too little"),
        (Self::REQUESTED_TOO_MUCH, "requested too much"),
        (Self::INVALID_SINK, "invalid diagnostic sink"),
        (Self::DAMAGED_STACK, "damaged stack"),
        (Self::INVALID_HASH, "invalid hash"),
        (Self::INVALID_DATA_CANARY, "invalid data canary"),
        (Self::INVALID_STRUCT_CANARY, "invalid struct canary"),
        (Self::INVALID_STACK_ID, "invalid stack id"),
        (Self::ALLOCATION_FAILED, "allocation failed"),
        (Self::REGISTRY_FULL, "registry full"),
    ];

    /// Raw bit representation.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Builds a set from raw bits. Unknown bits are kept.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// True if no bit is set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set in `self`.
    #[inline]
    pub const fn contains(self, other: ErrorFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Human-readable names of the set bits, lowest bit first.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for ErrorFlags {
    type Output = ErrorFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ErrorFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ErrorFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ErrorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no error");
        }

        f.write_str(&self.names().join(", "))
    }
}

/// Lock-free register accumulating [`ErrorFlags`].
#[derive(Debug, Default)]
pub struct FlagRegister {
    bits: AtomicU64,
}

impl FlagRegister {
    /// Creates an empty register.
    pub const fn new() -> Self {
        Self {
            bits: AtomicU64::new(0),
        }
    }

    /// ORs `flags` into the register.
    #[inline]
    pub fn raise(&self, flags: ErrorFlags) {
        self.bits.fetch_or(flags.bits(), Ordering::Relaxed);
    }

    /// Current contents.
    #[inline]
    pub fn get(&self) -> ErrorFlags {
        ErrorFlags::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Returns the current contents and resets the register.
    #[inline]
    pub fn take(&self) -> ErrorFlags {
        ErrorFlags::from_bits(self.bits.swap(0, Ordering::Relaxed))
    }
}
