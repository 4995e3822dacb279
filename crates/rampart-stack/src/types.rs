// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use core::fmt;
use core::panic::Location;

use rampart_util::Zeroable;
use serde::Serialize;

use crate::constants::MAX_STACK_AMOUNT;

/// Opaque reference to a registry-managed stack.
///
/// Handles are 1-based; `0` is reserved for [`StackHandle::INVALID`] so a
/// failure value can never be confused with a live stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct StackHandle(u32);

// SAFETY: transparent over `u32`; the zero value is `StackHandle::INVALID`.
unsafe impl Zeroable for StackHandle {}

impl StackHandle {
    /// The handle value that never resolves.
    pub const INVALID: StackHandle = StackHandle(0);

    /// Wraps a raw handle value. Any value is accepted; validity is decided
    /// by the registry at resolve time.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True if this handle is in `1..=MAX_STACK_AMOUNT`.
    #[inline]
    pub const fn is_in_range(self) -> bool {
        self.0 != 0 && self.0 as usize <= MAX_STACK_AMOUNT
    }

    /// Index into the registry table, if in range.
    #[inline]
    pub(crate) const fn slot_index(self) -> Option<usize> {
        if self.is_in_range() {
            Some(self.0 as usize - 1)
        } else {
            None
        }
    }

    #[inline]
    pub(crate) const fn from_slot_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }
}

impl fmt::Display for StackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source location of a call into the public API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CallSite {
    /// Source file.
    pub file: &'static str,
    /// Line number, 1-based.
    pub line: u32,
    /// Column number, 1-based.
    pub column: u32,
}

impl CallSite {
    /// Captures the location of the caller of the enclosing `#[track_caller]` function.
    #[track_caller]
    #[inline]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&'static Location<'static>> for CallSite {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
