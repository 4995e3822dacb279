// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Boundary canaries for guarded containers.
//!
//! A guarded container carries four sentinel positions:
//!
//! ```text
//! [MetaLeft | metadata fields ... | MetaRight]
//! [DataLeft | slot 0 | slot 1 | ... | slot n-1 | DataRight]
//! ```
//!
//! Each position holds [`CANARY`] while the container is intact. A linear
//! overrun out of either block lands on a canary first, so a mismatch is the
//! earliest possible evidence of a stray write.
//!
//! Types opt in by implementing [`CanaryGuarded`], which only requires reading
//! and writing a single position. [`CanaryGuarded::stamp`],
//! [`CanaryGuarded::check`] and [`CanaryGuarded::clear`] are provided.
//!
//! # Example
//!
//! ```rust
//! use rampart_canary::{Canary, CanaryGuarded, CanaryPosition};
//!
//! #[derive(Default)]
//! struct Guarded {
//!     slots: [Canary; 4],
//! }
//!
//! impl CanaryGuarded for Guarded {
//!     fn read_canary(&self, position: CanaryPosition) -> Option<Canary> {
//!         Some(self.slots[position.index()])
//!     }
//!
//!     fn write_canary(&mut self, position: CanaryPosition, canary: Canary) {
//!         self.slots[position.index()] = canary;
//!     }
//! }
//!
//! let mut guarded = Guarded::default();
//! assert!(guarded.check().is_err());
//!
//! guarded.stamp();
//! assert!(guarded.check().is_ok());
//!
//! guarded.slots[CanaryPosition::DataRight.index()] = Canary::ZERO;
//! let violation = guarded.check().unwrap_err();
//! assert_eq!(violation.position, CanaryPosition::DataRight);
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]


mod error;

use core::fmt;

pub use error::CanaryViolation;

/// Width of a canary in bytes.
pub const CANARY_SIZE: usize = 8;

/// A 64-bit boundary sentinel.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Canary(pub u64);

/// The fixed sentinel value stamped at every boundary position.
pub const CANARY: Canary = Canary(0xCA11_AB1E_BADD_CAFE);

impl Canary {
    /// The value held by positions of containers with canary protection disabled.
    pub const ZERO: Canary = Canary(0);

    /// Serializes to little-endian bytes.
    #[inline]
    pub const fn to_le_bytes(self) -> [u8; CANARY_SIZE] {
        self.0.to_le_bytes()
    }

    /// Deserializes from little-endian bytes.
    #[inline]
    pub const fn from_le_bytes(bytes: [u8; CANARY_SIZE]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    /// Returns true if this canary equals [`CANARY`].
    #[inline]
    pub const fn is_intact(self) -> bool {
        self.0 == CANARY.0
    }
}

impl fmt::Debug for Canary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Canary({:#018x})", self.0)
    }
}

impl fmt::Display for Canary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// One of the four sentinel positions of a guarded container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CanaryPosition {
    /// Immediately before the metadata block.
    MetaLeft,
    /// Immediately after the metadata block.
    MetaRight,
    /// Immediately before the first element slot.
    DataLeft,
    /// Immediately after the last element slot.
    DataRight,
}

impl CanaryPosition {
    /// All positions, in check order.
    pub const ALL: [CanaryPosition; 4] = [
        CanaryPosition::MetaLeft,
        CanaryPosition::MetaRight,
        CanaryPosition::DataLeft,
        CanaryPosition::DataRight,
    ];

    /// Dense index in `0..4`, following [`CanaryPosition::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            CanaryPosition::MetaLeft => 0,
            CanaryPosition::MetaRight => 1,
            CanaryPosition::DataLeft => 2,
            CanaryPosition::DataRight => 3,
        }
    }

    /// True for the two positions bracketing the metadata block.
    #[inline]
    pub const fn is_metadata(self) -> bool {
        matches!(self, CanaryPosition::MetaLeft | CanaryPosition::MetaRight)
    }
}

impl fmt::Display for CanaryPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CanaryPosition::MetaLeft => "meta-left",
            CanaryPosition::MetaRight => "meta-right",
            CanaryPosition::DataLeft => "data-left",
            CanaryPosition::DataRight => "data-right",
        };
        f.write_str(name)
    }
}

/// Containers bracketed by four boundary canaries.
pub trait CanaryGuarded {
    /// Reads the canary at `position`.
    ///
    /// Returns `None` if the position does not currently exist (for example,
    /// the data block has not been allocated).
    fn read_canary(&self, position: CanaryPosition) -> Option<Canary>;

    /// Writes `canary` at `position`. Absent positions are skipped.
    fn write_canary(&mut self, position: CanaryPosition, canary: Canary);

    /// Writes [`CANARY`] to all four positions.
    fn stamp(&mut self) {
        for position in CanaryPosition::ALL {
            self.write_canary(position, CANARY);
        }
    }

    /// Writes [`Canary::ZERO`] to all four positions.
    fn clear(&mut self) {
        for position in CanaryPosition::ALL {
            self.write_canary(position, Canary::ZERO);
        }
    }

    /// Verifies all four positions, reporting the first mismatch.
    ///
    /// Never mutates and never allocates.
    fn check(&self) -> Result<(), CanaryViolation> {
        for position in CanaryPosition::ALL {
            match self.read_canary(position) {
                Some(canary) if canary.is_intact() => {}
                found => return Err(CanaryViolation { position, found }),
            }
        }

        Ok(())
    }
}
