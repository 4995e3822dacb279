// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Rolling checksums for tamper detection.
//!
//! Two hashes protect every Rampart container:
//!
//! - **Content hash**: computed over every element slot of the backing buffer,
//!   including poisoned tail slots, so the result is deterministic over the
//!   whole allocation.
//! - **Structural hash**: computed over an explicit, ordered list of the
//!   container's stable metadata fields (see [`StableFields`]). The stored
//!   structural hash itself and any synchronization state never participate.
//!
//! Both are built on [`RollingHash`], a multiplicative accumulator with a
//! fixed seed (64-bit FNV-1a). This is NOT a cryptographic hash: the threat
//! model is stray writes, not an adversary who can recompute checksums.
//!
//! # Example
//!
//! ```rust
//! use rampart_checksum::{RollingHash, StableFields, content_hash, struct_hash};
//!
//! struct Header {
//!     size: usize,
//!     capacity: usize,
//!     checksum: u64, // excluded: never written into the hasher
//! }
//!
//! impl StableFields for Header {
//!     fn hash_stable_fields(&self, hasher: &mut RollingHash) {
//!         hasher.write_usize(self.size);
//!         hasher.write_usize(self.capacity);
//!     }
//! }
//!
//! let mut header = Header { size: 1, capacity: 8, checksum: 0 };
//! header.checksum = struct_hash(&header);
//!
//! // Changing the excluded field does not change the structural hash.
//! let saved = header.checksum;
//! header.checksum = 0;
//! assert_eq!(struct_hash(&header), saved);
//!
//! assert_ne!(content_hash(&[1, 2, 3, 4]), content_hash(&[1, 2, 3, 5]));
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]


/// Fixed seed of the accumulator (FNV-1a 64-bit offset basis).
pub const HASH_SEED: u64 = 0xcbf2_9ce4_8422_2325;

/// Multiplier applied after every absorbed byte (FNV-1a 64-bit prime).
pub const HASH_MULTIPLIER: u64 = 0x0000_0100_0000_01b3;

/// Deterministic rolling hash with a fixed seed.
///
/// Every absorbed byte is XORed into the state, which is then multiplied by
/// [`HASH_MULTIPLIER`]. Multi-byte writers absorb little-endian bytes so the
/// result does not depend on the host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingHash {
    state: u64,
}

impl Default for RollingHash {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingHash {
    /// Creates a hasher seeded with [`HASH_SEED`].
    #[inline]
    pub const fn new() -> Self {
        Self { state: HASH_SEED }
    }

    /// Absorbs raw bytes.
    #[inline]
    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u64::from(byte);
            self.state = self.state.wrapping_mul(HASH_MULTIPLIER);
        }
    }

    /// Absorbs a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.update(&[value]);
    }

    /// Absorbs a `u32` as little-endian bytes.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.update(&value.to_le_bytes());
    }

    /// Absorbs an `i32` as little-endian bytes.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.update(&value.to_le_bytes());
    }

    /// Absorbs a `u64` as little-endian bytes.
    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.update(&value.to_le_bytes());
    }

    /// Absorbs a `usize`, widened to `u64` so 32- and 64-bit hosts agree.
    #[inline]
    pub fn write_usize(&mut self, value: usize) {
        self.write_u64(value as u64);
    }

    /// Absorbs a `bool` as one byte.
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    /// Absorbs a string, length-prefixed so adjacent strings cannot alias.
    #[inline]
    pub fn write_str(&mut self, value: &str) {
        self.write_usize(value.len());
        self.update(value.as_bytes());
    }

    /// Returns the current state without consuming the hasher.
    #[inline]
    pub const fn finish(&self) -> u64 {
        self.state
    }
}

/// Types that can enumerate the metadata fields covered by a structural hash.
///
/// Implementors write each stable field into the hasher in a fixed order.
/// Fields that legitimately change without being damage (the stored
/// structural hash, lock state) must be left out.
pub trait StableFields {
    /// Writes every stable field into `hasher`, in declaration order.
    fn hash_stable_fields(&self, hasher: &mut RollingHash);
}

/// Computes the content hash over a slot region.
///
/// The caller passes exactly `capacity` slots worth of bytes, poisoned tail
/// included.
#[inline]
pub fn content_hash(slot_bytes: &[u8]) -> u64 {
    let mut hasher = RollingHash::new();
    hasher.update(slot_bytes);
    hasher.finish()
}

/// Computes the structural hash of `value` over its stable fields.
#[inline]
pub fn struct_hash<T: StableFields + ?Sized>(value: &T) -> u64 {
    let mut hasher = RollingHash::new();
    value.hash_stable_fields(&mut hasher);
    hasher.finish()
}
