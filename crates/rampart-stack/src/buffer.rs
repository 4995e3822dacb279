// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! GuardedBuffer - element storage bracketed by two data canaries.
//!
//! One contiguous byte allocation holds:
//!
//! ```text
//! [DataLeft: 8 bytes][slot 0][slot 1] ... [slot capacity-1][DataRight: 8 bytes]
//! ```
//!
//! Slots are little-endian [`Elem`] values. A write one slot past the end
//! lands on the right canary.

use rampart_canary::{CANARY_SIZE, Canary};
use rampart_util::{fast_zeroize_slice, fill_bytes_with_pattern};

use crate::constants::{Elem, POISON_BYTES, SLOT_SIZE};
use crate::error::StackError;

/// Which end of the buffer a data canary sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSide {
    /// Before slot 0.
    Left,
    /// After the last slot.
    Right,
}

/// Failure injection for allocation paths.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BufferBehaviour {
    /// Allocate normally.
    #[default]
    None,
    /// Fail every reallocation to a larger capacity.
    FailAtGrow,
    /// Fail every reallocation to a smaller capacity.
    FailAtShrink,
    /// Fail the initial allocation.
    FailAtAllocate,
}

/// Element storage with data canaries at both extremities.
pub struct GuardedBuffer {
    bytes: Vec<u8>,
    capacity: usize,
    #[cfg(any(test, feature = "test-utils"))]
    behaviour: BufferBehaviour,
}

impl core::fmt::Debug for GuardedBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GuardedBuffer")
            .field("capacity", &self.capacity)
            .field("bytes", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

impl GuardedBuffer {
    /// Total allocation size for `capacity` slots.
    #[inline]
    pub const fn byte_len(capacity: usize) -> usize {
        capacity * SLOT_SIZE + 2 * CANARY_SIZE
    }

    fn try_alloc_bytes(len: usize) -> Result<Vec<u8>, StackError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| StackError::Allocation { bytes: len })?;
        bytes.resize(len, 0);

        Ok(bytes)
    }

    /// Allocates `capacity` poisoned slots. Both canaries start zeroed; the
    /// owner stamps them.
    pub fn allocate(capacity: usize) -> Result<Self, StackError> {
        let mut bytes = Self::try_alloc_bytes(Self::byte_len(capacity))?;
        fill_bytes_with_pattern(
            &mut bytes[CANARY_SIZE..CANARY_SIZE + capacity * SLOT_SIZE],
            &POISON_BYTES,
        );

        Ok(Self {
            bytes,
            capacity,
            #[cfg(any(test, feature = "test-utils"))]
            behaviour: BufferBehaviour::default(),
        })
    }

    /// Number of element slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total bytes held, canaries included.
    #[inline]
    pub fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Address of the allocation. Stable until the next reallocation.
    #[inline]
    pub fn base_address(&self) -> usize {
        self.bytes.as_ptr() as usize
    }

    /// The slot region, exactly `capacity * SLOT_SIZE` bytes.
    #[inline]
    pub fn slot_bytes(&self) -> &[u8] {
        &self.bytes[CANARY_SIZE..CANARY_SIZE + self.capacity * SLOT_SIZE]
    }

    #[inline]
    fn slot_offset(&self, index: usize) -> Option<usize> {
        (index < self.capacity).then(|| CANARY_SIZE + index * SLOT_SIZE)
    }

    /// Reads slot `index`.
    pub fn get(&self, index: usize) -> Option<Elem> {
        let offset = self.slot_offset(index)?;
        let mut raw = [0u8; SLOT_SIZE];
        raw.copy_from_slice(&self.bytes[offset..offset + SLOT_SIZE]);

        Some(Elem::from_le_bytes(raw))
    }

    /// Writes slot `index`. Returns `false` if out of range.
    pub fn set(&mut self, index: usize, value: Elem) -> bool {
        let Some(offset) = self.slot_offset(index) else {
            return false;
        };
        self.bytes[offset..offset + SLOT_SIZE].copy_from_slice(&value.to_le_bytes());

        true
    }

    /// Overwrites slots `[start, capacity)` with poison.
    pub fn poison_from(&mut self, start: usize) {
        if start >= self.capacity {
            return;
        }
        let begin = CANARY_SIZE + start * SLOT_SIZE;
        let end = CANARY_SIZE + self.capacity * SLOT_SIZE;
        fill_bytes_with_pattern(&mut self.bytes[begin..end], &POISON_BYTES);
    }

    /// Reads the data canary on `side`.
    pub fn read_canary(&self, side: DataSide) -> Canary {
        let offset = match side {
            DataSide::Left => 0,
            DataSide::Right => self.bytes.len() - CANARY_SIZE,
        };
        let mut raw = [0u8; CANARY_SIZE];
        raw.copy_from_slice(&self.bytes[offset..offset + CANARY_SIZE]);

        Canary::from_le_bytes(raw)
    }

    /// Writes the data canary on `side`.
    pub fn write_canary(&mut self, side: DataSide, canary: Canary) {
        let offset = match side {
            DataSide::Left => 0,
            DataSide::Right => self.bytes.len() - CANARY_SIZE,
        };
        self.bytes[offset..offset + CANARY_SIZE].copy_from_slice(&canary.to_le_bytes());
    }

    /// Moves storage to a fresh allocation of `new_capacity` slots.
    ///
    /// The first `live` slots are copied, the rest are poisoned and the old
    /// allocation is zeroized before it is released. Canaries of the new
    /// allocation start zeroed; the owner re-stamps them. On failure the
    /// buffer is left untouched.
    pub fn reallocate(&mut self, new_capacity: usize, live: usize) -> Result<(), StackError> {
        let new_len = Self::byte_len(new_capacity);

        #[cfg(any(test, feature = "test-utils"))]
        {
            let injected = match self.behaviour {
                BufferBehaviour::None | BufferBehaviour::FailAtAllocate => false,
                BufferBehaviour::FailAtGrow => new_capacity > self.capacity,
                BufferBehaviour::FailAtShrink => new_capacity < self.capacity,
            };
            if injected {
                return Err(StackError::Allocation { bytes: new_len });
            }
        }

        let mut bytes = Self::try_alloc_bytes(new_len)?;
        let live = live.min(self.capacity).min(new_capacity);
        let live_end = CANARY_SIZE + live * SLOT_SIZE;

        bytes[CANARY_SIZE..live_end].copy_from_slice(&self.bytes[CANARY_SIZE..live_end]);
        fill_bytes_with_pattern(
            &mut bytes[live_end..CANARY_SIZE + new_capacity * SLOT_SIZE],
            &POISON_BYTES,
        );

        fast_zeroize_slice(&mut self.bytes);
        self.bytes = bytes;
        self.capacity = new_capacity;

        Ok(())
    }

    /// Zeroizes the whole allocation, canaries included.
    pub fn zeroize(&mut self) {
        fast_zeroize_slice(&mut self.bytes);
    }

    /// Raw bytes, canaries included.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl GuardedBuffer {
    /// Allocates like [`GuardedBuffer::allocate`] with failure injection active
    /// from the start.
    pub fn allocate_with(capacity: usize, behaviour: BufferBehaviour) -> Result<Self, StackError> {
        if behaviour == BufferBehaviour::FailAtAllocate {
            return Err(StackError::Allocation {
                bytes: Self::byte_len(capacity),
            });
        }

        let mut buffer = Self::allocate(capacity)?;
        buffer.behaviour = behaviour;

        Ok(buffer)
    }

    /// Changes the failure injection mode.
    pub fn change_behaviour(&mut self, behaviour: BufferBehaviour) {
        self.behaviour = behaviour;
    }

    /// Raw mutable bytes, canaries included. For corruption injection.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for GuardedBuffer {
    fn drop(&mut self) {
        self.zeroize();
    }
}
