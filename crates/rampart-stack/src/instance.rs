// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! StackInstance - the guarded record behind every handle.
//!
//! Field order is fixed (`#[repr(C)]`): `meta_left` is the first field and
//! `meta_right` the last, so a linear overrun into or out of the metadata
//! block crosses a canary.

use rampart_canary::{Canary, CanaryGuarded, CanaryPosition};
use rampart_checksum::{RollingHash, StableFields, content_hash, struct_hash};
use rampart_util::zeroize_primitive;

use crate::buffer::{DataSide, GuardedBuffer};
use crate::config::ProtectionConfig;
use crate::constants::{Elem, MAX_CAPACITY, MIN_CAPACITY, POISON};
use crate::error::{Fault, StackError};
use crate::types::{CallSite, StackHandle};

/// A capacity change performed by a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reallocation {
    /// Capacity before.
    pub from: usize,
    /// Capacity after.
    pub to: usize,
}

/// Outcome of a successful pop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popped {
    /// The removed element.
    pub value: Elem,
    /// Shrink performed by the pop, if any.
    pub reallocation: Option<Reallocation>,
    /// A shrink that was due but could not be allocated. The pop itself
    /// still succeeded and capacity is unchanged.
    pub shrink_failure: Option<StackError>,
}

/// Metadata and storage of one stack.
#[repr(C)]
#[derive(Debug)]
pub struct StackInstance {
    meta_left: Canary,
    handle: StackHandle,
    origin: CallSite,
    size: usize,
    capacity: usize,
    buffer: Option<GuardedBuffer>,
    content_hash: u64,
    struct_hash: u64,
    meta_right: Canary,
}

impl StackInstance {
    /// Wraps a freshly allocated buffer and stamps the guards selected by
    /// `config`.
    pub fn new(
        handle: StackHandle,
        buffer: GuardedBuffer,
        origin: CallSite,
        config: &ProtectionConfig,
    ) -> Self {
        let capacity = buffer.capacity();
        let mut instance = Self {
            meta_left: Canary::ZERO,
            handle,
            origin,
            size: 0,
            capacity,
            buffer: Some(buffer),
            content_hash: 0,
            struct_hash: 0,
            meta_right: Canary::ZERO,
        };
        instance.restamp(config);

        instance
    }

    /// Re-stamps canaries and recomputes both hashes.
    ///
    /// Disabled guards are written as zero.
    pub fn restamp(&mut self, config: &ProtectionConfig) {
        if config.canary {
            self.stamp();
        } else {
            self.clear();
        }

        if config.hash {
            self.content_hash = self.computed_content_hash();
            self.struct_hash = self.computed_struct_hash();
        } else {
            self.content_hash = 0;
            self.struct_hash = 0;
        }
    }

    /// Handle stored in the instance.
    #[inline]
    pub fn handle(&self) -> StackHandle {
        self.handle
    }

    /// Creation call site.
    #[inline]
    pub fn origin(&self) -> CallSite {
        self.origin
    }

    /// Number of live elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Stored capacity in elements.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The data buffer, if present.
    #[inline]
    pub fn buffer(&self) -> Option<&GuardedBuffer> {
        self.buffer.as_ref()
    }

    /// Stored content hash.
    #[inline]
    pub fn stored_content_hash(&self) -> u64 {
        self.content_hash
    }

    /// Stored structural hash.
    #[inline]
    pub fn stored_struct_hash(&self) -> u64 {
        self.struct_hash
    }

    /// Content hash recomputed over every slot of the buffer.
    pub fn computed_content_hash(&self) -> u64 {
        match &self.buffer {
            Some(buffer) => content_hash(buffer.slot_bytes()),
            None => content_hash(&[]),
        }
    }

    /// Structural hash recomputed over the stable fields.
    pub fn computed_struct_hash(&self) -> u64 {
        struct_hash(self)
    }

    pub(crate) fn set_handle(&mut self, handle: StackHandle) {
        self.handle = handle;
    }

    fn buffer_mut(&mut self) -> Result<&mut GuardedBuffer, StackError> {
        self.buffer
            .as_mut()
            .ok_or(StackError::Corrupted(Fault::MissingBuffer))
    }

    /// Appends `value`, doubling capacity when full.
    pub fn push(
        &mut self,
        value: Elem,
        config: &ProtectionConfig,
    ) -> Result<Option<Reallocation>, StackError> {
        let size = self.size;
        let capacity = self.capacity;
        let mut reallocation = None;

        if size >= capacity {
            if capacity >= MAX_CAPACITY {
                return Err(StackError::Overflow { capacity });
            }

            let to = capacity.saturating_mul(2).clamp(MIN_CAPACITY, MAX_CAPACITY);
            self.buffer_mut()?.reallocate(to, size)?;
            self.capacity = to;
            reallocation = Some(Reallocation { from: capacity, to });
        }

        let capacity = self.capacity;
        let buffer = self.buffer_mut()?;
        if !buffer.set(size, value) {
            let slots = buffer.capacity();
            return Err(StackError::Corrupted(Fault::CapacityInconsistent { capacity, slots }));
        }
        self.size = size + 1;
        self.restamp(config);

        Ok(reallocation)
    }

    /// Removes the top element and poisons its slot.
    ///
    /// Shrinks by half once `size <= capacity / 4`, never below
    /// [`MIN_CAPACITY`].
    pub fn pop(&mut self, config: &ProtectionConfig) -> Result<Popped, StackError> {
        if self.size == 0 {
            return Err(StackError::Underflow);
        }

        let top = self.size - 1;
        let capacity = self.capacity;
        let buffer = self.buffer_mut()?;
        let slots = buffer.capacity();
        let value = buffer
            .get(top)
            .ok_or(StackError::Corrupted(Fault::CapacityInconsistent { capacity, slots }))?;
        buffer.set(top, POISON);
        self.size = top;

        let mut reallocation = None;
        let mut shrink_failure = None;
        let half = capacity / 2;

        if self.size <= capacity / 4 && half >= MIN_CAPACITY {
            let live = self.size;
            match self.buffer_mut()?.reallocate(half, live) {
                Ok(()) => {
                    self.capacity = half;
                    reallocation = Some(Reallocation {
                        from: capacity,
                        to: half,
                    });
                }
                Err(e) => shrink_failure = Some(e),
            }
        }

        self.restamp(config);

        Ok(Popped {
            value,
            reallocation,
            shrink_failure,
        })
    }

    /// Reallocates to exactly `new_capacity` slots.
    ///
    /// Returns `None` if the capacity is already `new_capacity`.
    pub fn resize(
        &mut self,
        new_capacity: usize,
        config: &ProtectionConfig,
    ) -> Result<Option<Reallocation>, StackError> {
        if new_capacity > MAX_CAPACITY {
            return Err(StackError::RequestedTooMuch {
                requested: new_capacity,
                max: MAX_CAPACITY,
            });
        }

        if new_capacity < MIN_CAPACITY || new_capacity < self.size {
            return Err(StackError::RequestedTooLittle {
                requested: new_capacity,
                min: self.size.max(MIN_CAPACITY),
            });
        }

        let from = self.capacity;
        if new_capacity == from {
            return Ok(None);
        }

        let live = self.size;
        self.buffer_mut()?.reallocate(new_capacity, live)?;
        self.capacity = new_capacity;
        self.restamp(config);

        Ok(Some(Reallocation {
            from,
            to: new_capacity,
        }))
    }

    /// Wipes every field and releases the buffer.
    ///
    /// Returns the number of bytes released. After teardown the instance
    /// reads as missing.
    pub fn teardown(&mut self) -> usize {
        let released = match self.buffer.take() {
            Some(mut buffer) => {
                buffer.zeroize();
                buffer.len_bytes()
            }
            None => 0,
        };

        zeroize_primitive(&mut self.meta_left.0);
        zeroize_primitive(&mut self.handle);
        zeroize_primitive(&mut self.size);
        zeroize_primitive(&mut self.capacity);
        zeroize_primitive(&mut self.content_hash);
        zeroize_primitive(&mut self.struct_hash);
        zeroize_primitive(&mut self.meta_right.0);
        self.origin = CallSite::default();

        released
    }
}

impl CanaryGuarded for StackInstance {
    fn read_canary(&self, position: CanaryPosition) -> Option<Canary> {
        match position {
            CanaryPosition::MetaLeft => Some(self.meta_left),
            CanaryPosition::MetaRight => Some(self.meta_right),
            CanaryPosition::DataLeft => self.buffer.as_ref().map(|b| b.read_canary(DataSide::Left)),
            CanaryPosition::DataRight => {
                self.buffer.as_ref().map(|b| b.read_canary(DataSide::Right))
            }
        }
    }

    fn write_canary(&mut self, position: CanaryPosition, canary: Canary) {
        match position {
            CanaryPosition::MetaLeft => self.meta_left = canary,
            CanaryPosition::MetaRight => self.meta_right = canary,
            CanaryPosition::DataLeft => {
                if let Some(buffer) = self.buffer.as_mut() {
                    buffer.write_canary(DataSide::Left, canary);
                }
            }
            CanaryPosition::DataRight => {
                if let Some(buffer) = self.buffer.as_mut() {
                    buffer.write_canary(DataSide::Right, canary);
                }
            }
        }
    }
}

impl StableFields for StackInstance {
    fn hash_stable_fields(&self, hasher: &mut RollingHash) {
        hasher.write_u64(self.meta_left.0);
        hasher.write_u32(self.handle.raw());
        hasher.write_str(self.origin.file);
        hasher.write_u32(self.origin.line);
        hasher.write_u32(self.origin.column);
        hasher.write_usize(self.size);
        hasher.write_usize(self.capacity);
        hasher.write_bool(self.buffer.is_some());
        hasher.write_usize(self.buffer.as_ref().map_or(0, GuardedBuffer::base_address));
        hasher.write_u64(self.content_hash);
        hasher.write_u64(self.meta_right.0);
    }
}

/// Corruption injection. Every method writes around the guards on purpose;
/// nothing is re-stamped.
#[cfg(any(test, feature = "test-utils"))]
impl StackInstance {
    /// Mutable access to the buffer.
    pub fn buffer_mut_unchecked(&mut self) -> Option<&mut GuardedBuffer> {
        self.buffer.as_mut()
    }

    /// Drops the buffer without touching anything else.
    pub fn take_buffer_unchecked(&mut self) -> Option<GuardedBuffer> {
        self.buffer.take()
    }

    /// Overwrites the stored handle.
    pub fn set_handle_unchecked(&mut self, handle: StackHandle) {
        self.handle = handle;
    }

    /// Overwrites the stored size.
    pub fn set_size_unchecked(&mut self, size: usize) {
        self.size = size;
    }

    /// Overwrites the stored capacity.
    pub fn set_capacity_unchecked(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    /// Overwrites the stored content hash.
    pub fn set_content_hash_unchecked(&mut self, hash: u64) {
        self.content_hash = hash;
    }

    /// Overwrites the stored structural hash.
    pub fn set_struct_hash_unchecked(&mut self, hash: u64) {
        self.struct_hash = hash;
    }

    /// Writes `value` into slot `index` of the buffer, bypassing the guards.
    pub fn write_slot_unchecked(&mut self, index: usize, value: Elem) -> bool {
        self.buffer
            .as_mut()
            .is_some_and(|buffer| buffer.set(index, value))
    }

    /// Inverts one byte of the canary at `position`.
    pub fn flip_canary_byte(&mut self, position: CanaryPosition, byte: usize) {
        let Some(canary) = self.read_canary(position) else {
            return;
        };
        let mut raw = canary.to_le_bytes();
        raw[byte % raw.len()] ^= 0xFF;
        self.write_canary(position, Canary::from_le_bytes(raw));
    }
}

