// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Handle table.
//!
//! A fixed array of [`MAX_STACK_AMOUNT`] slots behind one lock. The lock is
//! held only for the table operation itself, never while an instance lock is
//! being acquired, so the lock order is always instance before registry.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::constants::MAX_STACK_AMOUNT;
use crate::error::StackError;
use crate::instance::StackInstance;
use crate::types::StackHandle;

/// An instance shared between the registry and in-flight operations.
pub type SharedInstance = Arc<Mutex<StackInstance>>;

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Free,
    Reserved,
    Live(SharedInstance),
}

/// Table mapping handles to live instances.
#[derive(Debug)]
pub struct Registry {
    slots: Mutex<[Slot; MAX_STACK_AMOUNT]>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(core::array::from_fn(|_| Slot::Free)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, [Slot; MAX_STACK_AMOUNT]>, StackError> {
        self.slots.lock().map_err(|_| StackError::LockPoisoned)
    }

    /// Reserves the lowest free slot.
    pub fn acquire(&self) -> Result<StackHandle, StackError> {
        let mut slots = self.lock()?;
        let index = slots
            .iter()
            .position(|slot| matches!(slot, Slot::Free))
            .ok_or(StackError::RegistryFull)?;
        slots[index] = Slot::Reserved;

        Ok(StackHandle::from_slot_index(index))
    }

    /// Returns a reserved slot to the pool without installing anything.
    pub fn abandon(&self, handle: StackHandle) -> Result<(), StackError> {
        let index = handle
            .slot_index()
            .ok_or(StackError::InvalidHandle(handle))?;
        let mut slots = self.lock()?;

        match slots[index] {
            Slot::Reserved => {
                slots[index] = Slot::Free;
                Ok(())
            }
            _ => Err(StackError::InvalidHandle(handle)),
        }
    }

    /// Occupies a reserved slot with `instance`.
    pub fn install(&self, handle: StackHandle, instance: SharedInstance) -> Result<(), StackError> {
        let index = handle
            .slot_index()
            .ok_or(StackError::InvalidHandle(handle))?;
        let mut slots = self.lock()?;

        match slots[index] {
            Slot::Reserved => {
                slots[index] = Slot::Live(instance);
                Ok(())
            }
            _ => Err(StackError::InvalidHandle(handle)),
        }
    }

    /// Looks up a live instance.
    pub fn resolve(&self, handle: StackHandle) -> Result<SharedInstance, StackError> {
        let index = handle
            .slot_index()
            .ok_or(StackError::InvalidHandle(handle))?;
        let slots = self.lock()?;

        match &slots[index] {
            Slot::Live(instance) => Ok(Arc::clone(instance)),
            _ => Err(StackError::InvalidHandle(handle)),
        }
    }

    /// True if `handle` still maps to exactly `instance`.
    pub fn is_current(&self, handle: StackHandle, instance: &SharedInstance) -> Result<bool, StackError> {
        let Some(index) = handle.slot_index() else {
            return Ok(false);
        };
        let slots = self.lock()?;

        Ok(matches!(&slots[index], Slot::Live(live) if Arc::ptr_eq(live, instance)))
    }

    /// Frees a live slot and hands back its instance. The handle becomes
    /// reusable immediately.
    pub fn release(&self, handle: StackHandle) -> Result<SharedInstance, StackError> {
        let index = handle
            .slot_index()
            .ok_or(StackError::InvalidHandle(handle))?;
        let mut slots = self.lock()?;

        match core::mem::take(&mut slots[index]) {
            Slot::Live(instance) => Ok(instance),
            other => {
                slots[index] = other;
                Err(StackError::InvalidHandle(handle))
            }
        }
    }

    /// Exchanges the instances of two live slots. The instances themselves
    /// are not touched.
    pub fn swap_slots(&self, a: StackHandle, b: StackHandle) -> Result<(), StackError> {
        let ia = a.slot_index().ok_or(StackError::InvalidHandle(a))?;
        let ib = b.slot_index().ok_or(StackError::InvalidHandle(b))?;
        let mut slots = self.lock()?;

        if !matches!(slots[ia], Slot::Live(_)) {
            return Err(StackError::InvalidHandle(a));
        }
        if !matches!(slots[ib], Slot::Live(_)) {
            return Err(StackError::InvalidHandle(b));
        }
        slots.swap(ia, ib);

        Ok(())
    }

    /// Handles of every live slot, ascending.
    pub fn live_handles(&self) -> Result<Vec<StackHandle>, StackError> {
        let slots = self.lock()?;

        Ok(slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Slot::Live(_)))
            .map(|(index, _)| StackHandle::from_slot_index(index))
            .collect())
    }
}
