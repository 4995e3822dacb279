// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Capacity bounds and sentinel values.

/// Element type stored by every stack.
pub type Elem = i32;

/// Width of one element slot in bytes.
pub const SLOT_SIZE: usize = core::mem::size_of::<Elem>();

/// Smallest capacity a live stack may have. Requests below it are clamped
/// at construction and rejected by `resize`.
pub const MIN_CAPACITY: usize = 8;

/// Largest capacity a live stack may have.
pub const MAX_CAPACITY: usize = 1024 * 1024;

/// Size of the registry table: the maximum number of concurrently live stacks.
pub const MAX_STACK_AMOUNT: usize = 16;

/// Value written into every slot in `[size, capacity)`.
pub const POISON: Elem = 0xDEAD_BEEF_u32 as Elem;

/// Little-endian bytes of [`POISON`].
pub const POISON_BYTES: [u8; SLOT_SIZE] = POISON.to_le_bytes();
