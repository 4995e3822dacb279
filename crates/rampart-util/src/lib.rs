// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Memory utilities for sentinel fills and verified zeroization.
//!
//! Rampart containers poison unused slots with a fixed element pattern and
//! wipe every allocation they give back. These helpers do both without
//! letting the optimizer elide the writes.

#![cfg_attr(not(test), no_std)]

/// Fills a byte slice with a repeating multi-byte pattern.
///
/// The pattern is laid down from the start of the slice; a trailing partial
/// repetition is written if `slice.len()` is not a multiple of the pattern
/// length. An empty pattern leaves the slice untouched.
///
/// # Example
///
/// ```
/// use rampart_util::fill_bytes_with_pattern;
///
/// let mut buffer = [0u8; 8];
/// fill_bytes_with_pattern(&mut buffer, &[0xDE, 0xAD, 0xBE, 0xEF]);
/// assert_eq!(buffer, [0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF]);
/// ```
#[inline]
pub fn fill_bytes_with_pattern(slice: &mut [u8], pattern: &[u8]) {
    if pattern.is_empty() {
        return;
    }

    for (byte, src) in slice.iter_mut().zip(pattern.iter().cycle()) {
        *byte = *src;
    }
}

/// Returns `true` if every complete chunk of `slice` equals `pattern`.
///
/// Used to verify that poisoned regions still hold the sentinel. A slice
/// whose length is not a multiple of the pattern length never matches.
///
/// # Example
///
/// ```
/// use rampart_util::{fill_bytes_with_pattern, is_filled_with_pattern};
///
/// let mut buffer = [0u8; 12];
/// fill_bytes_with_pattern(&mut buffer, &[1, 2, 3]);
/// assert!(is_filled_with_pattern(&buffer, &[1, 2, 3]));
///
/// buffer[4] = 9;
/// assert!(!is_filled_with_pattern(&buffer, &[1, 2, 3]));
/// ```
#[inline]
pub fn is_filled_with_pattern(slice: &[u8], pattern: &[u8]) -> bool {
    if pattern.is_empty() || slice.len() % pattern.len() != 0 {
        return false;
    }

    slice.chunks_exact(pattern.len()).all(|chunk| chunk == pattern)
}

/// Verifies that a slice is zeroized.
///
/// # Example
///
/// ```
/// use rampart_util::is_slice_zeroized;
///
/// assert!(is_slice_zeroized(&[0u8; 10]));
/// assert!(!is_slice_zeroized(&[0u8, 1, 0, 0]));
/// ```
#[inline(always)]
pub fn is_slice_zeroized(slice: &[u8]) -> bool {
    slice.iter().all(|&b| b == 0)
}

/// Types for which the all-zero bit pattern is a valid value.
///
/// Bounds [`zeroize_primitive`] and [`fast_zeroize_slice`]. References,
/// `NonZero*`, function pointers and enums with no zero discriminant must
/// never implement it.
///
/// # Safety
///
/// Implementors guarantee that a value made of `size_of::<Self>()` zero bytes
/// is a valid `Self` and that `Self` has no drop glue. A `#[repr(transparent)]`
/// wrapper around a `Zeroable` field satisfies this.
///
/// ```compile_fail
/// use rampart_util::zeroize_primitive;
///
/// let mut reference: &u8 = &7;
/// zeroize_primitive(&mut reference);
/// ```
///
/// ```compile_fail
/// use core::num::NonZeroU32;
/// use rampart_util::fast_zeroize_slice;
///
/// let mut values = [NonZeroU32::MIN; 2];
/// fast_zeroize_slice(&mut values);
/// ```
pub unsafe trait Zeroable: Copy {}

macro_rules! impl_zeroable {
    ($($ty:ty),* $(,)?) => {
        $(
            // SAFETY: all-zero bytes are a valid value of this primitive.
            unsafe impl Zeroable for $ty {}
        )*
    };
}

impl_zeroable!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char,
);

// SAFETY: every element is `Zeroable` and arrays have no padding between them.
unsafe impl<T: Zeroable, const N: usize> Zeroable for [T; N] {}

/// Zeroizes a single value using volatile write.
///
/// # Example
///
/// ```
/// use rampart_util::zeroize_primitive;
///
/// let mut x = 42u64;
/// zeroize_primitive(&mut x);
/// assert_eq!(x, 0);
///
/// let mut flag = true;
/// zeroize_primitive(&mut flag);
/// assert!(!flag);
/// ```
#[inline(always)]
pub fn zeroize_primitive<T: Zeroable>(val: &mut T) {
    // SAFETY: `T: Zeroable` makes all-zero bytes a valid `T`, and `val` is a
    // valid, aligned, exclusive pointer.
    unsafe {
        core::ptr::write_volatile(val, core::mem::zeroed());
    }
}

/// Fast bulk zeroization that can be vectorized.
///
/// Uses `write_bytes` (memset) followed by a volatile read so the optimizer
/// cannot treat the wipe as a dead store.
///
/// # Example
///
/// ```
/// use rampart_util::fast_zeroize_slice;
///
/// let mut data = vec![1u8, 2, 3, 4, 5];
/// fast_zeroize_slice(&mut data);
/// assert!(data.iter().all(|&b| b == 0));
///
/// let mut ints = vec![0x7EADBEEFi32; 10];
/// fast_zeroize_slice(&mut ints);
/// assert!(ints.iter().all(|&v| v == 0));
/// ```
#[inline(always)]
pub fn fast_zeroize_slice<T: Zeroable>(slice: &mut [T]) {
    if slice.is_empty() {
        return;
    }

    let byte_len = core::mem::size_of_val(slice);
    // SAFETY: the slice is valid for `byte_len` bytes, and `T: Zeroable`
    // makes the zeroed elements valid with no drop glue to skip.
    unsafe {
        core::ptr::write_bytes(slice.as_mut_ptr() as *mut u8, 0, byte_len);
        core::ptr::read_volatile(slice.as_ptr() as *const u8);
    }
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}
