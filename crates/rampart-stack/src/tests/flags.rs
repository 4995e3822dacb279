// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use crate::flags::{ErrorFlags, FlagRegister};

// =============================================================================
// ErrorFlags
// =============================================================================

#[test]
fn test_bit_values_match_legacy_codes() {
    assert_eq!(ErrorFlags::UNDERFLOW.bits(), 1);
    assert_eq!(ErrorFlags::OVERFLOW.bits(), 2);
    assert_eq!(ErrorFlags::INVALID_STACK_POINTER.bits(), 4);
    assert_eq!(ErrorFlags::INVALID_DATA_POINTER.bits(), 8);
    assert_eq!(ErrorFlags::INVALID_SIZE.bits(), 16);
    assert_eq!(ErrorFlags::REQUESTED_TOO_LITTLE.bits(), 32);
    assert_eq!(ErrorFlags::REQUESTED_TOO_MUCH.bits(), 64);
    assert_eq!(ErrorFlags::INVALID_SINK.bits(), 128);
    assert_eq!(ErrorFlags::DAMAGED_STACK.bits(), 256);
    assert_eq!(ErrorFlags::INVALID_HASH.bits(), 512);
    assert_eq!(ErrorFlags::INVALID_DATA_CANARY.bits(), 1024);
    assert_eq!(ErrorFlags::INVALID_STRUCT_CANARY.bits(), 2048);
    assert_eq!(ErrorFlags::INVALID_STACK_ID.bits(), 4096);
    assert_eq!(ErrorFlags::ALLOCATION_FAILED.bits(), 8192);
    assert_eq!(ErrorFlags::REGISTRY_FULL.bits(), 16384);
}

#[test]
fn test_contains_and_bitor() {
    let mut flags = ErrorFlags::NONE;
    assert!(flags.is_empty());

    flags |= ErrorFlags::UNDERFLOW;
    let flags = flags | ErrorFlags::INVALID_HASH;

    assert!(flags.contains(ErrorFlags::UNDERFLOW));
    assert!(flags.contains(ErrorFlags::UNDERFLOW | ErrorFlags::INVALID_HASH));
    assert!(!flags.contains(ErrorFlags::OVERFLOW));
}

#[test]
fn test_names_in_bit_order() {
    let flags = ErrorFlags::INVALID_STACK_ID | ErrorFlags::UNDERFLOW | ErrorFlags::DAMAGED_STACK;

    assert_eq!(
        flags.names(),
        vec!["stack underflow", "damaged stack", "invalid stack id"]
    );
}

#[test]
fn test_display() {
    assert_eq!(ErrorFlags::NONE.to_string(), "no error");
    assert_eq!(
        (ErrorFlags::OVERFLOW | ErrorFlags::INVALID_SIZE).to_string(),
        "stack overflow, invalid size"
    );
}

#[test]
fn test_unknown_bits_are_kept_but_unnamed() {
    let flags = ErrorFlags::from_bits(1 << 40);

    assert!(!flags.is_empty());
    assert!(flags.names().is_empty());
}

// =============================================================================
// FlagRegister
// =============================================================================

#[test]
fn test_register_accumulates_until_taken() {
    let register = FlagRegister::new();

    register.raise(ErrorFlags::UNDERFLOW);
    register.raise(ErrorFlags::UNDERFLOW);
    register.raise(ErrorFlags::REGISTRY_FULL);

    assert_eq!(
        register.get(),
        ErrorFlags::UNDERFLOW | ErrorFlags::REGISTRY_FULL
    );
    assert_eq!(
        register.take(),
        ErrorFlags::UNDERFLOW | ErrorFlags::REGISTRY_FULL
    );
    assert!(register.get().is_empty());
}
