// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use rampart_canary::{CANARY, Canary, CanaryGuarded, CanaryPosition};

use crate::buffer::{BufferBehaviour, GuardedBuffer};
use crate::config::ProtectionConfig;
use crate::constants::{MAX_CAPACITY, MIN_CAPACITY, POISON};
use crate::error::{Fault, StackError};
use crate::instance::{Reallocation, StackInstance};
use crate::types::{CallSite, StackHandle};

const HANDLE: StackHandle = StackHandle::from_raw(3);

fn instance_with(capacity: usize, config: &ProtectionConfig) -> StackInstance {
    let buffer = GuardedBuffer::allocate(capacity).expect("Failed to allocate(..)");
    StackInstance::new(HANDLE, buffer, CallSite::caller(), config)
}

fn full_instance(capacity: usize) -> StackInstance {
    instance_with(capacity, &ProtectionConfig::full())
}

fn assert_consistent(instance: &StackInstance) {
    assert!(instance.size() <= instance.capacity());
    assert!(instance.check().is_ok());
    assert_eq!(instance.stored_struct_hash(), instance.computed_struct_hash());
    assert_eq!(instance.stored_content_hash(), instance.computed_content_hash());
}

// =============================================================================
// new()
// =============================================================================

#[test]
fn test_new_full_stamps_everything() {
    let instance = full_instance(8);

    assert_eq!(instance.handle(), HANDLE);
    assert_eq!(instance.size(), 0);
    assert_eq!(instance.capacity(), 8);
    assert_eq!(instance.origin().file, file!());
    for position in CanaryPosition::ALL {
        assert_eq!(instance.read_canary(position), Some(CANARY));
    }
    assert_ne!(instance.stored_struct_hash(), 0);
    assert_consistent(&instance);
}

#[test]
fn test_new_unchecked_writes_zero_guards() {
    let instance = instance_with(8, &ProtectionConfig::unchecked());

    for position in CanaryPosition::ALL {
        assert_eq!(instance.read_canary(position), Some(Canary::ZERO));
    }
    assert_eq!(instance.stored_struct_hash(), 0);
    assert_eq!(instance.stored_content_hash(), 0);
}

// =============================================================================
// computed_struct_hash()
// =============================================================================

#[test]
fn test_struct_hash_ignores_stored_struct_hash() {
    let mut instance = full_instance(8);
    let computed = instance.computed_struct_hash();

    instance.set_struct_hash_unchecked(0x1234);

    assert_eq!(instance.computed_struct_hash(), computed);
}

#[test]
fn test_struct_hash_covers_stable_fields() {
    let mut instance = full_instance(8);
    let baseline = instance.computed_struct_hash();

    instance.set_size_unchecked(1);
    assert_ne!(instance.computed_struct_hash(), baseline);
    instance.set_size_unchecked(0);

    instance.set_handle_unchecked(StackHandle::from_raw(4));
    assert_ne!(instance.computed_struct_hash(), baseline);
    instance.set_handle_unchecked(HANDLE);

    instance.set_content_hash_unchecked(instance.stored_content_hash() ^ 1);
    assert_ne!(instance.computed_struct_hash(), baseline);
    instance.set_content_hash_unchecked(instance.stored_content_hash() ^ 1);

    instance.flip_canary_byte(CanaryPosition::MetaRight, 0);
    assert_ne!(instance.computed_struct_hash(), baseline);
    instance.flip_canary_byte(CanaryPosition::MetaRight, 0);

    assert_eq!(instance.computed_struct_hash(), baseline);
}

#[test]
fn test_content_hash_covers_poisoned_tail() {
    let mut instance = full_instance(8);
    let baseline = instance.computed_content_hash();

    instance.write_slot_unchecked(7, 0);

    assert_ne!(instance.computed_content_hash(), baseline);
}

// =============================================================================
// push()
// =============================================================================

#[test]
fn test_push_within_capacity() {
    let config = ProtectionConfig::full();
    let mut instance = full_instance(8);

    let reallocation = instance.push(5, &config).expect("Failed to push(..)");

    assert_eq!(reallocation, None);
    assert_eq!(instance.size(), 1);
    assert_eq!(instance.buffer().and_then(|b| b.get(0)), Some(5));
    assert_consistent(&instance);
}

#[test]
fn test_push_doubles_capacity_once() {
    let config = ProtectionConfig::full();
    let mut instance = full_instance(MIN_CAPACITY);
    let mut reallocations = Vec::new();

    for value in 0..=(MIN_CAPACITY as i32) {
        if let Some(r) = instance.push(value, &config).expect("Failed to push(..)") {
            reallocations.push(r);
        }
    }

    assert_eq!(
        reallocations,
        vec![Reallocation {
            from: MIN_CAPACITY,
            to: 2 * MIN_CAPACITY
        }]
    );
    assert_eq!(instance.capacity(), 2 * MIN_CAPACITY);
    assert_consistent(&instance);
}

#[test]
fn test_push_at_max_capacity_overflows() {
    let config = ProtectionConfig::unchecked();
    let mut instance = instance_with(MIN_CAPACITY, &config);
    instance.set_capacity_unchecked(MAX_CAPACITY);
    instance.set_size_unchecked(MAX_CAPACITY);

    let result = instance.push(1, &config);

    assert_eq!(
        result,
        Err(StackError::Overflow {
            capacity: MAX_CAPACITY
        })
    );
}

#[test]
fn test_push_grow_failure_leaves_state() {
    let config = ProtectionConfig::full();
    let mut instance = full_instance(8);
    for value in 0..8 {
        instance.push(value, &config).expect("Failed to push(..)");
    }
    instance
        .buffer_mut_unchecked()
        .expect("Failed to get buffer")
        .change_behaviour(BufferBehaviour::FailAtGrow);
    let struct_hash = instance.stored_struct_hash();

    let result = instance.push(8, &config);

    assert!(matches!(result, Err(StackError::Allocation { .. })));
    assert_eq!(instance.size(), 8);
    assert_eq!(instance.capacity(), 8);
    assert_eq!(instance.stored_struct_hash(), struct_hash);
    assert_consistent(&instance);
}

#[test]
fn test_push_past_buffer_end_reports_inconsistent_capacity() {
    let config = ProtectionConfig::full();
    let mut instance = full_instance(8);
    for value in 0..8 {
        instance.push(value, &config).expect("Failed to push(..)");
    }
    instance.set_capacity_unchecked(16);

    let result = instance.push(8, &config);

    assert_eq!(
        result,
        Err(StackError::Corrupted(Fault::CapacityInconsistent {
            capacity: 16,
            slots: 8
        }))
    );
    assert_eq!(instance.size(), 8);
    assert_eq!(
        instance.buffer().expect("Failed to get buffer").capacity(),
        8
    );
}

// =============================================================================
// pop()
// =============================================================================

#[test]
fn test_pop_empty_underflows() {
    let mut instance = full_instance(8);

    assert_eq!(
        instance.pop(&ProtectionConfig::full()),
        Err(StackError::Underflow)
    );
}

#[test]
fn test_pop_poisons_slot() {
    let config = ProtectionConfig::full();
    let mut instance = full_instance(8);
    instance.push(77, &config).expect("Failed to push(..)");

    let popped = instance.pop(&config).expect("Failed to pop()");

    assert_eq!(popped.value, 77);
    assert_eq!(popped.reallocation, None);
    assert_eq!(instance.size(), 0);
    assert_eq!(instance.buffer().and_then(|b| b.get(0)), Some(POISON));
    assert_consistent(&instance);
}

#[test]
fn test_pop_shrinks_at_quarter() {
    let config = ProtectionConfig::full();
    let mut instance = full_instance(32);
    for value in 0..9 {
        instance.push(value, &config).expect("Failed to push(..)");
    }

    let popped = instance.pop(&config).expect("Failed to pop()");

    assert_eq!(popped.value, 8);
    assert_eq!(popped.reallocation, Some(Reallocation { from: 32, to: 16 }));
    assert_eq!(instance.capacity(), 16);
    assert!((0..8).all(|i| instance.buffer().and_then(|b| b.get(i)) == Some(i as i32)));
    assert_consistent(&instance);
}

#[test]
fn test_pop_never_shrinks_below_minimum() {
    let config = ProtectionConfig::full();
    let mut instance = full_instance(MIN_CAPACITY);
    instance.push(1, &config).expect("Failed to push(..)");

    let popped = instance.pop(&config).expect("Failed to pop()");

    assert_eq!(popped.reallocation, None);
    assert_eq!(instance.capacity(), MIN_CAPACITY);
}

#[test]
fn test_pop_shrink_failure_is_deferred() {
    let config = ProtectionConfig::full();
    let mut instance = full_instance(32);
    instance.push(1, &config).expect("Failed to push(..)");
    instance
        .buffer_mut_unchecked()
        .expect("Failed to get buffer")
        .change_behaviour(BufferBehaviour::FailAtShrink);

    let popped = instance.pop(&config).expect("Failed to pop()");

    assert_eq!(popped.value, 1);
    assert!(matches!(
        popped.shrink_failure,
        Some(StackError::Allocation { .. })
    ));
    assert_eq!(instance.capacity(), 32);
    assert_eq!(instance.size(), 0);
    assert_consistent(&instance);
}

// =============================================================================
// resize()
// =============================================================================

#[test]
fn test_resize_bounds() {
    let config = ProtectionConfig::full();
    let mut instance = full_instance(16);
    for value in 0..10 {
        instance.push(value, &config).expect("Failed to push(..)");
    }

    assert_eq!(
        instance.resize(MIN_CAPACITY - 1, &config),
        Err(StackError::RequestedTooLittle {
            requested: MIN_CAPACITY - 1,
            min: 10
        })
    );
    assert_eq!(
        instance.resize(9, &config),
        Err(StackError::RequestedTooLittle {
            requested: 9,
            min: 10
        })
    );
    assert_eq!(
        instance.resize(MAX_CAPACITY + 1, &config),
        Err(StackError::RequestedTooMuch {
            requested: MAX_CAPACITY + 1,
            max: MAX_CAPACITY
        })
    );
    assert_eq!(instance.capacity(), 16);
}

#[test]
fn test_resize_same_capacity_is_noop() {
    let config = ProtectionConfig::full();
    let mut instance = full_instance(16);
    let before = instance.buffer().map(GuardedBuffer::base_address);

    assert_eq!(instance.resize(16, &config), Ok(None));
    assert_eq!(instance.buffer().map(GuardedBuffer::base_address), before);
}

#[test]
fn test_resize_preserves_elements() {
    let config = ProtectionConfig::full();
    let mut instance = full_instance(8);
    for value in 0..5 {
        instance.push(value, &config).expect("Failed to push(..)");
    }

    let reallocation = instance.resize(100, &config).expect("Failed to resize(..)");

    assert_eq!(reallocation, Some(Reallocation { from: 8, to: 100 }));
    assert_eq!(instance.capacity(), 100);
    let buffer = instance.buffer().expect("Failed to get buffer");
    assert!((0..5).all(|i| buffer.get(i) == Some(i as i32)));
    assert!((5..100).all(|i| buffer.get(i) == Some(POISON)));
    assert_consistent(&instance);
}

// =============================================================================
// teardown()
// =============================================================================

#[test]
fn test_teardown_wipes_fields() {
    let config = ProtectionConfig::full();
    let mut instance = full_instance(8);
    instance.push(9, &config).expect("Failed to push(..)");

    let released = instance.teardown();

    assert_eq!(released, GuardedBuffer::byte_len(8));
    assert_eq!(instance.handle(), StackHandle::INVALID);
    assert_eq!(instance.size(), 0);
    assert_eq!(instance.capacity(), 0);
    assert!(instance.buffer().is_none());
    assert_eq!(instance.stored_struct_hash(), 0);
    assert_eq!(instance.stored_content_hash(), 0);
    assert_eq!(instance.read_canary(CanaryPosition::MetaLeft), Some(Canary::ZERO));
    assert_eq!(instance.read_canary(CanaryPosition::MetaRight), Some(Canary::ZERO));
    assert_eq!(instance.read_canary(CanaryPosition::DataLeft), None);
    assert_eq!(instance.origin(), CallSite::default());
}

// =============================================================================
// flip_canary_byte()
// =============================================================================

#[test]
fn test_flip_canary_byte_is_detected_everywhere() {
    for position in CanaryPosition::ALL {
        for byte in 0..8 {
            let mut instance = full_instance(8);

            instance.flip_canary_byte(position, byte);

            let violation = instance.check().expect_err("Expected a canary violation");
            assert_eq!(violation.position, position);
        }
    }
}
