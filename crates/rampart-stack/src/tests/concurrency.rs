// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use std::sync::Arc;
use std::thread;

use super::utils::reporting;
use crate::config::ProtectionConfig;
use crate::stacks::Stacks;

const NUM_THREADS: usize = 8;
const PUSHES_PER_THREAD: usize = 200;

fn hammer(stacks: Arc<Stacks>) {
    let handle = stacks.construct(8).expect("Failed to construct(..)");

    let workers: Vec<_> = (0..NUM_THREADS)
        .map(|t| {
            let stacks = Arc::clone(&stacks);
            thread::spawn(move || {
                for i in 0..PUSHES_PER_THREAD {
                    let value = (t * PUSHES_PER_THREAD + i) as i32;
                    stacks.push(handle, value).expect("Failed to push(..)");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("Failed to join worker");
    }

    assert_eq!(stacks.len(handle), Ok(NUM_THREADS * PUSHES_PER_THREAD));

    let mut popped: Vec<i32> = (0..NUM_THREADS * PUSHES_PER_THREAD)
        .map(|_| stacks.pop(handle).expect("Failed to pop(..)"))
        .collect();
    popped.sort_unstable();

    let expected: Vec<i32> = (0..(NUM_THREADS * PUSHES_PER_THREAD) as i32).collect();
    assert_eq!(popped, expected);
    assert!(stacks.error_flags().is_empty());
}

#[test]
fn test_concurrent_push_single_critical_section() {
    let h = reporting(ProtectionConfig::full());
    hammer(Arc::new(h.stacks));
    assert!(h.diagnostics.is_empty());
}

#[test]
fn test_concurrent_push_phased_locking() {
    let h = reporting(ProtectionConfig::parse("canary,hash"));
    hammer(Arc::new(h.stacks));
    assert!(h.diagnostics.is_empty());
}

#[test]
fn test_concurrent_independent_stacks() {
    let h = reporting(ProtectionConfig::full());
    let stacks = Arc::new(h.stacks);

    let workers: Vec<_> = (0..NUM_THREADS)
        .map(|t| {
            let stacks = Arc::clone(&stacks);
            thread::spawn(move || {
                let handle = stacks.construct(8).expect("Failed to construct(..)");
                for i in 0..PUSHES_PER_THREAD as i32 {
                    stacks.push(handle, i * t as i32).expect("Failed to push(..)");
                }
                for i in (0..PUSHES_PER_THREAD as i32).rev() {
                    assert_eq!(stacks.pop(handle), Ok(i * t as i32));
                }
                stacks.destroy(handle).expect("Failed to destroy(..)");
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("Failed to join worker");
    }

    assert_eq!(stacks.live_handles(), Ok(vec![]));
    assert!(stacks.error_flags().is_empty());
}

#[test]
fn test_stacks_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Stacks>();
}
