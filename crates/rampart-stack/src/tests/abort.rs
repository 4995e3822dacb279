// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

#![cfg(unix)]

use std::os::unix::process::ExitStatusExt;
use std::process::Output;
use std::sync::Arc;

use rampart_canary::CanaryPosition;
use serial_test::serial;

use super::utils::{ran_a_test, run_test_as_subprocess};
use crate::config::ProtectionConfig;
use crate::diagnostic::JsonLinesSink;
use crate::stacks::Stacks;

const SIGABRT: i32 = 6;

fn aborting_stacks() -> Stacks {
    Stacks::builder()
        .config(ProtectionConfig::full())
        .diagnostic_sink(Arc::new(JsonLinesSink::stderr()))
        .build()
}

fn assert_aborted_citing(output: &Output, cause: &str) {
    assert!(ran_a_test(output), "subprocess did not run");
    assert_eq!(
        output.status.signal(),
        Some(SIGABRT),
        "subprocess should have aborted, status: {:?}",
        output.status
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(&format!("\"cause\":\"{cause}\"")),
        "stderr should cite {cause}: {stderr}"
    );
}

fn flip_and_push(position: CanaryPosition, byte: usize) {
    let stacks = aborting_stacks();
    let handle = stacks.construct(8).expect("Failed to construct(..)");
    stacks.push(handle, 1).expect("Failed to push(..)");
    stacks
        .tamper(handle, |instance| instance.flip_canary_byte(position, byte))
        .expect("Failed to tamper(..)");

    let _ = stacks.push(handle, 2);
    unreachable!("corruption must abort");
}

#[test]
#[serial(subprocess)]
fn test_meta_left_flip_aborts() {
    let output = run_test_as_subprocess("tests::abort::subprocess_meta_left_flip");
    assert_aborted_citing(&output, "canary");
    assert!(String::from_utf8_lossy(&output.stderr).contains("\"position\":\"meta_left\""));
}

#[test]
#[serial(subprocess)]
fn test_data_right_flip_aborts() {
    let output = run_test_as_subprocess("tests::abort::subprocess_data_right_flip");
    assert_aborted_citing(&output, "canary");
    assert!(String::from_utf8_lossy(&output.stderr).contains("\"position\":\"data_right\""));
}

#[test]
#[serial(subprocess)]
fn test_content_tamper_aborts() {
    let output = run_test_as_subprocess("tests::abort::subprocess_content_tamper");
    assert_aborted_citing(&output, "content_hash");
}

#[test]
#[serial(subprocess)]
fn test_raw_slot_swap_aborts() {
    let output = run_test_as_subprocess("tests::abort::subprocess_raw_slot_swap");
    assert_aborted_citing(&output, "handle_mismatch");
}

#[test]
#[serial(subprocess)]
fn test_intact_run_exits_cleanly() {
    let output = run_test_as_subprocess("tests::abort::subprocess_intact_run");
    assert!(ran_a_test(&output), "subprocess did not run");
    assert_eq!(output.status.code(), Some(0), "subprocess test failed");
}

// ==============================
// ===== Subprocess tests =======
// ==============================

#[test]
#[ignore]
fn subprocess_meta_left_flip() {
    flip_and_push(CanaryPosition::MetaLeft, 0);
}

#[test]
#[ignore]
fn subprocess_data_right_flip() {
    flip_and_push(CanaryPosition::DataRight, 7);
}

#[test]
#[ignore]
fn subprocess_content_tamper() {
    let stacks = aborting_stacks();
    let handle = stacks.construct(8).expect("Failed to construct(..)");
    stacks.push(handle, 1).expect("Failed to push(..)");
    stacks
        .tamper(handle, |instance| instance.write_slot_unchecked(0, 9))
        .expect("Failed to tamper(..)");

    let _ = stacks.pop(handle);
    unreachable!("corruption must abort");
}

#[test]
#[ignore]
fn subprocess_raw_slot_swap() {
    let stacks = aborting_stacks();
    let a = stacks.construct(8).expect("Failed to construct(..)");
    let b = stacks.construct(8).expect("Failed to construct(..)");
    stacks
        .tamper_swap_slots(a, b)
        .expect("Failed to tamper_swap_slots(..)");

    let _ = stacks.push(a, 1);
    unreachable!("corruption must abort");
}

#[test]
#[ignore]
fn subprocess_intact_run() {
    let stacks = aborting_stacks();
    let handle = stacks.construct(8).expect("Failed to construct(..)");
    for value in 0..64 {
        stacks.push(handle, value).expect("Failed to push(..)");
    }
    for expected in (0..64).rev() {
        assert_eq!(stacks.pop(handle), Ok(expected));
    }
    stacks.destroy(handle).expect("Failed to destroy(..)");
}
