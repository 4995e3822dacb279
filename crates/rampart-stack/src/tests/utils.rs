// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use std::process::Output;
use std::sync::Arc;

use crate::allocation::MemoryAllocationLog;
use crate::config::{FaultPolicy, ProtectionConfig};
use crate::diagnostic::MemorySink;
use crate::stacks::Stacks;

pub struct Harness {
    pub stacks: Stacks,
    pub diagnostics: Arc<MemorySink>,
    pub allocations: Arc<MemoryAllocationLog>,
}

/// Registry that reports faults instead of aborting, with in-memory sinks.
pub fn reporting(config: ProtectionConfig) -> Harness {
    let diagnostics = Arc::new(MemorySink::new());
    let allocations = Arc::new(MemoryAllocationLog::new());
    let stacks = Stacks::builder()
        .config(config.with_fault_policy(FaultPolicy::Report))
        .diagnostic_sink(diagnostics.clone())
        .allocation_sink(allocations.clone())
        .build();

    Harness {
        stacks,
        diagnostics,
        allocations,
    }
}

pub fn reporting_full() -> Harness {
    reporting(ProtectionConfig::full())
}

pub fn run_test_as_subprocess(test_name: &str) -> Output {
    let exe = std::env::current_exe().expect("Failed to get current exe");
    std::process::Command::new(exe)
        .args([
            "--exact",
            test_name,
            "--ignored",
            "--test-threads=1",
            "--nocapture",
        ])
        .output()
        .expect("Failed to run subprocess")
}

/// True if the child actually ran a test.
pub fn ran_a_test(output: &Output) -> bool {
    !output.stdout.starts_with(b"\nrunning 0 tests")
}

#[test]
fn test_run_test_as_subprocess_reports_unknown_test() {
    let output = run_test_as_subprocess("uknown::test");
    assert!(!ran_a_test(&output), "subprocess should not have run a test");
}
