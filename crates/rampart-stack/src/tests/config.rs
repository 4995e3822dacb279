// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use crate::config::{FaultPolicy, ProtectionConfig};

// =============================================================================
// FaultPolicy::from_str_loose()
// =============================================================================

#[test]
fn test_fault_policy_from_str_loose() {
    assert_eq!(FaultPolicy::from_str_loose("report"), FaultPolicy::Report);
    assert_eq!(FaultPolicy::from_str_loose(" REPORT "), FaultPolicy::Report);
    assert_eq!(FaultPolicy::from_str_loose("intercept"), FaultPolicy::Report);
    assert_eq!(FaultPolicy::from_str_loose("abort"), FaultPolicy::Abort);
    assert_eq!(FaultPolicy::from_str_loose("whatever"), FaultPolicy::Abort);
    assert_eq!(FaultPolicy::from_str_loose(""), FaultPolicy::Abort);
}

// =============================================================================
// full(), unchecked(), default()
// =============================================================================

#[test]
fn test_presets() {
    let full = ProtectionConfig::full();
    assert!(full.canary && full.hash && full.thread);
    assert_eq!(full.fault_policy, FaultPolicy::Abort);
    assert!(!full.allow_handle_swap);
    assert_eq!(ProtectionConfig::default(), full);

    let unchecked = ProtectionConfig::unchecked();
    assert!(!unchecked.canary && !unchecked.hash && !unchecked.thread);
    assert!(!unchecked.detects_damage());
}

#[test]
fn test_builders() {
    let config = ProtectionConfig::unchecked()
        .with_fault_policy(FaultPolicy::Report)
        .with_handle_swap(true);

    assert_eq!(config.fault_policy, FaultPolicy::Report);
    assert!(config.allow_handle_swap);
}

// =============================================================================
// parse()
// =============================================================================

#[test]
fn test_parse_single_guards() {
    let canary = ProtectionConfig::parse("canary");
    assert!(canary.canary && !canary.hash && !canary.thread);

    let hash = ProtectionConfig::parse("HASH");
    assert!(!hash.canary && hash.hash && !hash.thread);

    let mutex = ProtectionConfig::parse("mutex");
    assert!(mutex.thread && !mutex.detects_damage());
}

#[test]
fn test_parse_lists() {
    let config = ProtectionConfig::parse("canary, hash thread");
    assert_eq!(config, ProtectionConfig::full());

    let config = ProtectionConfig::parse("full,off,hash");
    assert!(!config.canary && config.hash && !config.thread);
}

#[test]
fn test_parse_aliases() {
    for token in ["full", "all", "default"] {
        assert_eq!(ProtectionConfig::parse(token), ProtectionConfig::full());
    }
    for token in ["off", "none", "disabled"] {
        assert_eq!(ProtectionConfig::parse(token), ProtectionConfig::unchecked());
    }
}

#[test]
fn test_parse_ignores_unknown_and_empty() {
    assert_eq!(ProtectionConfig::parse(""), ProtectionConfig::unchecked());
    assert_eq!(ProtectionConfig::parse("bogus,,"), ProtectionConfig::unchecked());

    let config = ProtectionConfig::parse("bogus,canary");
    assert!(config.canary && !config.hash);
}
