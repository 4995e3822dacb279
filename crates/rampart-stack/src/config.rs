// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Protection configuration.
//!
//! Each guard component is switched independently and the selection is
//! fixed when a [`crate::Stacks`] is built:
//!
//! - `canary`: stamp and verify the four boundary canaries.
//! - `hash`: maintain and verify the structural and content hashes.
//! - `thread`: hold one lock across pre-check, mutation and post-check.
//!
//! With all three off the container degrades to an unchecked growable stack
//! (structural validity checks still run).
//!
//! [`ProtectionConfig::from_env`] reads:
//! - `RAMPART_PROTECTION`: comma list of `canary`, `hash`, `thread`, or one
//!   of `full`/`all`/`default` and `off`/`none`/`disabled`.
//! - `RAMPART_FAULT`: `abort` (default) or `report`.

use std::sync::OnceLock;

use serde::Serialize;

/// Environment variable selecting the active guards.
pub const PROTECTION_ENV: &str = "RAMPART_PROTECTION";

/// Environment variable selecting the fault policy.
pub const FAULT_ENV: &str = "RAMPART_FAULT";

/// What happens once corruption has been detected and dumped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Flush every diagnostic sink and abort the process.
    #[default]
    Abort,
    /// Return `StackError::Corrupted` to the caller. The stack is not repaired.
    Report,
}

impl FaultPolicy {
    /// Parse from string (case-insensitive). Unknown values select `Abort`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "report" | "return" | "intercept" => Self::Report,
            _ => Self::Abort,
        }
    }
}

/// Which guard components are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProtectionConfig {
    /// Boundary canaries.
    pub canary: bool,
    /// Structural and content hashes.
    pub hash: bool,
    /// One critical section per operation.
    pub thread: bool,
    /// Escalation on corruption.
    pub fault_policy: FaultPolicy,
    /// Whether `Stacks::swap_handles` is permitted.
    pub allow_handle_swap: bool,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self::full()
    }
}

impl ProtectionConfig {
    /// All guards on, abort on corruption, swapping forbidden.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            canary: true,
            hash: true,
            thread: true,
            fault_policy: FaultPolicy::Abort,
            allow_handle_swap: false,
        }
    }

    /// All guards off.
    #[must_use]
    pub const fn unchecked() -> Self {
        Self {
            canary: false,
            hash: false,
            thread: false,
            fault_policy: FaultPolicy::Abort,
            allow_handle_swap: false,
        }
    }

    /// Returns a copy with the given fault policy.
    #[must_use]
    pub const fn with_fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    /// Returns a copy with handle swapping allowed or forbidden.
    #[must_use]
    pub const fn with_handle_swap(mut self, allow: bool) -> Self {
        self.allow_handle_swap = allow;
        self
    }

    /// Parses a guard list (case-insensitive, comma or whitespace separated).
    ///
    /// Unknown tokens are ignored. An empty list enables nothing. The fault
    /// policy and swap permission keep their defaults.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let mut config = Self::unchecked();

        for token in s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            match token.to_ascii_lowercase().as_str() {
                "full" | "all" | "default" => {
                    config.canary = true;
                    config.hash = true;
                    config.thread = true;
                }
                "off" | "none" | "disabled" => {
                    config.canary = false;
                    config.hash = false;
                    config.thread = false;
                }
                "canary" => config.canary = true,
                "hash" => config.hash = true,
                "thread" | "mutex" => config.thread = true,
                _ => {}
            }
        }

        config
    }

    /// True if any tamper-detection guard is active.
    #[must_use]
    pub const fn detects_damage(&self) -> bool {
        self.canary || self.hash
    }

    /// Configuration from the environment (read on first call, cached thereafter).
    ///
    /// Missing variables select [`ProtectionConfig::full`] with `Abort`.
    #[must_use]
    pub fn from_env() -> Self {
        static GLOBAL_CONFIG: OnceLock<ProtectionConfig> = OnceLock::new();

        *GLOBAL_CONFIG.get_or_init(|| {
            let config = std::env::var(PROTECTION_ENV)
                .map(|v| Self::parse(&v))
                .unwrap_or_default();
            let policy = std::env::var(FAULT_ENV)
                .map(|v| FaultPolicy::from_str_loose(&v))
                .unwrap_or_default();

            config.with_fault_policy(policy)
        })
    }
}
