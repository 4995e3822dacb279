// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Error types for rampart-canary.
use thiserror::Error;

use crate::{Canary, CanaryPosition};

/// A boundary position that does not hold the expected sentinel.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
#[error("canary violated at {position}: found {}", display_found(.found))]
pub struct CanaryViolation {
    /// Where the mismatch was observed.
    pub position: CanaryPosition,
    /// The value found, or `None` if the position was missing.
    pub found: Option<Canary>,
}

fn display_found(found: &Option<Canary>) -> DisplayFound {
    DisplayFound(*found)
}

struct DisplayFound(Option<Canary>);

impl core::fmt::Display for DisplayFound {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Some(canary) => write!(f, "{canary}"),
            None => f.write_str("<missing>"),
        }
    }
}
