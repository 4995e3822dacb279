// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Protected dynamic-array stacks.
//!
//! Rampart is a stack container built to catch memory corruption as early as
//! possible. Every stack carries four canaries, a structural hash and a
//! content hash, all verified before and after each mutation.
//!
//! # Features
//!
//! - **Canaries** around both the metadata block and the element buffer
//! - **Rolling checksums** over the stable metadata fields and every slot
//! - **Poisoned tail**: unused slots always hold a fixed sentinel
//! - **Fail-fast**: corruption is dumped and the process aborts (or the fault
//!   is returned, if configured)
//! - **Bounded registry** of handle-addressed stacks with its own lock
//!
//! # Quick Start
//!
//! ```rust
//! use rampart::stack::{ProtectionConfig, Stacks};
//!
//! fn main() -> Result<(), rampart::stack::StackError> {
//!     let stacks = Stacks::new(ProtectionConfig::full());
//!     let handle = stacks.construct(8)?;
//!
//!     stacks.push(handle, 10)?;
//!     stacks.push(handle, 20)?;
//!     assert_eq!(stacks.pop(handle)?, 20);
//!
//!     let record = stacks.dump(handle)?;
//!     assert_eq!(record.live_values(), vec![10]);
//!
//!     stacks.destroy(handle)?;
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! [`stack::ProtectionConfig::from_env`] reads `RAMPART_PROTECTION`
//! (`canary`, `hash`, `thread`, `full`, `off`) and `RAMPART_FAULT`
//! (`abort`, `report`).
//!
//! # Crates
//!
//! | Module | Crate |
//! |--------|-------|
//! | [`canary`] | `rampart-canary` |
//! | [`checksum`] | `rampart-checksum` |
//! | [`stack`] | `rampart-stack` |
//! | [`util`] | `rampart-util` |

#![warn(missing_docs)]


/// Boundary canaries.
pub mod canary {
    pub use rampart_canary::*;
}

/// Rolling checksums.
pub mod checksum {
    pub use rampart_checksum::*;
}

/// Protected stacks, registry, supervisor and sinks.
pub mod stack {
    pub use rampart_stack::*;
}

/// Sentinel fills and zeroization.
pub mod util {
    pub use rampart_util::*;
}

pub use rampart_stack::{
    DiagnosticRecord, Elem, ErrorFlags, Fault, FaultPolicy, ProtectionConfig, StackError,
    StackHandle, Stacks,
};
