// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Canary- and checksum-protected growable stacks.
//!
//! Stacks live in a bounded registry ([`Stacks`]) and are addressed by
//! [`StackHandle`]. Every instance is bracketed by four canaries (two around
//! its metadata, two around its element buffer) and carries a structural
//! hash and a content hash. Each mutation is verified before and after it
//! runs; corruption is dumped to the diagnostic sinks and, by default, aborts
//! the process.
//!
//! # Core Guarantees
//!
//! - **LIFO**: values come back in reverse push order.
//! - **Poisoned tail**: every slot in `[size, capacity)` holds [`POISON`].
//! - **Fail-fast**: corruption is never repaired and never ignored.
//! - **Zeroized storage**: old allocations are wiped on reallocation and on destroy.
//!
//! # Example
//!
//! ```rust
//! use rampart_stack::{ProtectionConfig, StackError, Stacks};
//!
//! fn example() -> Result<(), StackError> {
//!     let stacks = Stacks::new(ProtectionConfig::full());
//!     let handle = stacks.construct(8)?;
//!
//!     for value in 1..=20 {
//!         stacks.push(handle, value)?;
//!     }
//!     assert_eq!(stacks.capacity(handle)?, 32);
//!
//!     for expected in (1..=20).rev() {
//!         assert_eq!(stacks.pop(handle)?, expected);
//!     }
//!     assert_eq!(stacks.capacity(handle)?, 8);
//!     assert!(matches!(stacks.pop(handle), Err(StackError::Underflow)));
//!
//!     stacks.destroy(handle)?;
//!     Ok(())
//! }
//! # example().unwrap();
//! ```
//!
//! # Intercepting faults
//!
//! With [`FaultPolicy::Report`] corruption is returned as
//! [`StackError::Corrupted`] instead of aborting:
//!
//! ```rust
//! use std::sync::Arc;
//! use rampart_stack::{FaultPolicy, MemorySink, ProtectionConfig, Stacks};
//!
//! let sink = Arc::new(MemorySink::new());
//! let stacks = Stacks::builder()
//!     .config(ProtectionConfig::full().with_fault_policy(FaultPolicy::Report))
//!     .diagnostic_sink(sink.clone())
//!     .build();
//!
//! let handle = stacks.construct(8).unwrap();
//! let record = stacks.dump(handle).unwrap();
//! assert_eq!(record.size, 0);
//! assert_eq!(sink.len(), 1);
//! ```
//!
//! # Test Utilities
//!
//! The `test-utils` feature exposes corruption injection ([`Stacks::tamper`],
//! [`Stacks::tamper_swap_slots`]) and allocation failure injection
//! ([`BufferBehaviour`]).

#![warn(missing_docs)]

mod allocation;
mod buffer;
mod config;
mod constants;
mod diagnostic;
mod error;
mod flags;
mod instance;
mod registry;
mod stacks;
mod supervisor;
mod types;

#[cfg(test)]
mod tests;

pub use allocation::{
    AllocationEvent, AllocationSink, JsonLinesAllocationSink, MemoryAllocationLog,
    TracingAllocationSink,
};
pub use buffer::{DataSide, GuardedBuffer};
pub use config::{FAULT_ENV, FaultPolicy, PROTECTION_ENV, ProtectionConfig};
pub use constants::{Elem, MAX_CAPACITY, MAX_STACK_AMOUNT, MIN_CAPACITY, POISON, SLOT_SIZE};
pub use diagnostic::{
    CanaryDump, DiagnosticRecord, DiagnosticSink, HashPair, JsonLinesSink, MemorySink, SlotDump,
    SlotState, TracingSink,
};
pub use error::{Fault, StackError};
pub use flags::{ErrorFlags, FlagRegister};
pub use instance::{Popped, Reallocation, StackInstance};
pub use registry::{Registry, SharedInstance};
pub use stacks::{Stacks, StacksBuilder};
pub use supervisor::{Supervisor, check_damage, check_validity};
pub use types::{CallSite, StackHandle};

pub use rampart_canary::{CANARY, Canary, CanaryPosition};

#[cfg(any(test, feature = "test-utils"))]
pub use buffer::BufferBehaviour;
