// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Allocation events and the sinks that receive them.
//!
//! Every buffer allocation, reallocation and release performed by a
//! [`crate::Stacks`] is reported as one [`AllocationEvent`].
//! [`JsonLinesAllocationSink`] keeps a durable memory log next to the
//! diagnostic output.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::types::StackHandle;

/// One allocation-level change of a stack's backing storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AllocationEvent {
    /// Buffer allocated at construction.
    Allocate {
        /// Owning stack.
        handle: StackHandle,
        /// Slots allocated.
        slots: usize,
        /// Bytes allocated, canaries included.
        bytes: usize,
    },
    /// Buffer moved to a new allocation.
    Reallocate {
        /// Owning stack.
        handle: StackHandle,
        /// Slots before.
        from_slots: usize,
        /// Slots after.
        to_slots: usize,
        /// Bytes of the new allocation.
        bytes: usize,
    },
    /// Buffer released at destruction.
    Release {
        /// Owning stack.
        handle: StackHandle,
        /// Bytes released.
        bytes: usize,
    },
}

impl AllocationEvent {
    /// Stack the event belongs to.
    pub fn handle(&self) -> StackHandle {
        match self {
            AllocationEvent::Allocate { handle, .. }
            | AllocationEvent::Reallocate { handle, .. }
            | AllocationEvent::Release { handle, .. } => *handle,
        }
    }
}

/// Receiver of allocation events.
///
/// A failing sink flags `INVALID_SINK`; the operation that produced the
/// event still completes.
pub trait AllocationSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: &AllocationEvent) -> io::Result<()>;

    /// Pushes buffered output to its destination.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Logs every event at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAllocationSink;

impl AllocationSink for TracingAllocationSink {
    fn record(&self, event: &AllocationEvent) -> io::Result<()> {
        match *event {
            AllocationEvent::Allocate {
                handle,
                slots,
                bytes,
            } => tracing::debug!(handle = %handle, slots, bytes, "buffer allocated"),
            AllocationEvent::Reallocate {
                handle,
                from_slots,
                to_slots,
                bytes,
            } => tracing::debug!(
                handle = %handle,
                from_slots,
                to_slots,
                bytes,
                "buffer reallocated"
            ),
            AllocationEvent::Release { handle, bytes } => {
                tracing::debug!(handle = %handle, bytes, "buffer released")
            }
        }

        Ok(())
    }
}

/// Writes each event as one line of JSON.
///
/// ```
/// use rampart_stack::{JsonLinesAllocationSink, ProtectionConfig, Stacks};
/// use std::sync::Arc;
///
/// let log = Arc::new(JsonLinesAllocationSink::new(Vec::new()));
/// let stacks = Stacks::builder()
///     .config(ProtectionConfig::full())
///     .allocation_sink(log.clone())
///     .build();
///
/// let handle = stacks.construct(8).unwrap();
/// stacks.destroy(handle).unwrap();
/// drop(stacks);
///
/// let log = Arc::try_unwrap(log).ok().unwrap().into_inner();
/// assert_eq!(String::from_utf8(log).unwrap().lines().count(), 2);
/// ```
pub struct JsonLinesAllocationSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesAllocationSink<W> {
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Unwraps the writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> AllocationSink for JsonLinesAllocationSink<W> {
    fn record(&self, event: &AllocationEvent) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, event).map_err(io::Error::other)?;
        writer.write_all(b"\n")
    }

    fn flush(&self) -> io::Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryAllocationLog {
    events: Mutex<Vec<AllocationEvent>>,
}

impl MemoryAllocationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far.
    pub fn events(&self) -> Vec<AllocationEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events of one stack.
    pub fn events_for(&self, handle: StackHandle) -> Vec<AllocationEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.handle() == handle)
            .collect()
    }
}

impl AllocationSink for MemoryAllocationLog {
    fn record(&self, event: &AllocationEvent) -> io::Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*event);

        Ok(())
    }
}
