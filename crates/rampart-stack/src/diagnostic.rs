// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Diagnostic records and the sinks that receive them.
//!
//! A [`DiagnosticRecord`] is a full snapshot of one instance: identity,
//! provenance, every canary, stored and recomputed hashes, and every slot.
//! Capturing never verifies anything, so it works on damaged instances.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use rampart_canary::{Canary, CanaryGuarded, CanaryPosition};
use serde::Serialize;

use crate::constants::{Elem, POISON};
use crate::error::Fault;
use crate::instance::StackInstance;
use crate::types::{CallSite, StackHandle};

/// Classification of a dumped slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// Below `size`.
    Live,
    /// At or above `size` and holding poison.
    Poison,
    /// At or above `size` but not holding poison.
    Stray,
}

/// One slot of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotDump {
    /// Slot index.
    pub index: usize,
    /// Raw value.
    pub value: Elem,
    /// Classification.
    pub state: SlotState,
}

/// One canary position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanaryDump {
    /// Position.
    pub position: CanaryPosition,
    /// Value read, `None` if the position is missing.
    pub value: Option<Canary>,
    /// Whether the value equals the sentinel.
    pub intact: bool,
}

/// A stored hash next to its recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HashPair {
    /// Value held by the instance.
    pub stored: u64,
    /// Value recomputed at capture time.
    pub computed: u64,
}

impl HashPair {
    /// True if both values agree.
    #[inline]
    pub fn matches(&self) -> bool {
        self.stored == self.computed
    }
}

/// Snapshot of an instance at the moment of a dump or a fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticRecord {
    /// Handle the instance was resolved under.
    pub handle: StackHandle,
    /// Handle stored in the instance.
    pub stored_handle: StackHandle,
    /// Where the instance was constructed.
    pub origin: CallSite,
    /// Where the operation that produced this record was called.
    pub call_site: CallSite,
    /// Detected fault, `None` for an explicit dump.
    pub fault: Option<Fault>,
    /// Stored size.
    pub size: usize,
    /// Stored capacity.
    pub capacity: usize,
    /// Slots actually held by the buffer, `None` if it is missing.
    pub buffer_slots: Option<usize>,
    /// All four canary positions.
    pub canaries: Vec<CanaryDump>,
    /// Structural hash.
    pub struct_hash: HashPair,
    /// Content hash.
    pub content_hash: HashPair,
    /// Every slot of the buffer.
    pub slots: Vec<SlotDump>,
}

impl DiagnosticRecord {
    /// Captures `instance` as seen under `handle`.
    pub fn capture(
        instance: &StackInstance,
        handle: StackHandle,
        call_site: CallSite,
        fault: Option<Fault>,
    ) -> Self {
        let canaries = CanaryPosition::ALL
            .iter()
            .map(|&position| {
                let value = instance.read_canary(position);
                CanaryDump {
                    position,
                    value,
                    intact: value.is_some_and(Canary::is_intact),
                }
            })
            .collect();

        let size = instance.size();
        let slots = instance
            .buffer()
            .map(|buffer| {
                (0..buffer.capacity())
                    .filter_map(|index| buffer.get(index).map(|value| (index, value)))
                    .map(|(index, value)| SlotDump {
                        index,
                        value,
                        state: if index < size {
                            SlotState::Live
                        } else if value == POISON {
                            SlotState::Poison
                        } else {
                            SlotState::Stray
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            handle,
            stored_handle: instance.handle(),
            origin: instance.origin(),
            call_site,
            fault,
            size,
            capacity: instance.capacity(),
            buffer_slots: instance.buffer().map(|b| b.capacity()),
            canaries,
            struct_hash: HashPair {
                stored: instance.stored_struct_hash(),
                computed: instance.computed_struct_hash(),
            },
            content_hash: HashPair {
                stored: instance.stored_content_hash(),
                computed: instance.computed_content_hash(),
            },
            slots,
        }
    }

    /// Live elements, bottom first.
    pub fn live_values(&self) -> Vec<Elem> {
        self.slots
            .iter()
            .filter(|slot| slot.state == SlotState::Live)
            .map(|slot| slot.value)
            .collect()
    }
}

/// Receiver of diagnostic records.
///
/// A failing sink never hides a fault: the supervisor flags `INVALID_SINK`
/// and carries on with escalation.
pub trait DiagnosticSink: Send + Sync {
    /// Records one snapshot.
    fn record(&self, record: &DiagnosticRecord) -> io::Result<()>;

    /// Pushes buffered output to its destination. Called before an abort.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Emits each record as a `tracing` event.
///
/// Records carrying a fault are logged at error level, explicit dumps at info.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, record: &DiagnosticRecord) -> io::Result<()> {
        let live = record.live_values();

        match &record.fault {
            Some(fault) => tracing::error!(
                handle = %record.handle,
                stored_handle = %record.stored_handle,
                origin = %record.origin,
                call_site = %record.call_site,
                size = record.size,
                capacity = record.capacity,
                struct_hash_stored = record.struct_hash.stored,
                struct_hash_computed = record.struct_hash.computed,
                content_hash_stored = record.content_hash.stored,
                content_hash_computed = record.content_hash.computed,
                canaries = ?record.canaries,
                live = ?live,
                fault = %fault,
                "stack corruption detected"
            ),
            None => tracing::info!(
                handle = %record.handle,
                origin = %record.origin,
                call_site = %record.call_site,
                size = record.size,
                capacity = record.capacity,
                canaries = ?record.canaries,
                live = ?live,
                "stack dump"
            ),
        }

        Ok(())
    }
}

/// Writes each record as one line of JSON.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
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

impl JsonLinesSink<io::Stderr> {
    /// Sink writing to standard error.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> DiagnosticSink for JsonLinesSink<W> {
    fn record(&self, record: &DiagnosticRecord) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, record).map_err(io::Error::other)?;
        writer.write_all(b"\n")
    }

    fn flush(&self) -> io::Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record received so far.
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent record.
    pub fn last(&self) -> Option<DiagnosticRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Number of records received.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if nothing was received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, record: &DiagnosticRecord) -> io::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
