// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Public handle-based API.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[cfg(any(test, feature = "test-utils"))]
use crate::buffer::BufferBehaviour;

use crate::allocation::{AllocationEvent, AllocationSink, TracingAllocationSink};
use crate::buffer::GuardedBuffer;
use crate::config::ProtectionConfig;
use crate::constants::{Elem, MAX_CAPACITY, MIN_CAPACITY};
use crate::diagnostic::{DiagnosticRecord, DiagnosticSink, TracingSink};
use crate::error::StackError;
use crate::flags::ErrorFlags;
use crate::instance::{Reallocation, StackInstance};
use crate::registry::{Registry, SharedInstance};
use crate::supervisor::Supervisor;
use crate::types::{CallSite, StackHandle};

/// Builder for [`Stacks`].
pub struct StacksBuilder {
    config: ProtectionConfig,
    diagnostics: Vec<Arc<dyn DiagnosticSink>>,
    allocations: Option<Arc<dyn AllocationSink>>,
}

impl StacksBuilder {
    /// Sets the protection configuration.
    #[must_use]
    pub fn config(mut self, config: ProtectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a diagnostic sink. Without any, records go to [`TracingSink`].
    #[must_use]
    pub fn diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics.push(sink);
        self
    }

    /// Sets the allocation sink. Defaults to [`TracingAllocationSink`].
    #[must_use]
    pub fn allocation_sink(mut self, sink: Arc<dyn AllocationSink>) -> Self {
        self.allocations = Some(sink);
        self
    }

    /// Builds the registry.
    pub fn build(self) -> Stacks {
        let diagnostics = if self.diagnostics.is_empty() {
            vec![Arc::new(TracingSink) as Arc<dyn DiagnosticSink>]
        } else {
            self.diagnostics
        };
        let allocations = self
            .allocations
            .unwrap_or_else(|| Arc::new(TracingAllocationSink));

        Stacks {
            registry: Registry::new(),
            supervisor: Supervisor::new(self.config, diagnostics),
            allocations,
            #[cfg(any(test, feature = "test-utils"))]
            behaviour: Mutex::new(BufferBehaviour::default()),
        }
    }
}

/// A registry of protected stacks addressed by [`StackHandle`].
///
/// Every operation resolves the handle, verifies the instance, performs the
/// mutation, re-stamps the guards and verifies again. Corruption found by
/// either check is dumped and escalated per [`crate::FaultPolicy`].
///
/// `Stacks` is `Send + Sync`; share it by reference or `Arc`.
pub struct Stacks {
    registry: Registry,
    supervisor: Supervisor,
    allocations: Arc<dyn AllocationSink>,
    #[cfg(any(test, feature = "test-utils"))]
    behaviour: Mutex<BufferBehaviour>,
}

impl Default for Stacks {
    fn default() -> Self {
        Self::new(ProtectionConfig::default())
    }
}

impl Stacks {
    /// Registry with `config` and the default sinks.
    pub fn new(config: ProtectionConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Registry configured from `RAMPART_PROTECTION` and `RAMPART_FAULT`.
    pub fn from_env() -> Self {
        Self::new(ProtectionConfig::from_env())
    }

    /// Starts a builder with the full configuration and default sinks.
    pub fn builder() -> StacksBuilder {
        StacksBuilder {
            config: ProtectionConfig::default(),
            diagnostics: Vec::new(),
            allocations: None,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ProtectionConfig {
        self.supervisor.config()
    }

    /// Everything that went wrong since the last [`Stacks::clear_error_flags`].
    pub fn error_flags(&self) -> ErrorFlags {
        self.supervisor.flags().get()
    }

    /// Resets the error register and returns what it held.
    pub fn clear_error_flags(&self) -> ErrorFlags {
        self.supervisor.flags().take()
    }

    /// Handles of every live stack, ascending.
    pub fn live_handles(&self) -> Result<Vec<StackHandle>, StackError> {
        self.registry.live_handles()
    }

    fn fail(&self, error: StackError) -> StackError {
        self.supervisor.raise(error.flags());
        error
    }

    fn allocate_buffer(&self, capacity: usize) -> Result<GuardedBuffer, StackError> {
        #[cfg(any(test, feature = "test-utils"))]
        {
            let behaviour = *self.behaviour.lock().unwrap_or_else(PoisonError::into_inner);
            GuardedBuffer::allocate_with(capacity, behaviour)
        }

        #[cfg(not(any(test, feature = "test-utils")))]
        {
            GuardedBuffer::allocate(capacity)
        }
    }

    /// Locks `shared` and confirms it is still registered under `handle`.
    fn lock<'a>(
        &self,
        handle: StackHandle,
        shared: &'a SharedInstance,
    ) -> Result<MutexGuard<'a, StackInstance>, StackError> {
        let guard = shared.lock().map_err(|_| StackError::LockPoisoned)?;

        if !self.registry.is_current(handle, shared)? {
            return Err(StackError::InvalidHandle(handle));
        }

        Ok(guard)
    }

    fn apply<T>(
        &self,
        instance: &mut StackInstance,
        handle: StackHandle,
        call_site: CallSite,
        op: impl FnOnce(&mut StackInstance, &ProtectionConfig) -> Result<T, StackError>,
    ) -> Result<T, StackError> {
        match op(instance, self.supervisor.config()) {
            Err(StackError::Corrupted(fault)) => {
                Err(self.supervisor.escalate(instance, handle, fault, call_site))
            }
            other => other,
        }
    }

    /// Pre-check, mutation and post-check.
    ///
    /// With thread protection one guard spans all three phases; without it
    /// each phase takes the lock on its own.
    fn mutate<T>(
        &self,
        handle: StackHandle,
        call_site: CallSite,
        op: impl FnOnce(&mut StackInstance, &ProtectionConfig) -> Result<T, StackError>,
    ) -> Result<T, StackError> {
        let shared = self.registry.resolve(handle)?;

        if self.supervisor.config().thread {
            let mut guard = self.lock(handle, &shared)?;
            self.supervisor.verify(&guard, handle, call_site)?;
            let outcome = self.apply(&mut guard, handle, call_site, op);
            if !is_corrupted(&outcome) {
                self.supervisor.verify(&guard, handle, call_site)?;
            }

            return outcome;
        }

        {
            let guard = self.lock(handle, &shared)?;
            self.supervisor.verify(&guard, handle, call_site)?;
        }
        let outcome = {
            let mut guard = self.lock(handle, &shared)?;
            self.apply(&mut guard, handle, call_site, op)
        };
        if !is_corrupted(&outcome) {
            let guard = self.lock(handle, &shared)?;
            self.supervisor.verify(&guard, handle, call_site)?;
        }

        outcome
    }

    fn record_reallocation(&self, handle: StackHandle, reallocation: Reallocation, reason: &str) {
        tracing::debug!(
            handle = %handle,
            from = reallocation.from,
            to = reallocation.to,
            reason,
            "stack capacity changed"
        );
        self.log_allocation(&AllocationEvent::Reallocate {
            handle,
            from_slots: reallocation.from,
            to_slots: reallocation.to,
            bytes: GuardedBuffer::byte_len(reallocation.to),
        });
    }

    fn log_allocation(&self, event: &AllocationEvent) {
        if let Err(e) = self.allocations.record(event) {
            self.supervisor.raise(ErrorFlags::INVALID_SINK);
            tracing::warn!(error = %e, handle = %event.handle(), "allocation sink failed to record");
        }
    }

    /// Flushes the allocation sink and every diagnostic sink.
    ///
    /// Failures raise `INVALID_SINK`.
    pub fn flush_sinks(&self) {
        if let Err(e) = self.allocations.flush() {
            self.supervisor.raise(ErrorFlags::INVALID_SINK);
            tracing::warn!(error = %e, "allocation sink failed to flush");
        }
        self.supervisor.flush_sinks();
    }

    /// Creates a stack of at least `capacity` slots.
    ///
    /// Capacities below [`MIN_CAPACITY`] are raised to it.
    #[track_caller]
    pub fn construct(&self, capacity: usize) -> Result<StackHandle, StackError> {
        let call_site = CallSite::caller();
        self.construct_at(capacity, call_site)
            .map_err(|e| self.fail(e))
    }

    fn construct_at(&self, capacity: usize, origin: CallSite) -> Result<StackHandle, StackError> {
        if capacity > MAX_CAPACITY {
            return Err(StackError::RequestedTooMuch {
                requested: capacity,
                max: MAX_CAPACITY,
            });
        }
        let capacity = capacity.max(MIN_CAPACITY);

        let handle = self.registry.acquire()?;
        let instance = self
            .allocate_buffer(capacity)
            .map(|buffer| StackInstance::new(handle, buffer, origin, self.supervisor.config()))
            .and_then(|instance| {
                self.supervisor
                    .verify(&instance, handle, origin)
                    .map(|()| instance)
            });

        let instance = match instance {
            Ok(instance) => instance,
            Err(e) => {
                self.registry.abandon(handle)?;
                return Err(e);
            }
        };

        self.registry
            .install(handle, Arc::new(Mutex::new(instance)))?;
        self.log_allocation(&AllocationEvent::Allocate {
            handle,
            slots: capacity,
            bytes: GuardedBuffer::byte_len(capacity),
        });
        tracing::debug!(handle = %handle, capacity, origin = %origin, "stack constructed");

        Ok(handle)
    }

    /// Pushes `value` on top of the stack, doubling capacity when full.
    #[track_caller]
    pub fn push(&self, handle: StackHandle, value: Elem) -> Result<(), StackError> {
        let call_site = CallSite::caller();

        let reallocation = self
            .mutate(handle, call_site, |instance, config| instance.push(value, config))
            .map_err(|e| self.fail(e))?;

        if let Some(reallocation) = reallocation {
            self.record_reallocation(handle, reallocation, "grow");
        }
        tracing::trace!(handle = %handle, value, "push");

        Ok(())
    }

    /// Removes and returns the top element.
    ///
    /// A shrink that cannot be allocated does not fail the pop: capacity
    /// stays as it was and `ALLOCATION_FAILED` is raised.
    #[track_caller]
    pub fn pop(&self, handle: StackHandle) -> Result<Elem, StackError> {
        let call_site = CallSite::caller();

        let popped = self
            .mutate(handle, call_site, |instance, config| instance.pop(config))
            .map_err(|e| self.fail(e))?;

        if let Some(reallocation) = popped.reallocation {
            self.record_reallocation(handle, reallocation, "shrink");
        }
        if let Some(e) = popped.shrink_failure {
            self.supervisor.raise(e.flags());
            tracing::warn!(handle = %handle, error = %e, call_site = %call_site, "shrink skipped");
        }
        tracing::trace!(handle = %handle, value = popped.value, "pop");

        Ok(popped.value)
    }

    /// Reallocates the stack to exactly `new_capacity` slots.
    #[track_caller]
    pub fn resize(&self, handle: StackHandle, new_capacity: usize) -> Result<(), StackError> {
        let call_site = CallSite::caller();

        let reallocation = self
            .mutate(handle, call_site, |instance, config| {
                instance.resize(new_capacity, config)
            })
            .map_err(|e| self.fail(e))?;

        if let Some(reallocation) = reallocation {
            self.record_reallocation(handle, reallocation, "resize");
        }

        Ok(())
    }

    /// Verifies, wipes and releases the stack. The handle becomes reusable.
    #[track_caller]
    pub fn destroy(&self, handle: StackHandle) -> Result<(), StackError> {
        let call_site = CallSite::caller();
        self.destroy_at(handle, call_site)
            .map_err(|e| self.fail(e))
    }

    fn destroy_at(&self, handle: StackHandle, call_site: CallSite) -> Result<(), StackError> {
        let shared = self.registry.resolve(handle)?;
        let mut guard = self.lock(handle, &shared)?;

        self.supervisor.verify(&guard, handle, call_site)?;
        self.registry.release(handle)?;
        let bytes = guard.teardown();
        drop(guard);

        self.log_allocation(&AllocationEvent::Release { handle, bytes });
        tracing::debug!(handle = %handle, call_site = %call_site, "stack destroyed");

        Ok(())
    }

    /// Captures a snapshot without verifying anything and forwards it to
    /// every diagnostic sink.
    #[track_caller]
    pub fn dump(&self, handle: StackHandle) -> Result<DiagnosticRecord, StackError> {
        let call_site = CallSite::caller();

        let shared = self.registry.resolve(handle).map_err(|e| self.fail(e))?;
        let guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
        let record = DiagnosticRecord::capture(&guard, handle, call_site, None);
        drop(guard);

        self.supervisor.emit(&record);

        Ok(record)
    }

    /// Number of live elements.
    #[track_caller]
    pub fn len(&self, handle: StackHandle) -> Result<usize, StackError> {
        let call_site = CallSite::caller();
        self.read(handle, call_site, StackInstance::size)
    }

    /// True if the stack holds no element.
    #[track_caller]
    pub fn is_empty(&self, handle: StackHandle) -> Result<bool, StackError> {
        let call_site = CallSite::caller();
        self.read(handle, call_site, |instance| instance.size() == 0)
    }

    /// Current capacity in elements.
    #[track_caller]
    pub fn capacity(&self, handle: StackHandle) -> Result<usize, StackError> {
        let call_site = CallSite::caller();
        self.read(handle, call_site, StackInstance::capacity)
    }

    fn read<T>(
        &self,
        handle: StackHandle,
        call_site: CallSite,
        f: impl FnOnce(&StackInstance) -> T,
    ) -> Result<T, StackError> {
        let read = || -> Result<T, StackError> {
            let shared = self.registry.resolve(handle)?;
            let guard = self.lock(handle, &shared)?;
            self.supervisor
                .verify_validity(&guard, handle, call_site)?;

            Ok(f(&*guard))
        };

        read().map_err(|e| self.fail(e))
    }

    /// Exchanges the stacks behind `a` and `b`.
    ///
    /// Only permitted with `allow_handle_swap`. Both instances are verified,
    /// moved, given their new handle and re-stamped, then verified again.
    #[track_caller]
    pub fn swap_handles(&self, a: StackHandle, b: StackHandle) -> Result<(), StackError> {
        let call_site = CallSite::caller();
        self.swap_at(a, b, call_site).map_err(|e| self.fail(e))
    }

    fn swap_at(&self, a: StackHandle, b: StackHandle, call_site: CallSite) -> Result<(), StackError> {
        if !self.supervisor.config().allow_handle_swap {
            return Err(StackError::SwapForbidden);
        }

        let shared_a = self.registry.resolve(a)?;
        let shared_b = self.registry.resolve(b)?;
        if a == b {
            return Ok(());
        }

        // Lock in handle order so two concurrent swaps cannot deadlock.
        let (mut guard_a, mut guard_b) = if a < b {
            let guard_a = self.lock(a, &shared_a)?;
            (guard_a, self.lock(b, &shared_b)?)
        } else {
            let guard_b = self.lock(b, &shared_b)?;
            (self.lock(a, &shared_a)?, guard_b)
        };

        self.supervisor.verify(&guard_a, a, call_site)?;
        self.supervisor.verify(&guard_b, b, call_site)?;

        self.registry.swap_slots(a, b)?;

        let config = *self.supervisor.config();
        guard_a.set_handle(b);
        guard_a.restamp(&config);
        guard_b.set_handle(a);
        guard_b.restamp(&config);

        self.supervisor.verify(&guard_a, b, call_site)?;
        self.supervisor.verify(&guard_b, a, call_site)?;

        tracing::debug!(a = %a, b = %b, call_site = %call_site, "stack handles swapped");

        Ok(())
    }
}

fn is_corrupted<T>(outcome: &Result<T, StackError>) -> bool {
    matches!(outcome, Err(StackError::Corrupted(_)))
}

/// Corruption and failure injection.
#[cfg(any(test, feature = "test-utils"))]
impl Stacks {
    /// Runs `f` on the instance behind `handle` with no checks and no
    /// re-stamping.
    pub fn tamper<T>(
        &self,
        handle: StackHandle,
        f: impl FnOnce(&mut StackInstance) -> T,
    ) -> Result<T, StackError> {
        let shared = self.registry.resolve(handle)?;
        let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);

        Ok(f(&mut guard))
    }

    /// Exchanges two registry slots without touching the instances.
    pub fn tamper_swap_slots(&self, a: StackHandle, b: StackHandle) -> Result<(), StackError> {
        self.registry.swap_slots(a, b)
    }

    /// Failure injection for buffers allocated by later constructions.
    pub fn change_behaviour(&self, behaviour: BufferBehaviour) {
        *self.behaviour.lock().unwrap_or_else(PoisonError::into_inner) = behaviour;
    }

    /// Failure injection for the buffer of an existing stack.
    pub fn change_buffer_behaviour(
        &self,
        handle: StackHandle,
        behaviour: BufferBehaviour,
    ) -> Result<(), StackError> {
        self.tamper(handle, |instance| {
            if let Some(buffer) = instance.buffer_mut_unchecked() {
                buffer.change_behaviour(behaviour);
            }
        })
    }

    /// The shared instance behind `handle`.
    pub fn shared_instance(&self, handle: StackHandle) -> Result<SharedInstance, StackError> {
        self.registry.resolve(handle)
    }
}
