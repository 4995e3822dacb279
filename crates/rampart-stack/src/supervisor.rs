// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Integrity supervisor.
//!
//! Runs two checks around every mutation:
//!
//! - **validity**: the instance is structurally usable (present, has a
//!   buffer, size and capacity agree, handle matches the lookup);
//! - **damage**: canaries and hashes, each only when its guard is enabled.
//!
//! Validity is checked first and always. Damage checks only run on a valid
//! instance. Any fault is captured into a [`DiagnosticRecord`], sent to every
//! diagnostic sink and escalated according to [`FaultPolicy`].

use std::sync::Arc;

use rampart_canary::CanaryGuarded;

use crate::config::{FaultPolicy, ProtectionConfig};
use crate::constants::{MAX_CAPACITY, MIN_CAPACITY};
use crate::diagnostic::{DiagnosticRecord, DiagnosticSink};
use crate::error::{Fault, StackError};
use crate::flags::{ErrorFlags, FlagRegister};
use crate::instance::StackInstance;
use crate::types::{CallSite, StackHandle};

/// Structural soundness of `instance` as seen under `resolved`.
pub fn check_validity(instance: &StackInstance, resolved: StackHandle) -> Result<(), Fault> {
    if instance.handle() == StackHandle::INVALID {
        return Err(Fault::MissingInstance);
    }

    let Some(buffer) = instance.buffer() else {
        return Err(Fault::MissingBuffer);
    };

    let size = instance.size();
    let capacity = instance.capacity();

    if size > capacity {
        return Err(Fault::SizeExceedsCapacity { size, capacity });
    }

    let slots = buffer.capacity();
    if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) || slots != capacity {
        return Err(Fault::CapacityInconsistent { capacity, slots });
    }

    if instance.handle() != resolved {
        return Err(Fault::HandleMismatch {
            resolved,
            stored: instance.handle(),
        });
    }

    Ok(())
}

/// Tamper evidence on `instance`, restricted to the guards enabled in `config`.
pub fn check_damage(instance: &StackInstance, config: &ProtectionConfig) -> Result<(), Fault> {
    if config.canary {
        instance.check().map_err(|violation| Fault::Canary {
            position: violation.position,
            found: violation.found,
        })?;
    }

    if config.hash {
        let stored = instance.stored_struct_hash();
        let computed = instance.computed_struct_hash();
        if stored != computed {
            return Err(Fault::StructHash { stored, computed });
        }

        let stored = instance.stored_content_hash();
        let computed = instance.computed_content_hash();
        if stored != computed {
            return Err(Fault::ContentHash { stored, computed });
        }
    }

    Ok(())
}

/// Owns the checks, the diagnostic sinks and the error register of one
/// [`crate::Stacks`].
pub struct Supervisor {
    config: ProtectionConfig,
    sinks: Vec<Arc<dyn DiagnosticSink>>,
    flags: FlagRegister,
}

impl Supervisor {
    /// Creates a supervisor reporting to `sinks`.
    pub fn new(config: ProtectionConfig, sinks: Vec<Arc<dyn DiagnosticSink>>) -> Self {
        Self {
            config,
            sinks,
            flags: FlagRegister::new(),
        }
    }

    /// Active configuration.
    #[inline]
    pub fn config(&self) -> &ProtectionConfig {
        &self.config
    }

    /// The error register.
    #[inline]
    pub fn flags(&self) -> &FlagRegister {
        &self.flags
    }

    /// ORs `flags` into the register.
    #[inline]
    pub fn raise(&self, flags: ErrorFlags) {
        self.flags.raise(flags);
    }

    /// Validity check, then damage check.
    pub fn inspect(&self, instance: &StackInstance, resolved: StackHandle) -> Result<(), Fault> {
        check_validity(instance, resolved)?;
        check_damage(instance, &self.config)
    }

    /// Full check with escalation on failure.
    pub fn verify(
        &self,
        instance: &StackInstance,
        resolved: StackHandle,
        call_site: CallSite,
    ) -> Result<(), StackError> {
        self.inspect(instance, resolved)
            .map_err(|fault| self.escalate(instance, resolved, fault, call_site))
    }

    /// Validity check only, with escalation on failure.
    pub fn verify_validity(
        &self,
        instance: &StackInstance,
        resolved: StackHandle,
        call_site: CallSite,
    ) -> Result<(), StackError> {
        check_validity(instance, resolved)
            .map_err(|fault| self.escalate(instance, resolved, fault, call_site))
    }

    /// Dumps `instance`, then aborts or returns the error to hand back,
    /// depending on the fault policy.
    pub fn escalate(
        &self,
        instance: &StackInstance,
        resolved: StackHandle,
        fault: Fault,
        call_site: CallSite,
    ) -> StackError {
        self.raise(fault.flags());

        let record = DiagnosticRecord::capture(instance, resolved, call_site, Some(fault));
        tracing::error!(
            handle = %resolved,
            origin = %record.origin,
            call_site = %call_site,
            fault = %fault,
            policy = ?self.config.fault_policy,
            "integrity check failed"
        );
        self.emit(&record);

        match self.config.fault_policy {
            FaultPolicy::Abort => {
                self.flush_sinks();
                std::process::abort()
            }
            FaultPolicy::Report => StackError::Corrupted(fault),
        }
    }

    /// Sends `record` to every sink.
    pub fn emit(&self, record: &DiagnosticRecord) {
        for sink in &self.sinks {
            if let Err(e) = sink.record(record) {
                self.raise(ErrorFlags::INVALID_SINK);
                tracing::warn!(error = %e, handle = %record.handle, "diagnostic sink failed to record");
            }
        }
    }

    /// Flushes every sink.
    pub fn flush_sinks(&self) {
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                self.raise(ErrorFlags::INVALID_SINK);
                tracing::warn!(error = %e, "diagnostic sink failed to flush");
            }
        }
    }
}
