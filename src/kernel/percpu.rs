// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Per-CPU Data
//!
//! Dispatch state each processor reads without taking the system lock.
//!
//! # Design
//!
//! - **Atomics only**: Other processors set `dispatch_necessary` and the
//!   heir; the owning processor consumes them
//! - **Encoded handles**: Thread handles are stored as `u64` through
//!   [`ThreadId::encode`]
//! - **Aligned**: One cache line per processor
//!
//! # Usage
//!
//! ```rust,ignore
//! let cpu = kernel.percpu(0);
//! if cpu.dispatch_necessary() && cpu.is_dispatch_enabled() {
//!     kernel.dispatch(0);
//! }
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::rustux::types::{CpuIndex, ThreadId};

/// ============================================================================
/// Per-CPU Data
/// ============================================================================

/// Per-CPU dispatch state
#[repr(C, align(64))]
#[derive(Debug)]
pub struct PerCpu {
    /// Processor index
    cpu: CpuIndex,

    /// Dispatching is allowed only at level zero
    dispatch_disable_level: AtomicU32,

    /// Interrupt nesting depth
    isr_nest_level: AtomicU32,

    /// Heir differs from the executing thread
    dispatch_necessary: AtomicBool,

    /// Thread executing on this processor
    executing: AtomicU64,

    /// Thread to execute next
    heir: AtomicU64,

    /// Statistics
    stats: DispatchStats,
}

impl PerCpu {
    /// Create the state of an idle processor
    pub const fn new(cpu: CpuIndex) -> Self {
        Self {
            cpu,
            dispatch_disable_level: AtomicU32::new(0),
            isr_nest_level: AtomicU32::new(0),
            dispatch_necessary: AtomicBool::new(false),
            executing: AtomicU64::new(ThreadId::encode(None)),
            heir: AtomicU64::new(ThreadId::encode(None)),
            stats: DispatchStats::new(),
        }
    }

    /// Processor index
    pub fn cpu(&self) -> CpuIndex {
        self.cpu
    }

    /// Thread executing on this processor
    pub fn executing(&self) -> Option<ThreadId> {
        ThreadId::decode(self.executing.load(Ordering::Acquire))
    }

    pub(crate) fn set_executing(&self, thread: Option<ThreadId>) {
        self.executing.store(ThreadId::encode(thread), Ordering::Release);
    }

    /// Thread to execute next
    pub fn heir(&self) -> Option<ThreadId> {
        ThreadId::decode(self.heir.load(Ordering::Acquire))
    }

    pub(crate) fn set_heir(&self, thread: Option<ThreadId>) {
        self.heir.store(ThreadId::encode(thread), Ordering::Release);
    }

    /// Check if a dispatch is pending
    pub fn dispatch_necessary(&self) -> bool {
        self.dispatch_necessary.load(Ordering::Acquire)
    }

    pub(crate) fn request_dispatch(&self) {
        self.dispatch_necessary.store(true, Ordering::Release);
    }

    /// Consume a pending dispatch request
    pub(crate) fn take_dispatch_request(&self) -> bool {
        self.dispatch_necessary.swap(false, Ordering::AcqRel)
    }

    /// Current dispatch disable level
    pub fn dispatch_disable_level(&self) -> u32 {
        self.dispatch_disable_level.load(Ordering::Acquire)
    }

    /// Check if the processor may dispatch right now
    pub fn is_dispatch_enabled(&self) -> bool {
        self.dispatch_disable_level() == 0 && self.isr_nest_level() == 0
    }

    /// Raise the dispatch disable level
    ///
    /// # Returns
    ///
    /// The new level
    pub(crate) fn disable_dispatch(&self) -> u32 {
        self.dispatch_disable_level.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Lower the dispatch disable level
    ///
    /// # Returns
    ///
    /// The new level, or `None` if it already was zero
    pub(crate) fn enable_dispatch(&self) -> Option<u32> {
        self.dispatch_disable_level
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |level| level.checked_sub(1))
            .ok()
            .map(|previous| previous - 1)
    }

    /// Interrupt nesting depth
    pub fn isr_nest_level(&self) -> u32 {
        self.isr_nest_level.load(Ordering::Acquire)
    }

    pub(crate) fn isr_enter(&self) -> u32 {
        self.isr_nest_level.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn isr_leave(&self) -> Option<u32> {
        self.isr_nest_level
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |level| level.checked_sub(1))
            .ok()
            .map(|previous| previous - 1)
    }

    /// Statistics
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}

/// ============================================================================
/// Statistics
/// ============================================================================

/// Dispatch statistics of one processor
#[derive(Debug)]
pub struct DispatchStats {
    /// Dispatcher runs that consumed a request
    pub dispatches: AtomicU64,

    /// Context switches performed
    pub context_switches: AtomicU64,

    /// Dispatch requests sent to this processor by others
    pub dispatch_requests: AtomicU64,
}

impl DispatchStats {
    pub const fn new() -> Self {
        Self {
            dispatches: AtomicU64::new(0),
            context_switches: AtomicU64::new(0),
            dispatch_requests: AtomicU64::new(0),
        }
    }

    /// Snapshot as `(dispatches, context_switches, dispatch_requests)`
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.dispatches.load(Ordering::Relaxed),
            self.context_switches.load(Ordering::Relaxed),
            self.dispatch_requests.load(Ordering::Relaxed),
        )
    }
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
