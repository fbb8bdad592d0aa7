// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! AMD64 CPU Port
//!
//! Interrupt control through RFLAGS.IF, processor identification through
//! the initial APIC ID. Context switching and inter-processor interrupts
//! belong to the board and are passed in as functions.

use x86_64::instructions::interrupts;

use super::CpuPort;
use crate::rustux::types::{CpuIndex, IsrLevel, ThreadId};

/// Board context switch: `(cpu, from, to)`
pub type ContextSwitchFn = fn(CpuIndex, Option<ThreadId>, Option<ThreadId>);

/// Board inter-processor interrupt
pub type DispatchRequestFn = fn(CpuIndex);

/// Interrupt level with RFLAGS.IF set
const LEVEL_ENABLED: IsrLevel = 0;

/// Interrupt level with RFLAGS.IF clear
const LEVEL_DISABLED: IsrLevel = 1;

/// AMD64 port
#[derive(Debug, Clone, Copy)]
pub struct Amd64Port {
    switch: ContextSwitchFn,
    dispatch_request: Option<DispatchRequestFn>,
}

impl Amd64Port {
    /// Create a port for a uniprocessor board
    pub const fn new(switch: ContextSwitchFn) -> Self {
        Self {
            switch,
            dispatch_request: None,
        }
    }

    /// Add the inter-processor interrupt of an SMP board
    pub const fn with_dispatch_request(mut self, request: DispatchRequestFn) -> Self {
        self.dispatch_request = Some(request);
        self
    }
}

impl CpuPort for Amd64Port {
    fn current_cpu(&self) -> CpuIndex {
        // CPUID.01H:EBX[31:24] is the initial APIC ID
        let leaf = unsafe { core::arch::x86_64::__cpuid(1) };
        (leaf.ebx >> 24) as CpuIndex
    }

    fn disable_interrupts(&self) -> IsrLevel {
        let enabled = interrupts::are_enabled();
        interrupts::disable();
        if enabled {
            LEVEL_ENABLED
        } else {
            LEVEL_DISABLED
        }
    }

    fn restore_interrupts(&self, level: IsrLevel) {
        if level == LEVEL_ENABLED {
            interrupts::enable();
        }
    }

    fn switch_context(&self, cpu: CpuIndex, from: Option<ThreadId>, to: Option<ThreadId>) {
        (self.switch)(cpu, from, to);
    }

    fn send_dispatch_request(&self, cpu: CpuIndex) {
        if let Some(request) = self.dispatch_request {
            request(cpu);
        }
    }
}
