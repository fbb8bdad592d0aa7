// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Test Support
//!
//! A CPU port that records what the dispatcher asks of it, and shorthand
//! for creating started threads.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::kernel::arch::CpuPort;
use crate::kernel::config::Configuration;
use crate::kernel::dispatch::Kernel;
use crate::kernel::system::System;
use crate::kernel::thread::ThreadAttributes;
use crate::rustux::types::{CpuIndex, IsrLevel, Priority, SchedulerId, ThreadId};

pub const S0: SchedulerId = SchedulerId(0);
pub const S1: SchedulerId = SchedulerId(1);
pub const S2: SchedulerId = SchedulerId(2);

pub const ULTRA_HIGH: Priority = 1;
pub const VERY_HIGH: Priority = 2;
pub const HIGH: Priority = 3;
pub const NORMAL: Priority = 4;
pub const LOW: Priority = 5;

/// One context switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    pub cpu: CpuIndex,
    pub from: Option<ThreadId>,
    pub to: Option<ThreadId>,
}

/// CPU port that records context switches and dispatch requests
#[derive(Debug, Default)]
pub struct RecordingPort {
    /// Processor reported as current
    cpu: AtomicUsize,

    /// Interrupt disable depth
    disabled: AtomicUsize,

    switches: spin::Mutex<Vec<Switch>>,
    requests: spin::Mutex<Vec<CpuIndex>>,
}

impl RecordingPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend to run on another processor
    pub fn set_cpu(&self, cpu: CpuIndex) {
        self.cpu.store(cpu, Ordering::SeqCst);
    }

    /// Context switches so far
    pub fn switches(&self) -> Vec<Switch> {
        self.switches.lock().clone()
    }

    /// Context switches so far, clearing the record
    pub fn take_switches(&self) -> Vec<Switch> {
        core::mem::take(&mut *self.switches.lock())
    }

    /// Dispatch requests so far
    pub fn requests(&self) -> Vec<CpuIndex> {
        self.requests.lock().clone()
    }

    /// Check if interrupts are disabled
    pub fn interrupts_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst) > 0
    }
}

impl CpuPort for RecordingPort {
    fn current_cpu(&self) -> CpuIndex {
        self.cpu.load(Ordering::SeqCst)
    }

    fn disable_interrupts(&self) -> IsrLevel {
        self.disabled.fetch_add(1, Ordering::SeqCst)
    }

    fn restore_interrupts(&self, level: IsrLevel) {
        self.disabled.store(level, Ordering::SeqCst);
    }

    fn switch_context(&self, cpu: CpuIndex, from: Option<ThreadId>, to: Option<ThreadId>) {
        assert!(!self.interrupts_disabled(), "context switch with interrupts disabled");
        self.switches.lock().push(Switch { cpu, from, to });
    }

    fn send_dispatch_request(&self, cpu: CpuIndex) {
        self.requests.lock().push(cpu);
    }
}

/// Kernel on `processors` processors with a recording port
pub fn kernel(processors: usize) -> Kernel<RecordingPort> {
    Kernel::new(Configuration::smp(processors), RecordingPort::new()).unwrap()
}

/// Create and start a thread on a home scheduler
pub fn spawn(system: &mut System, name: &'static str, priority: Priority, home: SchedulerId) -> ThreadId {
    let thread = system
        .create_thread(ThreadAttributes::new(name, priority).on_scheduler(home))
        .unwrap();
    system.start_thread(thread).unwrap();
    thread
}

/// Create and start a thread through the kernel
pub fn spawn_on(kernel: &Kernel<RecordingPort>, name: &'static str, priority: Priority, home: SchedulerId) -> ThreadId {
    kernel.with_system(|system| spawn(system, name, priority, home))
}
