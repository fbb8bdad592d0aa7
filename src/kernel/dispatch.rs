// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Dispatcher
//!
//! [`Kernel`] wraps the scheduling state in one lock and turns heir changes
//! into context switches.
//!
//! # Design
//!
//! - **One lock**: Every operation on [`System`] runs with interrupts
//!   disabled and the system lock held
//! - **Publish, then dispatch**: After an operation the heir of every
//!   scheduler is published to its processor; a processor whose heir
//!   differs from its executing thread gets a dispatch request
//! - **Deferred dispatch**: A processor dispatches only with dispatching
//!   enabled and outside interrupt handlers; otherwise the request waits
//!   for `enable_dispatch` or `isr_leave`
//! - **Context switch without the lock**: The port switches threads after
//!   the lock is released
//!
//! # Dispatch Loop
//!
//! ```text
//! while take_dispatch_request():
//!     lock; executing := heir; unlock
//!     switch_context(previous, heir) if they differ
//! kill_zombies
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let kernel = Kernel::new(Configuration::uniprocessor(), port)?;
//! let worker = kernel.create_thread(ThreadAttributes::new("worker", 10))?;
//! kernel.start_thread(worker)?;
//! // the port switched to `worker`
//! ```

use alloc::vec::Vec;
use core::sync::atomic::Ordering;

use crate::err::{Result, Status};
use crate::kernel::arch::CpuPort;
use crate::kernel::config::Configuration;
use crate::kernel::debug::{internal_error, FatalError};
use crate::kernel::percpu::PerCpu;
use crate::kernel::sync::thread_queue::Discipline;
use crate::kernel::system::System;
use crate::kernel::thread::{BlockReason, Tcb, ThreadAttributes, Timeout};
use crate::rustux::types::{CpuIndex, Priority, QueueId, ThreadId};

// Import logging macros
use crate::{log_debug, log_trace, log_warn};

/// ============================================================================
/// Kernel
/// ============================================================================

/// Scheduling state, per-CPU state and the CPU port
pub struct Kernel<P: CpuPort> {
    /// Scheduling state
    system: spin::Mutex<System>,

    /// Per-CPU dispatch state, indexed by processor
    cpus: Vec<PerCpu>,

    /// Processor services
    port: P,
}

impl<P: CpuPort> Kernel<P> {
    /// Bring up the kernel
    ///
    /// # Returns
    ///
    /// The kernel, or the status of the failed configuration check
    pub fn new(config: Configuration, port: P) -> Result<Self> {
        let cpus = (0..config.processor_count()).map(PerCpu::new).collect();
        let system = System::new(config)?;

        Ok(Self {
            system: spin::Mutex::new(system),
            cpus,
            port,
        })
    }

    /// Processor services
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Per-CPU state of a processor
    pub fn percpu(&self, cpu: CpuIndex) -> &PerCpu {
        match self.cpus.get(cpu) {
            Some(percpu) => percpu,
            None => internal_error(FatalError::InvalidProcessor, format_args!("cpu {}", cpu)),
        }
    }

    /// Thread executing on a processor
    pub fn executing(&self, cpu: CpuIndex) -> Option<ThreadId> {
        self.percpu(cpu).executing()
    }

    /// Heir published to a processor
    pub fn heir(&self, cpu: CpuIndex) -> Option<ThreadId> {
        self.percpu(cpu).heir()
    }

    /// Run an operation on the scheduling state
    ///
    /// Heirs are published afterwards and the current processor dispatches
    /// if it may.
    pub fn with_system<R>(&self, operation: impl FnOnce(&mut System) -> R) -> R {
        let cpu = self.port.current_cpu();
        let level = self.port.disable_interrupts();

        let result = {
            let mut system = self.system.lock();
            let result = operation(&mut system);
            self.publish_heirs(cpu, &system);
            result
        };

        self.port.restore_interrupts(level);

        if self.percpu(cpu).is_dispatch_enabled() {
            self.dispatch(cpu);
        }
        result
    }

    /// Publish the heirs and request dispatches where they changed
    fn publish_heirs(&self, current: CpuIndex, system: &System) {
        for sched in system.schedulers() {
            let percpu = self.percpu(sched.cpu());
            let heir = sched.heir();
            percpu.set_heir(heir);

            if heir == percpu.executing() || percpu.dispatch_necessary() {
                continue;
            }

            percpu.request_dispatch();
            if sched.cpu() != current {
                percpu.stats().dispatch_requests.fetch_add(1, Ordering::Relaxed);
                self.port.send_dispatch_request(sched.cpu());
                log_trace!("dispatch request to cpu {}", sched.cpu());
            }
        }
    }

    /// ------------------------------------------------------------------------
    /// Dispatching
    /// ------------------------------------------------------------------------

    /// Make the heir of a processor execute
    ///
    /// Loops until no request is pending, then reclaims zombies.
    pub fn dispatch(&self, cpu: CpuIndex) {
        let percpu = self.percpu(cpu);

        while percpu.take_dispatch_request() {
            let level = self.port.disable_interrupts();
            let switch = {
                let mut system = self.system.lock();
                let sched = match system.scheduler_of_cpu(cpu) {
                    Some(sched) => sched,
                    None => internal_error(FatalError::InvalidProcessor, format_args!("cpu {} has no scheduler", cpu)),
                };

                let from = system.executing(sched);
                let to = system.heir(sched);
                match to {
                    Some(heir) if to != from && self.executing_elsewhere(cpu, heir) => None,
                    _ => {
                        system.set_executing(sched, to);
                        Some((from, to))
                    }
                }
            };
            self.port.restore_interrupts(level);

            // The other processor requests a dispatch once it switched away
            let (from, to) = match switch {
                Some(switch) => switch,
                None => {
                    log_trace!("cpu {}: heir {:?} still executing elsewhere", cpu, percpu.heir());
                    continue;
                }
            };

            percpu.stats().dispatches.fetch_add(1, Ordering::Relaxed);
            if from == to {
                percpu.set_executing(to);
                continue;
            }

            percpu.stats().context_switches.fetch_add(1, Ordering::Relaxed);
            log_trace!("cpu {}: switch {:?} -> {:?}", cpu, from, to);
            self.port.switch_context(cpu, from, to);
            percpu.set_executing(to);

            if let Some(previous) = from {
                self.hand_over(cpu, previous);
            }
        }

        let level = self.port.disable_interrupts();
        let reclaimed = self.system.lock().kill_zombies();
        self.port.restore_interrupts(level);

        if reclaimed > 0 {
            log_debug!("cpu {}: reclaimed {} zombie(s)", cpu, reclaimed);
        }
    }

    /// Check if a thread still executes on a processor other than `cpu`
    fn executing_elsewhere(&self, cpu: CpuIndex, thread: ThreadId) -> bool {
        self.cpus
            .iter()
            .any(|other| other.cpu() != cpu && other.executing() == Some(thread))
    }

    /// Request a dispatch on processors whose heir is a thread `cpu` just
    /// switched away from
    fn hand_over(&self, cpu: CpuIndex, thread: ThreadId) {
        for other in self.cpus.iter().filter(|other| other.cpu() != cpu) {
            if other.heir() != Some(thread) || other.executing() == Some(thread) || other.dispatch_necessary() {
                continue;
            }

            other.request_dispatch();
            other.stats().dispatch_requests.fetch_add(1, Ordering::Relaxed);
            self.port.send_dispatch_request(other.cpu());
            log_trace!("cpu {}: hand over {} to cpu {}", cpu, thread, other.cpu());
        }
    }

    /// Forbid dispatching on the current processor
    pub fn disable_dispatch(&self) {
        let cpu = self.port.current_cpu();
        self.percpu(cpu).disable_dispatch();
    }

    /// Allow dispatching on the current processor again
    ///
    /// Dispatches if the level drops to zero outside interrupt handlers.
    pub fn enable_dispatch(&self) {
        let cpu = self.port.current_cpu();
        let percpu = self.percpu(cpu);

        match percpu.enable_dispatch() {
            Some(0) if percpu.isr_nest_level() == 0 => self.dispatch(cpu),
            Some(_) => {}
            None => {
                log_warn!("cpu {}: unbalanced enable_dispatch", cpu);
            }
        }
    }

    /// Enter an interrupt handler on the current processor
    pub fn isr_enter(&self) {
        let cpu = self.port.current_cpu();
        self.percpu(cpu).isr_enter();
    }

    /// Leave an interrupt handler on the current processor
    ///
    /// Dispatches when the outermost handler returns with dispatching
    /// enabled.
    pub fn isr_leave(&self) {
        let cpu = self.port.current_cpu();
        let percpu = self.percpu(cpu);

        match percpu.isr_leave() {
            Some(0) if percpu.dispatch_disable_level() == 0 => self.dispatch(cpu),
            Some(_) => {}
            None => {
                log_warn!("cpu {}: unbalanced isr_leave", cpu);
            }
        }
    }

    /// Let the executing thread of the current processor yield
    pub fn yield_processor(&self) {
        let cpu = self.port.current_cpu();
        if let Some(thread) = self.executing(cpu) {
            self.with_system(|system| system.yield_thread(thread));
        }
    }

    /// ------------------------------------------------------------------------
    /// Blocking
    /// ------------------------------------------------------------------------

    /// Block a thread on a thread queue
    ///
    /// Dispatching stays disabled between the two enqueue phases, so an
    /// extraction from an interrupt handler or another processor in between
    /// leaves the thread ready.
    ///
    /// # Returns
    ///
    /// The enqueue error, or the wait status once the thread runs again
    pub fn enqueue(&self, queue: QueueId, thread: ThreadId, timeout: Timeout) -> Status {
        self.disable_dispatch();

        if let Err(status) = self.with_system(|system| system.enqueue_prepare(queue, thread, timeout)) {
            self.enable_dispatch();
            return status;
        }

        self.with_system(|system| system.enqueue_commit(thread));
        self.enable_dispatch();

        self.with_system(|system| system.thread(thread).wait_status())
    }

    /// Extract a waiting thread with a wait status
    pub fn extract(&self, queue: QueueId, thread: ThreadId, status: Status) {
        self.with_system(|system| system.extract(queue, thread, status));
    }

    /// Timeout event of a waiting thread
    pub fn timeout(&self, thread: ThreadId) -> bool {
        self.with_system(|system| system.timeout(thread))
    }

    /// Unblock the first waiter of a thread queue
    pub fn surrender(&self, queue: QueueId) -> Option<ThreadId> {
        self.with_system(|system| system.surrender(queue))
    }

    /// Extract every waiter of a thread queue
    pub fn flush(&self, queue: QueueId, status: Status) -> usize {
        self.with_system(|system| system.flush(queue, status))
    }

    /// Extract the waiters a filter accepts
    pub fn flush_filtered(&self, queue: QueueId, status: Status, filter: impl FnMut(&Tcb) -> bool) -> usize {
        self.with_system(|system| system.flush_filtered(queue, status, filter))
    }

    /// ------------------------------------------------------------------------
    /// Objects
    /// ------------------------------------------------------------------------

    /// Create a dormant thread
    pub fn create_thread(&self, attributes: ThreadAttributes) -> Result<ThreadId> {
        self.with_system(|system| system.create_thread(attributes))
    }

    /// Start a dormant thread
    pub fn start_thread(&self, thread: ThreadId) -> Result {
        self.with_system(|system| system.start_thread(thread))
    }

    /// Suspend a ready thread
    pub fn suspend(&self, thread: ThreadId) -> Result {
        self.with_system(|system| system.suspend(thread))
    }

    /// Resume a suspended thread
    pub fn resume(&self, thread: ThreadId) -> Result {
        self.with_system(|system| system.resume(thread))
    }

    /// Delete a thread
    pub fn delete_thread(&self, thread: ThreadId) -> Result {
        self.with_system(|system| system.delete_thread(thread))
    }

    /// Make a thread ready without a thread queue
    pub fn ready(&self, thread: ThreadId) -> Result {
        self.with_system(|system| system.ready(thread))
    }

    /// Block a thread without a thread queue
    pub fn block(&self, thread: ThreadId, reason: BlockReason) -> Result {
        self.with_system(|system| system.block(thread, reason))
    }

    /// Change the real priority of a thread
    pub fn set_priority(&self, thread: ThreadId, priority: Priority) -> Result<Priority> {
        self.with_system(|system| system.set_priority(thread, priority))
    }

    /// Allow or forbid preemption of a thread
    pub fn set_preemptible(&self, thread: ThreadId, preemptible: bool) {
        self.with_system(|system| system.set_preemptible(thread, preemptible));
    }

    /// Create a thread queue
    pub fn create_queue(&self, name: &'static str, discipline: Discipline) -> Result<QueueId> {
        self.with_system(|system| system.create_queue(name, discipline))
    }

    /// Delete a thread queue
    pub fn delete_queue(&self, queue: QueueId) -> usize {
        self.with_system(|system| system.delete_queue(queue))
    }

    /// Take an unowned resource
    pub fn seize(&self, queue: QueueId, thread: ThreadId) -> Result {
        self.with_system(|system| system.seize(queue, thread))
    }

    /// Give up an owned resource
    pub fn release(&self, queue: QueueId, thread: ThreadId) -> Result<Option<ThreadId>> {
        self.with_system(|system| system.release(queue, thread))
    }
}
