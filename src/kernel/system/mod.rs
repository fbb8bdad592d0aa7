// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduling State
//!
//! [`System`] owns the thread table, the thread queue table and the
//! scheduler instances. Every operation of the dispatch core is a method
//! taking `&mut System`; the kernel wraps the whole state in one lock, so
//! each method runs atomically with respect to interrupts and other
//! processors.
//!
//! # Design
//!
//! - **Handles everywhere**: Threads, queues and schedulers refer to each
//!   other by handle, never by reference
//! - **Heirs after every operation**: Each public operation ends by
//!   recomputing the heir of every scheduler
//! - **Fatal on misuse**: A stale handle or an operation on a thread in the
//!   wrong state is a broken invariant and goes through
//!   [`internal_error`]
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut system = System::new(Configuration::uniprocessor())?;
//! let worker = system.create_thread(ThreadAttributes::new("worker", 10))?;
//! system.start_thread(worker)?;
//! assert_eq!(system.heir(SchedulerId::new(0)), Some(worker));
//! ```

mod propagate;
mod thread_queue;

pub(crate) use propagate::NodeUpdate;

use alloc::vec::Vec;

use crate::err::{Result, Status};
use crate::kernel::config::Configuration;
use crate::kernel::debug::{internal_error, FatalError};
use crate::kernel::object::table::ObjectTable;
use crate::kernel::priority::Placement;
use crate::kernel::sched::SchedulerInstance;
use crate::kernel::sync::thread_queue::ThreadQueue;
use crate::kernel::thread::{BlockReason, PriorityNode, Tcb, ThreadAttributes, ThreadState, WaitFlags};
use crate::rustux::types::{CpuIndex, Priority, QueueId, SchedulerId, ThreadId};

// Import logging macros
use crate::{log_debug, log_info, log_trace};

/// ============================================================================
/// System
/// ============================================================================

/// Scheduling state of the whole kernel
#[derive(Debug)]
pub struct System {
    /// Configuration the system was brought up with
    config: Configuration,

    /// Thread table
    threads: ObjectTable<Tcb>,

    /// Thread queue table
    queues: ObjectTable<ThreadQueue>,

    /// Scheduler instances in index order
    schedulers: Vec<SchedulerInstance>,
}

impl System {
    /// Bring up the scheduling state
    ///
    /// # Returns
    ///
    /// The system, or the status of the failed configuration check
    pub fn new(config: Configuration) -> Result<Self> {
        config.validate()?;

        let schedulers = config
            .schedulers
            .iter()
            .enumerate()
            .map(|(index, sched)| SchedulerInstance::new(SchedulerId(index as u16), sched))
            .collect();

        log_info!(
            "dispatch core: {} scheduler(s), {} threads, {} thread queues",
            config.schedulers.len(),
            config.maximum_threads,
            config.maximum_thread_queues
        );

        Ok(Self {
            threads: ObjectTable::new(config.maximum_threads),
            queues: ObjectTable::new(config.maximum_thread_queues),
            schedulers,
            config,
        })
    }

    /// Configuration the system was brought up with
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// ------------------------------------------------------------------------
    /// Lookups
    /// ------------------------------------------------------------------------

    /// Thread control block of a live thread
    pub fn thread(&self, thread: ThreadId) -> &Tcb {
        match self.threads.get(thread.index(), thread.generation()) {
            Some(tcb) => tcb,
            None => internal_error(FatalError::StaleThread, format_args!("{}", thread)),
        }
    }

    /// Thread control block, if the handle is live
    pub fn try_thread(&self, thread: ThreadId) -> Option<&Tcb> {
        self.threads.get(thread.index(), thread.generation())
    }

    pub(crate) fn tcb_mut(&mut self, thread: ThreadId) -> &mut Tcb {
        match self.threads.get_mut(thread.index(), thread.generation()) {
            Some(tcb) => tcb,
            None => internal_error(FatalError::StaleThread, format_args!("{}", thread)),
        }
    }

    /// Thread queue
    pub fn queue(&self, queue: QueueId) -> &ThreadQueue {
        match self.queues.get(queue.index(), queue.generation()) {
            Some(queue) => queue,
            None => internal_error(FatalError::StaleQueue, format_args!("{}", queue)),
        }
    }

    pub(crate) fn queue_mut(&mut self, queue: QueueId) -> &mut ThreadQueue {
        match self.queues.get_mut(queue.index(), queue.generation()) {
            Some(queue) => queue,
            None => internal_error(FatalError::StaleQueue, format_args!("{}", queue)),
        }
    }

    /// Scheduler instance
    pub fn scheduler(&self, scheduler: SchedulerId) -> &SchedulerInstance {
        match self.schedulers.get(scheduler.index()) {
            Some(sched) => sched,
            None => internal_error(FatalError::InvalidScheduler, format_args!("{}", scheduler)),
        }
    }

    pub(crate) fn scheduler_mut(&mut self, scheduler: SchedulerId) -> &mut SchedulerInstance {
        match self.schedulers.get_mut(scheduler.index()) {
            Some(sched) => sched,
            None => internal_error(FatalError::InvalidScheduler, format_args!("{}", scheduler)),
        }
    }

    /// All scheduler instances in index order
    pub fn schedulers(&self) -> &[SchedulerInstance] {
        &self.schedulers
    }

    /// Scheduler driving a processor
    pub fn scheduler_of_cpu(&self, cpu: CpuIndex) -> Option<SchedulerId> {
        self.schedulers.iter().find(|sched| sched.cpu() == cpu).map(SchedulerInstance::id)
    }

    /// Heir of a scheduler
    pub fn heir(&self, scheduler: SchedulerId) -> Option<ThreadId> {
        self.scheduler(scheduler).heir()
    }

    /// Thread executing on a scheduler's processor
    pub fn executing(&self, scheduler: SchedulerId) -> Option<ThreadId> {
        self.scheduler(scheduler).executing()
    }

    /// Effective priority of a thread on a scheduler
    pub fn priority(&self, thread: ThreadId, scheduler: SchedulerId) -> Option<Priority> {
        self.thread(thread).priority(scheduler)
    }

    /// Number of live threads (zombies included)
    pub fn thread_count(&self) -> usize {
        self.threads.count()
    }

    /// Number of live thread queues
    pub fn queue_count(&self) -> usize {
        self.queues.count()
    }

    /// ------------------------------------------------------------------------
    /// Thread Lifecycle
    /// ------------------------------------------------------------------------

    /// Create a dormant thread
    ///
    /// # Returns
    ///
    /// - `Ok(thread)` on success
    /// - `Err(Status::InvalidPriority)` if the priority is out of range
    /// - `Err(Status::TooMany)` if the thread table is full
    pub fn create_thread(&mut self, attributes: ThreadAttributes) -> Result<ThreadId> {
        if attributes.priority > self.config.priority_maximum {
            return Err(Status::InvalidPriority);
        }

        let home = attributes.scheduler.unwrap_or(SchedulerId(0));
        if home.index() >= self.schedulers.len() {
            return Err(Status::IncorrectState);
        }

        let (index, generation) = self
            .threads
            .insert_with(|index, generation| Tcb::new(ThreadId::new(index, generation), &attributes, home))?;
        let thread = ThreadId::new(index, generation);

        log_debug!("created thread {} '{}' prio={} on {}", thread, attributes.name, attributes.priority, home);

        Ok(thread)
    }

    /// Make a dormant thread ready
    ///
    /// # Returns
    ///
    /// `Err(Status::IncorrectState)` unless the thread is dormant
    pub fn start_thread(&mut self, thread: ThreadId) -> Result {
        if self.thread(thread).state != ThreadState::Dormant {
            return Err(Status::IncorrectState);
        }

        self.tcb_mut(thread).state = ThreadState::Ready;
        self.link_ready(thread);
        self.update_heirs();

        log_debug!("started thread {}", thread);
        Ok(())
    }

    /// Suspend a ready thread
    ///
    /// # Returns
    ///
    /// `Err(Status::IncorrectState)` unless the thread is ready
    pub fn suspend(&mut self, thread: ThreadId) -> Result {
        if self.thread(thread).state != ThreadState::Ready {
            return Err(Status::IncorrectState);
        }

        self.unlink_ready(thread);
        self.tcb_mut(thread).state = ThreadState::Suspended;
        self.update_heirs();

        log_trace!("suspended thread {}", thread);
        Ok(())
    }

    /// Resume a suspended thread
    ///
    /// # Returns
    ///
    /// `Err(Status::IncorrectState)` unless the thread is suspended
    pub fn resume(&mut self, thread: ThreadId) -> Result {
        if self.thread(thread).state != ThreadState::Suspended {
            return Err(Status::IncorrectState);
        }

        self.tcb_mut(thread).state = ThreadState::Ready;
        self.link_ready(thread);
        self.update_heirs();

        log_trace!("resumed thread {}", thread);
        Ok(())
    }

    /// Delete a thread
    ///
    /// A waiting thread is extracted with `Status::ObjectDeleted` first. The
    /// thread becomes a zombie; its slot is reclaimed by
    /// [`System::kill_zombies`] once it no longer executes.
    ///
    /// # Returns
    ///
    /// - `Err(Status::ResourceInUse)` if the thread owns thread queues
    /// - `Err(Status::IncorrectState)` if the thread is already a zombie
    pub fn delete_thread(&mut self, thread: ThreadId) -> Result {
        let tcb = self.thread(thread);
        if tcb.state == ThreadState::Zombie {
            return Err(Status::IncorrectState);
        }
        if tcb.resource_count > 0 {
            return Err(Status::ResourceInUse);
        }

        if tcb.wait.queue.is_some() {
            self.extract_thread(thread, Status::ObjectDeleted, false);
        }

        if self.thread(thread).state.is_ready() {
            self.unlink_ready(thread);
        }

        let tcb = self.tcb_mut(thread);
        tcb.state = ThreadState::Zombie;
        tcb.wait.flags = WaitFlags::empty();
        self.update_heirs();

        log_debug!("deleted thread {}", thread);
        Ok(())
    }

    /// Reclaim the slots of zombies that no longer execute
    ///
    /// # Returns
    ///
    /// Number of reclaimed threads
    pub fn kill_zombies(&mut self) -> usize {
        let zombies: Vec<ThreadId> = self
            .threads
            .iter()
            .filter(|tcb| tcb.state == ThreadState::Zombie)
            .map(Tcb::id)
            .filter(|&id| self.schedulers.iter().all(|sched| sched.executing() != Some(id)))
            .collect();

        for &zombie in &zombies {
            self.threads.remove(zombie.index(), zombie.generation());
            log_trace!("reclaimed thread {}", zombie);
        }

        zombies.len()
    }

    /// Allow or forbid preemption of a thread
    pub fn set_preemptible(&mut self, thread: ThreadId, preemptible: bool) {
        self.tcb_mut(thread).preemptible = preemptible;

        for index in 0..self.schedulers.len() {
            if self.schedulers[index].executing() == Some(thread) {
                self.schedulers[index].set_executing_preemptible(preemptible);
            }
        }

        self.update_heirs();
    }

    /// Move a thread to another home scheduler
    ///
    /// # Returns
    ///
    /// - `Err(Status::ResourceInUse)` if the thread owns thread queues or
    ///   is helped by other schedulers
    /// - `Err(Status::IncorrectState)` if the thread waits or is a zombie
    pub fn set_scheduler(&mut self, thread: ThreadId, scheduler: SchedulerId) -> Result {
        self.scheduler(scheduler);

        let tcb = self.thread(thread);
        if tcb.resource_count > 0 || tcb.nodes.len() > 1 {
            return Err(Status::ResourceInUse);
        }
        if tcb.wait.queue.is_some() || !matches!(tcb.state, ThreadState::Dormant | ThreadState::Ready | ThreadState::Suspended) {
            return Err(Status::IncorrectState);
        }

        let ready = tcb.state.is_ready();
        if ready {
            self.unlink_ready(thread);
        }

        self.tcb_mut(thread).nodes[0].scheduler = scheduler;

        if ready {
            self.link_ready(thread);
        }
        self.update_heirs();

        log_debug!("thread {} moved to {}", thread, scheduler);
        Ok(())
    }

    /// ------------------------------------------------------------------------
    /// Direct Scheduling
    /// ------------------------------------------------------------------------

    /// Make a blocked or suspended thread ready without a thread queue
    ///
    /// # Returns
    ///
    /// `Err(Status::IncorrectState)` for dormant threads and zombies
    pub fn ready(&mut self, thread: ThreadId) -> Result {
        let state = self.thread(thread).state;
        match state {
            ThreadState::Ready | ThreadState::Transient => Ok(()),
            ThreadState::Blocked(BlockReason::ThreadQueue) => internal_error(
                FatalError::InvalidState,
                format_args!("ready() on {} waiting on a thread queue", thread),
            ),
            ThreadState::Blocked(_) | ThreadState::Suspended => {
                let tcb = self.tcb_mut(thread);
                tcb.state = ThreadState::Ready;
                if state.is_blocked() {
                    tcb.wait.flags = tcb.wait.flags.with_state(WaitFlags::READY_AGAIN);
                }
                self.link_ready(thread);
                self.update_heirs();

                log_trace!("ready {}", thread);
                Ok(())
            }
            ThreadState::Dormant | ThreadState::Zombie => Err(Status::IncorrectState),
        }
    }

    /// Block a ready thread without a thread queue
    ///
    /// # Returns
    ///
    /// `Err(Status::IncorrectState)` unless the thread is ready
    pub fn block(&mut self, thread: ThreadId, reason: BlockReason) -> Result {
        if reason == BlockReason::ThreadQueue {
            internal_error(
                FatalError::InvalidState,
                format_args!("block() of {} for a thread queue", thread),
            );
        }
        if self.thread(thread).state != ThreadState::Ready {
            return Err(Status::IncorrectState);
        }

        self.unlink_ready(thread);

        let tcb = self.tcb_mut(thread);
        tcb.state = ThreadState::Blocked(reason);
        tcb.wait.status = Status::Successful;
        tcb.wait.flags = if reason == BlockReason::Delay {
            WaitFlags::CLASS_DELAY | WaitFlags::BLOCKED
        } else {
            WaitFlags::BLOCKED
        };
        self.update_heirs();

        log_trace!("block {} {:?}", thread, reason);
        Ok(())
    }

    /// Change the real priority of a thread
    ///
    /// The change propagates through every resource the thread waits for.
    ///
    /// # Returns
    ///
    /// - `Ok(previous)` with the previous real priority
    /// - `Err(Status::InvalidPriority)` if the priority is out of range
    pub fn set_priority(&mut self, thread: ThreadId, priority: Priority) -> Result<Priority> {
        if priority > self.config.priority_maximum {
            return Err(Status::InvalidPriority);
        }

        let tcb = self.tcb_mut(thread);
        let previous = tcb.real_priority;
        let home = tcb.home_scheduler();
        tcb.real_priority = priority;

        self.update_thread_node(thread, home, PriorityNode::Real, NodeUpdate::Changed(priority, Placement::Append));
        self.update_heirs();

        log_trace!("set priority {} {} -> {}", thread, previous, priority);
        Ok(previous)
    }

    /// Move a ready thread behind its equals on its home scheduler
    pub fn yield_thread(&mut self, thread: ThreadId) {
        let home = self.thread(thread).home_scheduler();
        if !self.scheduler_mut(home).yield_thread(thread) {
            internal_error(FatalError::IneligibleScheduler, format_args!("yield of {} on {}", thread, home));
        }
        self.update_heirs();
    }

    /// ------------------------------------------------------------------------
    /// Heirs
    /// ------------------------------------------------------------------------

    /// Record the thread now executing on a scheduler's processor
    pub(crate) fn set_executing(&mut self, scheduler: SchedulerId, thread: Option<ThreadId>) {
        let preemptible = thread.and_then(|t| self.try_thread(t)).map_or(true, Tcb::is_preemptible);
        self.scheduler_mut(scheduler).set_executing(thread, preemptible);
    }

    /// Recompute the heir of every scheduler
    ///
    /// Schedulers choose in index order; a thread chosen by an earlier
    /// scheduler is skipped by the later ones.
    ///
    /// A thread executing on a scheduler's processor is kept there while
    /// it is ready on that scheduler, so no other scheduler takes it. If
    /// the scheduler chooses another heir, the thread is released and the
    /// choice is repeated.
    pub(crate) fn update_heirs(&mut self) {
        let mut kept: Vec<Option<ThreadId>> = self
            .schedulers
            .iter()
            .map(|sched| sched.executing().filter(|&thread| sched.contains(thread)))
            .collect();

        loop {
            let mut heirs: Vec<Option<ThreadId>> = Vec::with_capacity(self.schedulers.len());
            for (index, sched) in self.schedulers.iter().enumerate() {
                let heir = sched.select_heir(|thread| {
                    heirs.contains(&Some(thread))
                        || kept
                            .iter()
                            .enumerate()
                            .any(|(other, &executing)| other != index && executing == Some(thread))
                });
                heirs.push(heir);
            }

            let mut released = false;
            for (executing, heir) in kept.iter_mut().zip(&heirs) {
                if executing.is_some() && *executing != *heir {
                    *executing = None;
                    released = true;
                }
            }

            if !released {
                for (sched, heir) in self.schedulers.iter_mut().zip(heirs) {
                    sched.set_heir(heir);
                }
                return;
            }
        }
    }

    /// Link a ready thread into the ready queue of each eligible scheduler
    fn link_ready(&mut self, thread: ThreadId) {
        for index in 0..self.thread(thread).nodes.len() {
            let node = &self.thread(thread).nodes[index];
            let (scheduler, priority) = (node.scheduler, node.priority.priority_or(self.config.priority_maximum));
            self.scheduler_mut(scheduler).enqueue(thread, priority);
        }
    }

    /// Unlink a thread from every ready queue
    fn unlink_ready(&mut self, thread: ThreadId) {
        for index in 0..self.thread(thread).nodes.len() {
            let scheduler = self.thread(thread).nodes[index].scheduler;
            self.scheduler_mut(scheduler).extract(thread);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
