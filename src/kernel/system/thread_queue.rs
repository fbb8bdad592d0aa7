// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread Queue Operations
//!
//! Blocking, unblocking and ownership transfer on thread queues.
//!
//! # Enqueue
//!
//! Enqueueing is split in two phases so that the thread can be extracted
//! by a timeout or another processor before it actually blocks:
//!
//! ```text
//! enqueue_prepare:  Ready --> Transient     flags INTEND_TO_BLOCK
//! enqueue_commit:   Transient --> Blocked   flags BLOCKED
//!   (extracted in between: flags READY_AGAIN, commit does nothing)
//! ```
//!
//! # Ownership
//!
//! - **Priority inheritance**: The owner gets one `Queue` contributor per
//!   sub-queue, on the sub-queue's scheduler
//! - **Priority ceiling**: The owner gets a `Ceiling` contributor on its
//!   home scheduler; a waiter is raised to the ceiling while it waits and
//!   keeps that contributor, renamed, when the queue is handed to it

use alloc::vec::Vec;

use crate::err::{Result, Status};
use crate::kernel::debug::{internal_error, FatalError};
use crate::kernel::priority::{Action, Placement};
use crate::kernel::sync::thread_queue::{Discipline, SubQueue, ThreadQueue};
use crate::kernel::thread::{BlockReason, PriorityNode, Tcb, ThreadState, Timeout, WaitFlags};
use crate::rustux::types::{Priority, QueueId, SchedulerId, ThreadId};

use super::{NodeUpdate, System};

// Import logging macros
use crate::{log_debug, log_trace};

impl System {
    /// ------------------------------------------------------------------------
    /// Queue Lifecycle
    /// ------------------------------------------------------------------------

    /// Create an empty thread queue
    ///
    /// # Returns
    ///
    /// - `Ok(queue)` on success
    /// - `Err(Status::InvalidPriority)` if a ceiling is out of range
    /// - `Err(Status::TooMany)` if the queue table is full
    pub fn create_queue(&mut self, name: &'static str, discipline: Discipline) -> Result<QueueId> {
        if discipline.ceiling().map_or(false, |ceiling| ceiling > self.config.priority_maximum) {
            return Err(Status::InvalidPriority);
        }

        let (index, generation) = self
            .queues
            .insert_with(|index, generation| ThreadQueue::new(QueueId::new(index, generation), name, discipline))?;
        let queue = QueueId::new(index, generation);

        log_debug!("created thread queue {} '{}' {:?}", queue, name, discipline);
        Ok(queue)
    }

    /// Delete a thread queue
    ///
    /// Every waiter is extracted with `Status::ObjectDeleted` and the owner
    /// loses the resource.
    ///
    /// # Returns
    ///
    /// Number of extracted waiters
    pub fn delete_queue(&mut self, queue: QueueId) -> usize {
        let count = self.flush(queue, Status::ObjectDeleted);

        if let Some(owner) = self.queue(queue).owner {
            self.release_ownership(queue, owner);
        }
        self.queues.remove(queue.index(), queue.generation());
        self.update_heirs();

        log_debug!("deleted thread queue {} ({} waiters)", queue, count);
        count
    }

    /// ------------------------------------------------------------------------
    /// Ownership
    /// ------------------------------------------------------------------------

    /// Take an unowned thread queue's resource without waiting
    ///
    /// # Returns
    ///
    /// - `Err(Status::Deadlock)` if the thread already owns it
    /// - `Err(Status::Unavailable)` if another thread owns it
    /// - `Err(Status::CeilingViolated)` if the thread is more urgent than
    ///   the queue's ceiling
    pub fn seize(&mut self, queue: QueueId, thread: ThreadId) -> Result {
        let tq = self.queue(queue);
        match tq.owner {
            Some(owner) if owner == thread => return Err(Status::Deadlock),
            Some(_) => return Err(Status::Unavailable),
            None => {}
        }

        if let Some(ceiling) = tq.discipline().ceiling() {
            if self.thread(thread).current_priority() < ceiling {
                return Err(Status::CeilingViolated);
            }
        }

        self.acquire_ownership(queue, thread);
        self.update_heirs();

        log_trace!("{} seized {}", thread, queue);
        Ok(())
    }

    /// Give up a resource the thread owns
    ///
    /// # Returns
    ///
    /// - `Ok(next)` with the new owner, if a thread waited
    /// - `Err(Status::NotOwner)` if the thread does not own the resource
    pub fn release(&mut self, queue: QueueId, thread: ThreadId) -> Result<Option<ThreadId>> {
        if self.queue(queue).owner != Some(thread) {
            return Err(Status::NotOwner);
        }

        Ok(self.surrender(queue))
    }

    /// Make a thread the owner and lend it the queue's priorities
    fn acquire_ownership(&mut self, queue: QueueId, thread: ThreadId) {
        self.queue_mut(queue).owner = Some(thread);
        self.tcb_mut(thread).resource_count += 1;

        match self.queue(queue).discipline() {
            Discipline::PriorityCeiling(ceiling) => {
                let home = self.thread(thread).home_scheduler();
                self.update_thread_node(
                    thread,
                    home,
                    PriorityNode::Ceiling(queue),
                    NodeUpdate::Insert(ceiling, Placement::Append),
                );
            }
            Discipline::PriorityInherit => {
                for (scheduler, priority) in self.sub_queue_priorities(queue) {
                    self.update_thread_node(
                        thread,
                        scheduler,
                        PriorityNode::Queue(queue),
                        NodeUpdate::Insert(priority, Placement::Append),
                    );
                }
            }
            Discipline::Fifo | Discipline::Priority => {}
        }
    }

    /// Take the resource and the lent priorities away from the owner
    fn release_ownership(&mut self, queue: QueueId, owner: ThreadId) {
        match self.queue(queue).discipline() {
            Discipline::PriorityCeiling(_) => {
                let home = self.thread(owner).home_scheduler();
                self.update_thread_node(
                    owner,
                    home,
                    PriorityNode::Ceiling(queue),
                    NodeUpdate::Extract(Placement::Prepend),
                );
            }
            Discipline::PriorityInherit => {
                for (scheduler, _) in self.sub_queue_priorities(queue) {
                    self.update_thread_node(
                        owner,
                        scheduler,
                        PriorityNode::Queue(queue),
                        NodeUpdate::Extract(Placement::Prepend),
                    );
                }
            }
            Discipline::Fifo | Discipline::Priority => {}
        }

        self.queue_mut(queue).owner = None;
        let tcb = self.tcb_mut(owner);
        tcb.resource_count = tcb.resource_count.saturating_sub(1);
    }

    /// Hand the resource to a thread just extracted from the queue
    fn hand_over(&mut self, queue: QueueId, thread: ThreadId) {
        if let Discipline::PriorityCeiling(_) = self.queue(queue).discipline() {
            self.queue_mut(queue).owner = Some(thread);
            let tcb = self.tcb_mut(thread);
            tcb.resource_count += 1;

            let home = tcb.home_scheduler();
            let renamed = tcb
                .node_mut(home)
                .map_or(false, |node| node.priority.replace(PriorityNode::WaitCeiling(queue), PriorityNode::Ceiling(queue)));
            if !renamed {
                internal_error(
                    FatalError::MissingNode,
                    format_args!("{} handed {} without its ceiling", thread, queue),
                );
            }
        } else {
            self.acquire_ownership(queue, thread);
        }

        log_trace!("{} handed to {}", queue, thread);
    }

    /// `(scheduler, priority)` of every priority sub-queue in chain order
    fn sub_queue_priorities(&self, queue: QueueId) -> Vec<(SchedulerId, Priority)> {
        self.queue(queue)
            .sub_queues()
            .iter()
            .filter_map(|head| Some((head.scheduler()?, head.priority()?)))
            .collect()
    }

    /// Check if blocking on `queue` would close a cycle of owners
    fn would_deadlock(&self, queue: QueueId, thread: ThreadId) -> bool {
        let mut owner = self.queue(queue).owner;

        for _ in 0..=self.threads.count() {
            let current = match owner {
                Some(current) => current,
                None => return false,
            };
            if current == thread {
                return true;
            }
            owner = self
                .thread(current)
                .wait
                .queue
                .and_then(|next| self.queue(next).owner);
        }

        true
    }

    /// ------------------------------------------------------------------------
    /// Enqueue
    /// ------------------------------------------------------------------------

    /// Enqueue a ready thread and block it
    ///
    /// # Returns
    ///
    /// The status of [`System::enqueue_prepare`]. The wait status is
    /// available from the thread once it is extracted.
    pub fn enqueue(&mut self, queue: QueueId, thread: ThreadId, timeout: Timeout) -> Result {
        self.enqueue_prepare(queue, thread, timeout)?;
        self.enqueue_commit(thread);
        Ok(())
    }

    /// First phase of an enqueue: link the thread into the queue
    ///
    /// The thread stays ready until [`System::enqueue_commit`].
    ///
    /// # Returns
    ///
    /// - `Err(Status::Deadlock)` if the thread owns the queue or blocking
    ///   would close a cycle of owners
    /// - `Err(Status::NotReady)` for `Timeout::NoWait`
    /// - `Err(Status::CeilingViolated)` if the thread is more urgent than
    ///   the queue's ceiling
    pub fn enqueue_prepare(&mut self, queue: QueueId, thread: ThreadId, timeout: Timeout) -> Result {
        let tcb = self.thread(thread);
        if tcb.state != ThreadState::Ready {
            internal_error(
                FatalError::InvalidState,
                format_args!("enqueue of {} in state {:?}", thread, tcb.state),
            );
        }

        let tq = self.queue(queue);
        let discipline = tq.discipline();
        if tq.owner == Some(thread) {
            return Err(Status::Deadlock);
        }
        if timeout == Timeout::NoWait {
            return Err(Status::NotReady);
        }
        if let Some(ceiling) = discipline.ceiling() {
            if tcb.current_priority() < ceiling {
                return Err(Status::CeilingViolated);
            }
        }
        if self.would_deadlock(queue, thread) {
            return Err(Status::Deadlock);
        }

        let tcb = self.tcb_mut(thread);
        let home = tcb.home_scheduler();
        tcb.state = ThreadState::Transient;
        tcb.wait.queue = Some(queue);
        tcb.wait.flags = WaitFlags::CLASS_OBJECT | WaitFlags::INTEND_TO_BLOCK;
        tcb.wait.timeout = timeout;
        tcb.wait.status = Status::Successful;
        tcb.wait.sub_queues.clear();

        if let Some(ceiling) = discipline.ceiling() {
            self.update_thread_node(
                thread,
                home,
                PriorityNode::WaitCeiling(queue),
                NodeUpdate::Insert(ceiling, Placement::Append),
            );
        }

        if discipline.is_priority() {
            let tcb = self.thread(thread);
            let nodes: Vec<(SchedulerId, Priority)> = tcb
                .nodes
                .iter()
                .map(|node| (node.scheduler, node.priority.priority_or(tcb.real_priority)))
                .collect();

            for (scheduler, priority) in nodes {
                self.link_waiter(queue, thread, scheduler, priority);
            }
        } else {
            let priority = self.thread(thread).current_priority();
            self.link_waiter(queue, thread, home, priority);
        }

        self.update_heirs();

        log_trace!("{} enqueued on {} {:?}", thread, queue, timeout);
        Ok(())
    }

    /// Second phase of an enqueue: block the thread
    ///
    /// # Returns
    ///
    /// `false` if the thread was extracted since
    /// [`System::enqueue_prepare`] and stays ready
    pub fn enqueue_commit(&mut self, thread: ThreadId) -> bool {
        let tcb = self.tcb_mut(thread);
        if tcb.wait.flags.wait_state() != WaitFlags::INTEND_TO_BLOCK {
            log_trace!("{} ready again before blocking", thread);
            return false;
        }

        tcb.wait.flags = tcb.wait.flags.with_state(WaitFlags::BLOCKED);
        tcb.state = ThreadState::Blocked(BlockReason::ThreadQueue);
        self.unlink_ready(thread);
        self.update_heirs();

        log_trace!("{} blocked", thread);
        true
    }

    /// Add a waiter to the sub-queue of one scheduler
    fn link_waiter(&mut self, queue: QueueId, thread: ThreadId, scheduler: SchedulerId, priority: Priority) {
        self.tcb_mut(thread).wait.sub_queues.push(scheduler);
        let action = self.queue_mut(queue).insert_waiter(scheduler, thread, priority);

        self.propagate_to_owner(queue, scheduler, action);
    }

    /// Lend a sub-queue's changed priority to the owner
    fn propagate_to_owner(&mut self, queue: QueueId, scheduler: SchedulerId, action: Option<Action>) {
        let tq = self.queue(queue);
        if tq.discipline() != Discipline::PriorityInherit {
            return;
        }

        if let (Some(owner), Some(action)) = (tq.owner, action) {
            self.update_thread_node(owner, scheduler, PriorityNode::Queue(queue), NodeUpdate::from_action(action));
        }
    }

    /// ------------------------------------------------------------------------
    /// Extract
    /// ------------------------------------------------------------------------

    /// Extract a waiting thread and make it ready
    ///
    /// # Arguments
    ///
    /// * `queue` - Queue the thread waits on
    /// * `thread` - Waiting thread
    /// * `status` - Wait-completion status for the thread
    pub fn extract(&mut self, queue: QueueId, thread: ThreadId, status: Status) {
        if self.thread(thread).wait.queue != Some(queue) {
            internal_error(FatalError::NotWaiting, format_args!("{} on {}", thread, queue));
        }

        self.extract_thread(thread, status, false);
        self.update_heirs();
    }

    /// Timeout event of a waiting or delayed thread
    ///
    /// # Returns
    ///
    /// `false` if the thread was no longer waiting
    pub fn timeout(&mut self, thread: ThreadId) -> bool {
        if self.thread(thread).wait.queue.is_none() {
            if self.thread(thread).state != ThreadState::Blocked(BlockReason::Delay) {
                return false;
            }

            self.tcb_mut(thread).wait.status = Status::Timeout;
            return self.ready(thread).is_ok();
        }

        self.extract_thread(thread, Status::Timeout, false);
        self.update_heirs();

        log_trace!("{} timed out", thread);
        true
    }

    /// Remove a thread from its queue and make it ready
    ///
    /// Sub-queues that still have waiters move to the end of the chain.
    /// With `keep_wait_ceiling`, the raised ceiling stays for a hand-off.
    pub(crate) fn extract_thread(&mut self, thread: ThreadId, status: Status, keep_wait_ceiling: bool) {
        let tcb = self.tcb_mut(thread);
        let queue = match tcb.wait.queue {
            Some(queue) => queue,
            None => internal_error(FatalError::NotWaiting, format_args!("{}", thread)),
        };
        let blocked = tcb.wait.flags.wait_state() == WaitFlags::BLOCKED;
        let home = tcb.home_scheduler();
        let sub_queues = core::mem::take(&mut tcb.wait.sub_queues);

        for scheduler in sub_queues {
            let action = self.queue_mut(queue).remove_waiter(scheduler, thread, true);
            self.propagate_to_owner(queue, scheduler, action);
        }

        let tcb = self.tcb_mut(thread);
        tcb.wait.queue = None;
        tcb.wait.status = status;
        tcb.wait.flags = tcb.wait.flags.with_state(WaitFlags::READY_AGAIN);

        if !keep_wait_ceiling && self.queue(queue).discipline().ceiling().is_some() {
            self.update_thread_node(
                thread,
                home,
                PriorityNode::WaitCeiling(queue),
                NodeUpdate::Extract(Placement::Prepend),
            );
        }

        self.tcb_mut(thread).state = ThreadState::Ready;
        if blocked {
            self.link_ready(thread);
        }

        log_trace!("{} extracted from {}: {}", thread, queue, status);
    }

    /// ------------------------------------------------------------------------
    /// Surrender and Flush
    /// ------------------------------------------------------------------------

    /// Unblock the first waiter and hand it the resource
    ///
    /// Without waiters, the owner just loses the resource.
    ///
    /// # Returns
    ///
    /// The unblocked thread, if any
    pub fn surrender(&mut self, queue: QueueId) -> Option<ThreadId> {
        let tq = self.queue(queue);
        let previous = tq.owner;

        let first = match tq.first() {
            Some(first) => first,
            None => {
                if let Some(owner) = previous {
                    self.release_ownership(queue, owner);
                    self.update_heirs();
                }
                return None;
            }
        };

        match previous {
            Some(owner) => {
                self.release_ownership(queue, owner);
                self.extract_thread(first, Status::Successful, true);
                self.hand_over(queue, first);
            }
            None => self.extract_thread(first, Status::Successful, false),
        }
        self.update_heirs();

        log_trace!("{} surrendered to {}", queue, first);
        Some(first)
    }

    /// Extract every waiter
    ///
    /// Ownership does not change.
    ///
    /// # Returns
    ///
    /// Number of extracted waiters
    pub fn flush(&mut self, queue: QueueId, status: Status) -> usize {
        let mut count = 0;
        while let Some(first) = self.queue(queue).first() {
            self.extract_thread(first, status, false);
            count += 1;
        }
        self.update_heirs();

        if count > 0 {
            log_trace!("flushed {} waiters of {}", count, queue);
        }
        count
    }

    /// Extract the waiters a filter accepts
    ///
    /// Waiters are offered to the filter in unblock order.
    ///
    /// # Returns
    ///
    /// Number of extracted waiters
    pub fn flush_filtered(&mut self, queue: QueueId, status: Status, mut filter: impl FnMut(&Tcb) -> bool) -> usize {
        let mut count = 0;
        for thread in self.queue(queue).waiters() {
            if self.thread(thread).wait.queue == Some(queue) && filter(self.thread(thread)) {
                self.extract_thread(thread, status, false);
                count += 1;
            }
        }
        self.update_heirs();
        count
    }

    /// ------------------------------------------------------------------------
    /// Queries
    /// ------------------------------------------------------------------------

    /// Thread the next surrender unblocks
    pub fn first(&self, queue: QueueId) -> Option<ThreadId> {
        self.queue(queue).first()
    }

    /// Sub-queue of a scheduler
    pub fn sub_queue(&self, queue: QueueId, scheduler: SchedulerId) -> Option<&SubQueue> {
        self.queue(queue).sub_queue(scheduler)
    }
}

// ============================================================================
// Tests
// ============================================================================
