// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread Queues
//!
//! The blocking structure every synchronization object is built on. This
//! module holds the queue itself; the enqueue, extract, surrender and
//! flush operations live on [`crate::kernel::system::System`] because they
//! touch threads and schedulers too.
//!
//! # Design
//!
//! - **Sub-queues per scheduler**: A priority queue keeps one sub-queue for
//!   every scheduler that has at least one eligible waiter. A waiter sits in
//!   the sub-queue of each scheduler it is eligible on, ordered there by its
//!   priority on that scheduler, FIFO among equals.
//! - **Sub-queue chain**: A new sub-queue is appended to the chain. Blocking
//!   threads never move a sub-queue; only extraction does: a sub-queue that
//!   loses a waiter and is still non-empty goes to the end of the chain.
//! - **Unblock order**: The head of the first sub-queue.
//! - **FIFO discipline**: A single sub-queue, every waiter appended.
//! - **Owners**: Priority-inheritance queues lend each sub-queue's minimum
//!   to the owner on that sub-queue's scheduler. Ceiling queues lend the
//!   ceiling.
//!
//! # Usage
//!
//! ```rust,ignore
//! let queue = system.create_queue("mtx", Discipline::PriorityInherit)?;
//! system.seize(queue, owner)?;
//! system.enqueue(queue, waiter, Timeout::Forever)?;
//! assert_eq!(system.surrender(queue), Some(waiter));
//! ```

use alloc::vec::Vec;

use crate::kernel::priority::{Action, Placement, PriorityAggregation};
use crate::rustux::types::{Priority, QueueId, SchedulerId, ThreadId};

/// Magic number for thread queue validation
const THREAD_QUEUE_MAGIC: u32 = 0x5448_5251; // "THRQ" in hex

/// Priority every FIFO waiter is queued with
const FIFO_PRIORITY: Priority = 0;

/// ============================================================================
/// Discipline
/// ============================================================================

/// Queueing discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// Arrival order
    Fifo,

    /// Priority order, no owner protocol
    Priority,

    /// Priority order; the owner inherits the waiters' priorities
    PriorityInherit,

    /// Priority order; the owner runs at the ceiling
    PriorityCeiling(Priority),
}

impl Discipline {
    /// Check if waiters are ordered by priority
    pub const fn is_priority(self) -> bool {
        !matches!(self, Discipline::Fifo)
    }

    /// Ceiling priority, for ceiling queues
    pub const fn ceiling(self) -> Option<Priority> {
        match self {
            Discipline::PriorityCeiling(ceiling) => Some(ceiling),
            _ => None,
        }
    }
}

/// ============================================================================
/// Sub-Queue
/// ============================================================================

/// Waiters of one scheduler
#[derive(Debug, Clone)]
pub struct SubQueue {
    /// Scheduler served (`None` for the single FIFO sub-queue)
    scheduler: Option<SchedulerId>,

    /// Waiters in unblock order
    waiters: PriorityAggregation<ThreadId>,
}

impl SubQueue {
    /// Scheduler served
    pub fn scheduler(&self) -> Option<SchedulerId> {
        self.scheduler
    }

    /// Most urgent priority of the waiters
    pub fn priority(&self) -> Option<Priority> {
        self.waiters.effective_priority()
    }

    /// First waiter
    pub fn first(&self) -> Option<ThreadId> {
        self.waiters.first()
    }

    /// Waiters in unblock order
    pub fn waiters(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.waiters.contributors().map(|(thread, _)| thread)
    }

    /// Number of waiters
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Check if there are no waiters
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

/// ============================================================================
/// Thread Queue
/// ============================================================================

/// Thread queue
#[derive(Debug, Clone)]
pub struct ThreadQueue {
    /// Queue handle
    id: QueueId,

    /// Queue name
    name: &'static str,

    /// Queueing discipline
    discipline: Discipline,

    /// Thread owning the resource
    pub(crate) owner: Option<ThreadId>,

    /// Sub-queue chain
    heads: Vec<SubQueue>,

    /// Magic number for validation
    magic: u32,
}

impl ThreadQueue {
    /// Create an empty queue
    pub fn new(id: QueueId, name: &'static str, discipline: Discipline) -> Self {
        Self {
            id,
            name,
            discipline,
            owner: None,
            heads: Vec::new(),
            magic: THREAD_QUEUE_MAGIC,
        }
    }

    /// Queue handle
    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Queue name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queueing discipline
    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    /// Thread owning the resource
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner
    }

    /// Check if no thread waits
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Thread the next surrender unblocks
    pub fn first(&self) -> Option<ThreadId> {
        self.heads.first().and_then(SubQueue::first)
    }

    /// Sub-queues in chain order
    pub fn sub_queues(&self) -> &[SubQueue] {
        &self.heads
    }

    /// Sub-queue of a scheduler
    pub fn sub_queue(&self, scheduler: SchedulerId) -> Option<&SubQueue> {
        self.heads.iter().find(|head| head.scheduler == Some(scheduler))
    }

    /// Distinct waiters, sub-queue by sub-queue in chain order
    pub fn waiters(&self) -> Vec<ThreadId> {
        let mut waiters: Vec<ThreadId> = Vec::new();
        for thread in self.heads.iter().flat_map(SubQueue::waiters) {
            if !waiters.contains(&thread) {
                waiters.push(thread);
            }
        }
        waiters
    }

    /// Number of distinct waiters
    pub fn waiter_count(&self) -> usize {
        self.waiters().len()
    }

    /// Check if a thread waits in the sub-queue of a scheduler
    pub fn contains(&self, scheduler: Option<SchedulerId>, thread: ThreadId) -> bool {
        self.position(scheduler)
            .map_or(false, |index| self.heads[index].waiters.contains(thread))
    }

    /// Add a waiter to the sub-queue of a scheduler
    ///
    /// Creates the sub-queue at the end of the chain if needed. FIFO queues
    /// ignore `scheduler` and `priority`.
    ///
    /// # Returns
    ///
    /// The action on the sub-queue's aggregation
    pub(crate) fn insert_waiter(
        &mut self,
        scheduler: SchedulerId,
        thread: ThreadId,
        priority: Priority,
    ) -> Option<Action> {
        self.validate();

        let (scheduler, priority) = self.key(scheduler, priority);
        let index = match self.position(scheduler) {
            Some(index) => index,
            None => {
                self.heads.push(SubQueue {
                    scheduler,
                    waiters: PriorityAggregation::initialize_empty(),
                });
                self.heads.len() - 1
            }
        };

        self.heads[index].waiters.insert(thread, priority, Placement::Append)
    }

    /// Reposition a waiter whose priority on a scheduler changed
    ///
    /// # Returns
    ///
    /// The action on the sub-queue's aggregation
    pub(crate) fn change_waiter(
        &mut self,
        scheduler: SchedulerId,
        thread: ThreadId,
        priority: Priority,
        placement: Placement,
    ) -> Option<Action> {
        if !self.discipline.is_priority() {
            return None;
        }

        let index = self.position(Some(scheduler))?;
        self.heads[index].waiters.changed(thread, priority, placement)
    }

    /// Remove a waiter from the sub-queue of a scheduler
    ///
    /// An emptied sub-queue leaves the chain. With `rotate`, a sub-queue
    /// that still has waiters moves to the end of the chain.
    ///
    /// # Returns
    ///
    /// The action on the sub-queue's aggregation
    pub(crate) fn remove_waiter(&mut self, scheduler: SchedulerId, thread: ThreadId, rotate: bool) -> Option<Action> {
        self.validate();

        let (scheduler, _) = self.key(scheduler, FIFO_PRIORITY);
        let index = self.position(scheduler)?;
        let action = self.heads[index].waiters.extract(thread, Placement::Prepend);

        if self.heads[index].is_empty() {
            self.heads.remove(index);
        } else if rotate {
            let head = self.heads.remove(index);
            self.heads.push(head);
        }

        action
    }

    /// Most urgent waiter priority on a scheduler
    pub fn sub_queue_priority(&self, scheduler: SchedulerId) -> Option<Priority> {
        self.sub_queue(scheduler).and_then(SubQueue::priority)
    }

    fn key(&self, scheduler: SchedulerId, priority: Priority) -> (Option<SchedulerId>, Priority) {
        if self.discipline.is_priority() {
            (Some(scheduler), priority)
        } else {
            (None, FIFO_PRIORITY)
        }
    }

    fn position(&self, scheduler: Option<SchedulerId>) -> Option<usize> {
        self.heads.iter().position(|head| head.scheduler == scheduler)
    }

    fn validate(&self) {
        debug_assert_eq!(self.magic, THREAD_QUEUE_MAGIC, "thread queue {} corrupted", self.id);
    }
}

// ============================================================================
// Tests
// ============================================================================
