// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread Control Blocks
//!
//! A thread control block holds everything the dispatch core knows about a
//! thread: its state, its priorities per scheduler and the thread queue it
//! waits on.
//!
//! # Design
//!
//! - **Scheduler nodes**: One node per eligible scheduler, the home
//!   scheduler first. Each node is a priority aggregation whose contributors
//!   are the thread's real priority (home node only) and whatever its owned
//!   resources lend it.
//! - **Helping**: A node for a foreign scheduler exists exactly while some
//!   resource lends the thread a priority for that scheduler.
//! - **Wait record**: The queue waited on, the wait flags, the schedulers
//!   whose sub-queues hold the thread and the wait-completion status.
//!
//! # Thread States
//!
//! ```text
//! Dormant -> Ready <-> Transient -> Blocked -> Ready
//!              |  ^                    |
//!              v  |                    v
//!            Suspended               Zombie
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let attributes = ThreadAttributes::new("worker", 10).non_preemptible();
//! let thread = system.create_thread(attributes)?;
//! system.start_thread(thread)?;
//! ```

use alloc::vec::Vec;

use bitflags::bitflags;

use crate::err::Status;
use crate::kernel::priority::PriorityAggregation;
use crate::rustux::types::{Priority, QueueId, SchedulerId, ThreadId};

/// ============================================================================
/// Thread State
/// ============================================================================

/// Thread states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Created but not yet started
    Dormant,

    /// Ready to run (linked in the ready queues)
    Ready,

    /// Blocked; not in any ready queue
    Blocked(BlockReason),

    /// Suspended by request
    Suspended,

    /// About to block on a thread queue; still ready
    Transient,

    /// Deleted, waiting to be reclaimed
    Zombie,
}

impl ThreadState {
    /// Check if the thread is linked in its ready queues
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::Transient)
    }

    /// Check if the thread is blocked
    pub const fn is_blocked(self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    /// Check if thread is alive
    pub const fn is_alive(self) -> bool {
        !matches!(self, Self::Zombie)
    }
}

/// Reason for thread being blocked
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Waiting on a thread queue
    ThreadQueue = 0,

    /// Delayed until a timeout event
    Delay = 1,

    /// Waiting for an event set
    Event = 2,

    /// Blocked for another reason known to the caller
    Other = 3,
}

/// ============================================================================
/// Wait Record
/// ============================================================================

bitflags! {
    /// Wait flags
    ///
    /// Exactly one of the state bits is set while a wait is in progress.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WaitFlags: u32 {
        /// Enqueued, not yet blocked
        const INTEND_TO_BLOCK = 1 << 0;

        /// Blocked
        const BLOCKED = 1 << 1;

        /// Extracted; the wait is over
        const READY_AGAIN = 1 << 2;

        /// Waiting on a thread queue
        const CLASS_OBJECT = 1 << 8;

        /// Waiting for a timeout only
        const CLASS_DELAY = 1 << 9;
    }
}

impl WaitFlags {
    /// State bits
    pub const STATE_MASK: WaitFlags = WaitFlags::INTEND_TO_BLOCK
        .union(WaitFlags::BLOCKED)
        .union(WaitFlags::READY_AGAIN);

    /// State bits only
    pub fn wait_state(self) -> WaitFlags {
        self.intersection(Self::STATE_MASK)
    }

    /// Replace the state bits, keeping the class bits
    pub fn with_state(self, state: WaitFlags) -> WaitFlags {
        self.difference(Self::STATE_MASK).union(state)
    }
}

/// Wait timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait until extracted
    Forever,

    /// Do not wait at all
    NoWait,

    /// Wait until extracted or the timeout event after this many ticks
    Ticks(u32),
}

/// Wait record
#[derive(Debug, Clone)]
pub struct ThreadWait {
    /// Thread queue waited on
    pub(crate) queue: Option<QueueId>,

    /// Wait flags
    pub(crate) flags: WaitFlags,

    /// Timeout requested for the current wait
    pub(crate) timeout: Timeout,

    /// Schedulers whose sub-queue of `queue` holds this thread
    pub(crate) sub_queues: Vec<SchedulerId>,

    /// Wait-completion status
    pub(crate) status: Status,
}

impl ThreadWait {
    const fn new() -> Self {
        Self {
            queue: None,
            flags: WaitFlags::empty(),
            timeout: Timeout::Forever,
            sub_queues: Vec::new(),
            status: Status::Successful,
        }
    }
}

/// ============================================================================
/// Priority Nodes
/// ============================================================================

/// Identity of a node in a thread's priority aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PriorityNode {
    /// The thread's real priority
    Real,

    /// Waiters of a priority-inheritance queue the thread owns
    Queue(QueueId),

    /// Ceiling of a priority-ceiling queue the thread owns
    Ceiling(QueueId),

    /// Ceiling applied while the thread waits on a ceiling queue
    WaitCeiling(QueueId),
}

/// Priority of a thread on one scheduler
#[derive(Debug, Clone)]
pub struct SchedulerNode {
    /// Scheduler this node belongs to
    pub(crate) scheduler: SchedulerId,

    /// Contributors to the thread's priority on this scheduler
    pub(crate) priority: PriorityAggregation<PriorityNode>,
}

impl SchedulerNode {
    /// Scheduler this node belongs to
    pub fn scheduler(&self) -> SchedulerId {
        self.scheduler
    }

    /// Effective priority on this scheduler
    pub fn priority(&self) -> Option<Priority> {
        self.priority.effective_priority()
    }

    /// Contributors to the priority
    pub fn aggregation(&self) -> &PriorityAggregation<PriorityNode> {
        &self.priority
    }
}

/// ============================================================================
/// Thread Attributes
/// ============================================================================

/// Thread creation attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAttributes {
    /// Thread name (for diagnostics)
    pub name: &'static str,

    /// Real priority
    pub priority: Priority,

    /// Home scheduler (first scheduler if `None`)
    pub scheduler: Option<SchedulerId>,

    /// Whether the thread may be preempted
    pub preemptible: bool,
}

impl ThreadAttributes {
    /// Preemptible thread on the first scheduler
    pub const fn new(name: &'static str, priority: Priority) -> Self {
        Self {
            name,
            priority,
            scheduler: None,
            preemptible: true,
        }
    }

    /// Select the home scheduler
    pub const fn on_scheduler(mut self, scheduler: SchedulerId) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Keep the processor while ready
    pub const fn non_preemptible(mut self) -> Self {
        self.preemptible = false;
        self
    }
}

/// ============================================================================
/// Thread Control Block
/// ============================================================================

/// Thread control block
#[derive(Debug, Clone)]
pub struct Tcb {
    /// Thread handle
    pub(crate) id: ThreadId,

    /// Thread name
    pub(crate) name: &'static str,

    /// Thread state
    pub(crate) state: ThreadState,

    /// Real priority
    pub(crate) real_priority: Priority,

    /// Scheduler nodes, home first
    pub(crate) nodes: Vec<SchedulerNode>,

    /// Wait record
    pub(crate) wait: ThreadWait,

    /// Number of owned thread queues
    pub(crate) resource_count: u32,

    /// Whether the thread may be preempted
    pub(crate) preemptible: bool,
}

impl Tcb {
    /// Create a dormant thread
    pub(crate) fn new(id: ThreadId, attributes: &ThreadAttributes, home: SchedulerId) -> Self {
        Self {
            id,
            name: attributes.name,
            state: ThreadState::Dormant,
            real_priority: attributes.priority,
            nodes: alloc::vec![SchedulerNode {
                scheduler: home,
                priority: PriorityAggregation::initialize_one(PriorityNode::Real, attributes.priority),
            }],
            wait: ThreadWait::new(),
            resource_count: 0,
            preemptible: attributes.preemptible,
        }
    }

    /// Thread handle
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Thread name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Thread state
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Real priority
    pub fn real_priority(&self) -> Priority {
        self.real_priority
    }

    /// Home scheduler
    pub fn home_scheduler(&self) -> SchedulerId {
        self.nodes[0].scheduler
    }

    /// Effective priority on the home scheduler
    pub fn current_priority(&self) -> Priority {
        self.nodes[0].priority.priority_or(self.real_priority)
    }

    /// Effective priority on a scheduler, if eligible there
    pub fn priority(&self, scheduler: SchedulerId) -> Option<Priority> {
        self.node(scheduler).and_then(SchedulerNode::priority)
    }

    /// Schedulers the thread is eligible on, home first
    pub fn eligible_schedulers(&self) -> impl Iterator<Item = SchedulerId> + '_ {
        self.nodes.iter().map(|node| node.scheduler)
    }

    /// Check if the thread is eligible on a scheduler
    pub fn is_eligible(&self, scheduler: SchedulerId) -> bool {
        self.node(scheduler).is_some()
    }

    /// Scheduler nodes, home first
    pub fn nodes(&self) -> &[SchedulerNode] {
        &self.nodes
    }

    /// Node of a scheduler
    pub fn node(&self, scheduler: SchedulerId) -> Option<&SchedulerNode> {
        self.nodes.iter().find(|node| node.scheduler == scheduler)
    }

    pub(crate) fn node_mut(&mut self, scheduler: SchedulerId) -> Option<&mut SchedulerNode> {
        self.nodes.iter_mut().find(|node| node.scheduler == scheduler)
    }

    /// Thread queue the thread waits on
    pub fn waiting_on(&self) -> Option<QueueId> {
        self.wait.queue
    }

    /// Wait flags
    pub fn wait_flags(&self) -> WaitFlags {
        self.wait.flags
    }

    /// Timeout of the current or last wait
    pub fn wait_timeout(&self) -> Timeout {
        self.wait.timeout
    }

    /// Status the last wait completed with
    pub fn wait_status(&self) -> Status {
        self.wait.status
    }

    /// Schedulers whose sub-queues hold the thread
    pub fn contributed_sub_queues(&self) -> &[SchedulerId] {
        &self.wait.sub_queues
    }

    /// Number of owned thread queues
    pub fn resource_count(&self) -> u32 {
        self.resource_count
    }

    /// Whether the thread may be preempted
    pub fn is_preemptible(&self) -> bool {
        self.preemptible
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(ThreadState::Ready.is_ready());
        assert!(ThreadState::Transient.is_ready());
        assert!(!ThreadState::Blocked(BlockReason::Delay).is_ready());
        assert!(ThreadState::Blocked(BlockReason::ThreadQueue).is_blocked());
        assert!(!ThreadState::Zombie.is_alive());
    }

    #[test]
    fn test_wait_flags_state() {
        let flags = WaitFlags::CLASS_OBJECT | WaitFlags::INTEND_TO_BLOCK;
        assert_eq!(flags.wait_state(), WaitFlags::INTEND_TO_BLOCK);

        let flags = flags.with_state(WaitFlags::READY_AGAIN);
        assert_eq!(flags.wait_state(), WaitFlags::READY_AGAIN);
        assert!(flags.contains(WaitFlags::CLASS_OBJECT));
    }

    #[test]
    fn test_new_tcb() {
        let attributes = ThreadAttributes::new("worker", 12).non_preemptible();
        let tcb = Tcb::new(ThreadId::new(0, 0), &attributes, SchedulerId(1));

        assert_eq!(tcb.state(), ThreadState::Dormant);
        assert_eq!(tcb.home_scheduler(), SchedulerId(1));
        assert_eq!(tcb.current_priority(), 12);
        assert_eq!(tcb.priority(SchedulerId(1)), Some(12));
        assert_eq!(tcb.priority(SchedulerId(0)), None);
        assert!(!tcb.is_preemptible());
        assert_eq!(tcb.wait_status(), Status::Successful);
        assert_eq!(tcb.eligible_schedulers().count(), 1);
    }
}
