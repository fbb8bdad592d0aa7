// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Priority Propagation
//!
//! A change to one contributor of a thread's priority can change the
//! thread's place in a ready queue, in the sub-queue it waits in and, for
//! priority-inheritance queues, the priority of the queue's owner. The
//! owner may itself wait, so the change keeps walking until some step
//! leaves an effective priority unchanged.
//!
//! ```text
//! node update --> aggregation --Action--> ready queue
//!                                    \--> sub-queue --Action--> owner's node --> ...
//! ```
//!
//! Each step runs as one iteration of a loop; the chain length is bounded
//! by the owner chain, which deadlock detection keeps acyclic.

use crate::kernel::debug::{internal_error, FatalError};
use crate::kernel::priority::{Action, Placement};
use crate::kernel::sync::thread_queue::Discipline;
use crate::kernel::thread::PriorityNode;
use crate::rustux::types::{Priority, SchedulerId, ThreadId};

use super::System;

// Import logging macros
use crate::log_trace;

/// Update applied to one node of a thread's priority aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeUpdate {
    /// Add a contributor
    Insert(Priority, Placement),

    /// Remove a contributor
    Extract(Placement),

    /// Change the priority of a contributor
    Changed(Priority, Placement),
}

impl NodeUpdate {
    /// Update to apply to an owner whose waiters' aggregation acted
    pub(crate) fn from_action(action: Action) -> Self {
        match action {
            Action::Add(priority) => NodeUpdate::Insert(priority, Placement::Append),
            Action::Change { priority, placement } => NodeUpdate::Changed(priority, placement),
            Action::Remove => NodeUpdate::Extract(Placement::Prepend),
        }
    }
}

/// One pending step of a propagation
type Step = (ThreadId, SchedulerId, PriorityNode, NodeUpdate);

impl System {
    /// Apply an update to a node of a thread and propagate the effect
    ///
    /// # Arguments
    ///
    /// * `thread` - Thread whose priority changes
    /// * `scheduler` - Scheduler of the node to update
    /// * `node` - Contributor to insert, extract or change
    /// * `update` - Update to apply
    pub(crate) fn update_thread_node(
        &mut self,
        thread: ThreadId,
        scheduler: SchedulerId,
        node: PriorityNode,
        update: NodeUpdate,
    ) {
        let mut step: Option<Step> = Some((thread, scheduler, node, update));

        while let Some((thread, scheduler, node, update)) = step.take() {
            let action = match self.apply_to_aggregation(thread, scheduler, node, update) {
                Some(action) => action,
                None => break,
            };

            log_trace!("propagate {} {} {:?}: {:?}", thread, scheduler, node, action);

            self.update_ready(thread, scheduler, action);
            step = self.update_wait(thread, scheduler, action);
        }
    }

    /// Apply an update to the aggregation of one scheduler node
    ///
    /// Inserting into a missing node asks the scheduler for help; removing
    /// the last contributor of a helping node withdraws the help.
    fn apply_to_aggregation(
        &mut self,
        thread: ThreadId,
        scheduler: SchedulerId,
        node: PriorityNode,
        update: NodeUpdate,
    ) -> Option<Action> {
        let tcb = self.tcb_mut(thread);
        let home = tcb.home_scheduler();

        let action = match tcb.node_mut(scheduler) {
            Some(sched_node) => match update {
                NodeUpdate::Insert(priority, placement) => sched_node.priority.insert(node, priority, placement),
                NodeUpdate::Extract(placement) => sched_node.priority.extract(node, placement),
                NodeUpdate::Changed(priority, placement) => sched_node.priority.changed(node, priority, placement),
            },
            None => match update {
                NodeUpdate::Insert(priority, _) => {
                    self.ask_for_help(thread, scheduler, node, priority);
                    return Some(Action::Add(priority));
                }
                _ => internal_error(
                    FatalError::MissingNode,
                    format_args!("{} has no node on {} for {:?}", thread, scheduler, node),
                ),
            },
        };

        if action == Some(Action::Remove) {
            if scheduler == home {
                internal_error(FatalError::MissingNode, format_args!("{} lost its home priority", thread));
            }
            self.withdraw_help(thread, scheduler);
        }

        action
    }

    /// Carry an aggregation action into the scheduler's ready queue
    fn update_ready(&mut self, thread: ThreadId, scheduler: SchedulerId, action: Action) {
        if !self.thread(thread).state.is_ready() {
            return;
        }

        let sched = self.scheduler_mut(scheduler);
        let linked = match action {
            Action::Add(priority) => {
                sched.enqueue(thread, priority);
                true
            }
            Action::Change { priority, placement } => sched.update_priority(thread, priority, placement),
            Action::Remove => sched.extract(thread),
        };

        if !linked {
            internal_error(
                FatalError::IneligibleScheduler,
                format_args!("{} is ready but not linked on {}", thread, scheduler),
            );
        }
    }

    /// Carry an aggregation action into the thread queue the thread waits on
    ///
    /// # Returns
    ///
    /// The next step if the owner of a priority-inheritance queue is
    /// affected
    fn update_wait(&mut self, thread: ThreadId, scheduler: SchedulerId, action: Action) -> Option<Step> {
        let queue = self.thread(thread).wait.queue?;
        let discipline = self.queue(queue).discipline();
        if !discipline.is_priority() {
            return None;
        }

        let queue_action = match action {
            Action::Add(priority) => {
                self.tcb_mut(thread).wait.sub_queues.push(scheduler);
                self.queue_mut(queue).insert_waiter(scheduler, thread, priority)
            }
            Action::Change { priority, placement } => {
                self.queue_mut(queue).change_waiter(scheduler, thread, priority, placement)
            }
            Action::Remove => {
                self.tcb_mut(thread).wait.sub_queues.retain(|&sched| sched != scheduler);
                self.queue_mut(queue).remove_waiter(scheduler, thread, false)
            }
        }?;

        if discipline != Discipline::PriorityInherit {
            return None;
        }

        let owner = self.queue(queue).owner?;
        Some((owner, scheduler, PriorityNode::Queue(queue), NodeUpdate::from_action(queue_action)))
    }
}

// ============================================================================
// Tests
// ============================================================================
