// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduler Helping
//!
//! A thread that owns a resource wanted by a thread of another scheduler
//! becomes eligible on that scheduler too, with the priority the waiter
//! lends it there. The foreign scheduler then "helps" the owner make
//! progress. The helping node goes away with the last contribution.

use crate::kernel::debug::{internal_error, FatalError};
use crate::kernel::priority::PriorityAggregation;
use crate::kernel::system::System;
use crate::kernel::thread::{PriorityNode, SchedulerNode};
use crate::rustux::types::{Priority, SchedulerId, ThreadId};

// Import logging macros
use crate::log_debug;

impl System {
    /// Make a thread eligible on a foreign scheduler
    ///
    /// # Arguments
    ///
    /// * `thread` - Thread to help
    /// * `scheduler` - Helping scheduler
    /// * `node` - First contributor of the helping node
    /// * `priority` - Priority lent by that contributor
    pub(crate) fn ask_for_help(&mut self, thread: ThreadId, scheduler: SchedulerId, node: PriorityNode, priority: Priority) {
        self.scheduler(scheduler);

        let tcb = self.tcb_mut(thread);
        if tcb.is_eligible(scheduler) {
            internal_error(
                FatalError::IneligibleScheduler,
                format_args!("{} already eligible on {}", thread, scheduler),
            );
        }

        tcb.nodes.push(SchedulerNode {
            scheduler,
            priority: PriorityAggregation::initialize_one(node, priority),
        });

        log_debug!("{} helps {} prio={}", scheduler, thread, priority);
    }

    /// Drop the helping node of a foreign scheduler
    pub(crate) fn withdraw_help(&mut self, thread: ThreadId, scheduler: SchedulerId) {
        let tcb = self.tcb_mut(thread);
        if tcb.home_scheduler() == scheduler {
            internal_error(
                FatalError::IneligibleScheduler,
                format_args!("withdraw of home {} from {}", scheduler, thread),
            );
        }

        let before = tcb.nodes.len();
        tcb.nodes.retain(|node| node.scheduler != scheduler);
        if tcb.nodes.len() == before {
            internal_error(FatalError::MissingNode, format_args!("{} not helped by {}", thread, scheduler));
        }

        log_debug!("{} no longer helps {}", scheduler, thread);
    }

    /// Foreign schedulers a thread is currently eligible on
    pub fn helping_schedulers(&self, thread: ThreadId) -> impl Iterator<Item = SchedulerId> + '_ {
        self.thread(thread).nodes.iter().skip(1).map(SchedulerNode::scheduler)
    }
}

// ============================================================================
// Tests
// ============================================================================
