// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduler Instances
//!
//! A scheduler instance owns one processor and one ready queue. It keeps
//! track of the thread executing on its processor and of the heir, the
//! thread that should execute there next.
//!
//! # Design
//!
//! - **Priority-based**: The ready queue is ordered by the priority each
//!   thread has on this scheduler (lower value = more urgent)
//! - **FIFO among equals**: Ties go by arrival order unless a priority
//!   change asks for the thread to be prepended
//! - **Non-preemptible executing threads**: They stay heir while ready
//! - **No cross-scheduler knowledge**: Arbitration between schedulers that
//!   share a helping thread happens in [`crate::kernel::system`]
//!
//! # States
//!
//! ```text
//! Idle (ready queue empty) <--enqueue/extract/update_priority--> Has-Heir
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! scheduler.enqueue(thread, 10);
//! scheduler.update_priority(thread, 5, Placement::Append);
//! assert_eq!(scheduler.heir(), Some(thread));
//! ```

pub mod help;

use crate::kernel::config::SchedulerConfig;
use crate::kernel::priority::{Placement, PriorityQueue};
use crate::rustux::types::{CpuIndex, Priority, SchedulerId, ThreadId};

// Import logging macros
use crate::log_trace;

/// ============================================================================
/// Scheduler Instance
/// ============================================================================

/// Scheduler instance
#[derive(Debug)]
pub struct SchedulerInstance {
    /// Scheduler index
    id: SchedulerId,

    /// Scheduler name
    name: &'static str,

    /// Processor owned by this scheduler
    cpu: CpuIndex,

    /// Ready threads in priority order
    ready: PriorityQueue<ThreadId>,

    /// Thread selected to execute next
    heir: Option<ThreadId>,

    /// Thread executing on the processor
    executing: Option<ThreadId>,

    /// Whether the executing thread may be preempted
    executing_preemptible: bool,

    /// Statistics
    stats: SchedulerStats,
}

impl SchedulerInstance {
    /// Create an idle scheduler
    pub fn new(id: SchedulerId, config: &SchedulerConfig) -> Self {
        Self {
            id,
            name: config.name,
            cpu: config.cpu,
            ready: PriorityQueue::new(),
            heir: None,
            executing: None,
            executing_preemptible: true,
            stats: SchedulerStats::new(),
        }
    }

    /// Scheduler index
    pub fn id(&self) -> SchedulerId {
        self.id
    }

    /// Scheduler name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Processor owned by this scheduler
    pub fn cpu(&self) -> CpuIndex {
        self.cpu
    }

    /// Thread selected to execute next
    pub fn heir(&self) -> Option<ThreadId> {
        self.heir
    }

    /// Thread executing on the processor
    pub fn executing(&self) -> Option<ThreadId> {
        self.executing
    }

    /// Check if no thread is ready
    pub fn is_idle(&self) -> bool {
        self.ready.is_empty()
    }

    /// Number of ready threads
    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// Ready threads from most to least urgent
    pub fn ready_threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.ready.iter().map(|(thread, _)| thread)
    }

    /// Check if a thread is in the ready queue
    pub fn contains(&self, thread: ThreadId) -> bool {
        self.ready.contains(thread)
    }

    /// Priority a ready thread is queued with
    pub fn priority_of(&self, thread: ThreadId) -> Option<Priority> {
        self.ready.priority_of(thread)
    }

    /// Statistics
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Add a thread to the ready queue behind its equals
    ///
    /// # Arguments
    ///
    /// * `thread` - Thread to add
    /// * `priority` - Priority of the thread on this scheduler
    pub fn enqueue(&mut self, thread: ThreadId, priority: Priority) {
        self.enqueue_with(thread, priority, Placement::Append);
    }

    /// Add a thread to the ready queue with an explicit tie placement
    pub fn enqueue_with(&mut self, thread: ThreadId, priority: Priority, placement: Placement) {
        self.ready.insert(thread, priority, placement);
        self.stats.enqueues += 1;

        log_trace!("{}: enqueue {} prio={}", self.name, thread, priority);

        self.update_heir();
    }

    /// Remove a thread from the ready queue
    ///
    /// # Returns
    ///
    /// `false` if the thread was not ready here
    pub fn extract(&mut self, thread: ThreadId) -> bool {
        if self.ready.remove(thread).is_none() {
            return false;
        }
        self.stats.extracts += 1;

        log_trace!("{}: extract {}", self.name, thread);

        self.update_heir();
        true
    }

    /// Reposition a ready thread whose priority changed
    ///
    /// # Arguments
    ///
    /// * `thread` - Ready thread
    /// * `priority` - New priority on this scheduler
    /// * `placement` - Position among threads of the new priority
    ///
    /// # Returns
    ///
    /// `false` if the thread was not ready here
    pub fn update_priority(&mut self, thread: ThreadId, priority: Priority, placement: Placement) -> bool {
        if !self.ready.change(thread, priority, placement) {
            return false;
        }
        self.stats.priority_updates += 1;

        log_trace!("{}: update {} prio={} {:?}", self.name, thread, priority, placement);

        self.update_heir();
        true
    }

    /// Move a ready thread behind all threads of its priority
    ///
    /// # Returns
    ///
    /// `false` if the thread was not ready here
    pub fn yield_thread(&mut self, thread: ThreadId) -> bool {
        let priority = match self.ready.priority_of(thread) {
            Some(priority) => priority,
            None => return false,
        };

        self.ready.insert(thread, priority, Placement::Append);
        self.stats.yields += 1;

        log_trace!("{}: yield {}", self.name, thread);

        // A yield gives up a non-preemptible hold until the next dispatch
        if self.executing == Some(thread) {
            self.executing_preemptible = true;
        }
        self.update_heir();
        true
    }

    /// Record the thread now executing on the processor
    pub(crate) fn set_executing(&mut self, thread: Option<ThreadId>, preemptible: bool) {
        self.executing = thread;
        self.executing_preemptible = preemptible;
    }

    /// Update whether the executing thread may be preempted
    pub(crate) fn set_executing_preemptible(&mut self, preemptible: bool) {
        self.executing_preemptible = preemptible;
        self.update_heir();
    }

    /// Choose the heir
    ///
    /// # Arguments
    ///
    /// * `taken` - Threads already chosen by another scheduler
    pub(crate) fn select_heir(&self, taken: impl Fn(ThreadId) -> bool) -> Option<ThreadId> {
        if let Some(executing) = self.executing {
            if !self.executing_preemptible && self.ready.contains(executing) && !taken(executing) {
                return Some(executing);
            }
        }

        self.ready_threads().find(|&thread| !taken(thread))
    }

    /// Install a new heir
    ///
    /// # Returns
    ///
    /// `true` if the heir changed
    pub(crate) fn set_heir(&mut self, heir: Option<ThreadId>) -> bool {
        if self.heir == heir {
            return false;
        }

        if let Some(executing) = self.executing {
            if self.heir == Some(executing) && self.ready.contains(executing) {
                self.stats.preemptions += 1;
            }
        }
        self.heir = heir;
        self.stats.heir_changes += 1;

        log_trace!("{}: heir {:?}", self.name, heir);
        true
    }

    fn update_heir(&mut self) {
        let heir = self.select_heir(|_| false);
        self.set_heir(heir);
    }
}

/// Scheduler statistics
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Number of threads added to the ready queue
    pub enqueues: u64,

    /// Number of threads removed from the ready queue
    pub extracts: u64,

    /// Number of voluntary yields
    pub yields: u64,

    /// Number of priority updates of ready threads
    pub priority_updates: u64,

    /// Number of heir changes
    pub heir_changes: u64,

    /// Number of heir changes away from a ready executing thread
    pub preemptions: u64,
}

impl SchedulerStats {
    pub const fn new() -> Self {
        Self {
            enqueues: 0,
            extracts: 0,
            yields: 0,
            priority_updates: 0,
            heir_changes: 0,
            preemptions: 0,
        }
    }
}

impl Default for SchedulerStats {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn scheduler() -> SchedulerInstance {
        SchedulerInstance::new(SchedulerId(0), &SchedulerConfig { name: "test", cpu: 0 })
    }

    fn tid(index: u32) -> ThreadId {
        ThreadId::new(index, 0)
    }

    #[test]
    fn test_heir_is_most_urgent() {
        let mut sched = scheduler();
        assert!(sched.is_idle());
        assert_eq!(sched.heir(), None);

        sched.enqueue(tid(1), 20);
        assert_eq!(sched.heir(), Some(tid(1)));

        sched.enqueue(tid(2), 10);
        assert_eq!(sched.heir(), Some(tid(2)));

        sched.enqueue(tid(3), 10);
        assert_eq!(sched.heir(), Some(tid(2)));

        assert!(sched.extract(tid(2)));
        assert_eq!(sched.heir(), Some(tid(3)));

        assert!(!sched.extract(tid(2)));
        assert_eq!(sched.ready_count(), 2);
    }

    #[test]
    fn test_update_priority_placement() {
        let mut sched = scheduler();
        sched.enqueue(tid(1), 10);
        sched.enqueue(tid(2), 10);
        sched.enqueue(tid(3), 5);

        // Falling back to 10 ahead of the peers that were there already
        assert!(sched.update_priority(tid(3), 10, Placement::Prepend));
        let order: Vec<_> = sched.ready_threads().collect();
        assert_eq!(order, [tid(3), tid(1), tid(2)]);

        assert!(sched.update_priority(tid(3), 10, Placement::Append));
        assert_eq!(sched.heir(), Some(tid(1)));

        assert!(!sched.update_priority(tid(9), 1, Placement::Append));
    }

    #[test]
    fn test_yield_moves_to_back_of_tier() {
        let mut sched = scheduler();
        sched.enqueue(tid(1), 10);
        sched.enqueue(tid(2), 10);
        sched.enqueue(tid(3), 20);

        assert!(sched.yield_thread(tid(1)));
        assert_eq!(sched.heir(), Some(tid(2)));
        let order: Vec<_> = sched.ready_threads().collect();
        assert_eq!(order, [tid(2), tid(1), tid(3)]);
        assert_eq!(sched.stats().yields, 1);
    }

    #[test]
    fn test_non_preemptible_executing_keeps_processor() {
        let mut sched = scheduler();
        sched.enqueue(tid(1), 20);
        sched.set_executing(Some(tid(1)), false);

        sched.enqueue(tid(2), 5);
        assert_eq!(sched.heir(), Some(tid(1)));

        sched.set_executing_preemptible(true);
        assert_eq!(sched.heir(), Some(tid(2)));
        assert_eq!(sched.stats().preemptions, 1);
    }

    #[test]
    fn test_yield_releases_non_preemptible_hold() {
        let mut sched = scheduler();
        sched.enqueue(tid(1), 10);
        sched.enqueue(tid(2), 10);
        sched.set_executing(Some(tid(1)), false);

        assert!(sched.yield_thread(tid(1)));
        assert_eq!(sched.heir(), Some(tid(2)));
    }

    #[test]
    fn test_heir_tracks_most_urgent_arrival() {
        // Deterministic pseudo-random sequence of ready queue operations
        let mut sched = scheduler();
        let mut model: Vec<(ThreadId, Priority)> = Vec::new();
        let mut seed: u32 = 0x9e37_79b9;

        for _ in 0..1000 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;

            let thread = tid(seed % 12);
            let priority = (seed >> 8) % 8;
            let present = model.iter().any(|&(t, _)| t == thread);

            match (seed >> 4) % 4 {
                0 => {
                    if !present {
                        sched.enqueue(thread, priority);
                        model.push((thread, priority));
                    }
                }
                1 => {
                    assert_eq!(sched.extract(thread), present);
                    model.retain(|&(t, _)| t != thread);
                }
                placement => {
                    let placement = if placement == 2 { Placement::Append } else { Placement::Prepend };
                    assert_eq!(sched.update_priority(thread, priority, placement), present);
                    if present {
                        model.retain(|&(t, _)| t != thread);
                        match placement {
                            Placement::Append => model.push((thread, priority)),
                            Placement::Prepend => model.insert(0, (thread, priority)),
                        }
                    }
                }
            }

            // Stable sort keeps arrival order among equals
            let mut expected = model.clone();
            expected.sort_by_key(|&(_, priority)| priority);
            let expected: Vec<ThreadId> = expected.into_iter().map(|(t, _)| t).collect();

            assert_eq!(sched.ready_threads().collect::<Vec<_>>(), expected);
            assert_eq!(sched.heir(), expected.first().copied());
        }
    }

    #[test]
    fn test_select_heir_skips_taken() {
        let mut sched = scheduler();
        sched.enqueue(tid(1), 1);
        sched.enqueue(tid(2), 2);

        assert_eq!(sched.select_heir(|t| t == tid(1)), Some(tid(2)));
        assert_eq!(sched.select_heir(|_| true), None);
    }
}
