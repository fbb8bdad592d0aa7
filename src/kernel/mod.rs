// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Rustux Dispatch Core
//!
//! Scheduling and blocking for the Rustux kernel.
//!
//! # Layers
//!
//! ```text
//! dispatch   Kernel: lock, per-CPU state, context switches
//! system     System: threads, thread queues, schedulers
//! sched      SchedulerInstance: ready queue, heir
//! sync       ThreadQueue: sub-queues, owner
//! thread     Tcb: state, scheduler nodes, wait record
//! priority   PriorityAggregation, PriorityQueue
//! ```

// Re-export commonly used types
pub use crate::rustux::types::*;

// Architecture module
pub mod arch;

pub mod config;
pub mod debug;
pub mod dispatch;
pub mod object;
pub mod percpu;
pub mod priority;
pub mod sched;
pub mod sync;
pub mod system;
pub mod thread;

#[cfg(test)]
mod tests;
