// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Rustux Score
//!
//! The real-time dispatch core of the Rustux kernel: priority aggregation,
//! scheduler instances, thread control blocks, thread queues with priority
//! inheritance and ceilings, and the dispatcher.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rustux_score::prelude::*;
//!
//! let kernel = Kernel::new(Configuration::uniprocessor(), port)?;
//! let mutex = kernel.create_queue("mtx", Discipline::PriorityInherit)?;
//! let worker = kernel.create_thread(ThreadAttributes::new("worker", 10))?;
//! kernel.start_thread(worker)?;
//! kernel.seize(mutex, worker)?;
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// Common types
pub mod rustux;

// Status codes
pub mod err;

// Kernel modules
pub mod kernel;

/// Commonly used items
pub mod prelude {
    pub use crate::err::{Result, Status};
    pub use crate::kernel::arch::CpuPort;
    pub use crate::kernel::config::{Configuration, SchedulerConfig};
    pub use crate::kernel::dispatch::Kernel;
    pub use crate::kernel::priority::{Action, Placement, PriorityAggregation, PriorityQueue};
    pub use crate::kernel::sched::SchedulerInstance;
    pub use crate::kernel::sync::{Discipline, ThreadQueue};
    pub use crate::kernel::system::System;
    pub use crate::kernel::thread::{BlockReason, ThreadAttributes, ThreadState, Timeout, WaitFlags};
    pub use crate::rustux::types::{CpuIndex, Priority, QueueId, SchedulerId, ThreadId};
}
