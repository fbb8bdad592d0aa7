// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Configuration
//!
//! Table sizes and the scheduler/processor topology, fixed when the
//! kernel is brought up. All tables are allocated once from these values.
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = Configuration::smp(2)
//!     .with_maximum_threads(32)
//!     .with_maximum_thread_queues(16);
//! config.validate()?;
//! ```

use alloc::vec::Vec;

use crate::err::{Result, Status};
use crate::rustux::types::{CpuIndex, Priority};

/// ============================================================================
/// Defaults
/// ============================================================================

/// Default size of the thread table
pub const DEFAULT_MAXIMUM_THREADS: usize = 64;

/// Default size of the thread queue table
pub const DEFAULT_MAXIMUM_THREAD_QUEUES: usize = 64;

/// Default least urgent priority
pub const PRIORITY_DEFAULT_MAXIMUM: Priority = 255;

/// Maximum number of scheduler instances
pub const MAXIMUM_SCHEDULERS: usize = 32;

/// ============================================================================
/// Configuration
/// ============================================================================

/// One scheduler instance and the processor it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Scheduler name (for diagnostics)
    pub name: &'static str,

    /// Processor driven by this scheduler
    pub cpu: CpuIndex,
}

/// Kernel configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Size of the thread table
    pub maximum_threads: usize,

    /// Size of the thread queue table
    pub maximum_thread_queues: usize,

    /// Scheduler instances in index order
    pub schedulers: Vec<SchedulerConfig>,

    /// Least urgent priority a thread may be given
    pub priority_maximum: Priority,
}

const SCHEDULER_NAMES: [&str; 8] = ["sched0", "sched1", "sched2", "sched3", "sched4", "sched5", "sched6", "sched7"];

impl Configuration {
    /// Single processor, single scheduler
    pub fn uniprocessor() -> Self {
        Self::smp(1)
    }

    /// One scheduler per processor
    ///
    /// # Arguments
    ///
    /// * `processors` - Number of processors
    pub fn smp(processors: usize) -> Self {
        let schedulers = (0..processors)
            .map(|cpu| SchedulerConfig {
                name: SCHEDULER_NAMES.get(cpu).copied().unwrap_or("sched"),
                cpu,
            })
            .collect();

        Self {
            maximum_threads: DEFAULT_MAXIMUM_THREADS,
            maximum_thread_queues: DEFAULT_MAXIMUM_THREAD_QUEUES,
            schedulers,
            priority_maximum: PRIORITY_DEFAULT_MAXIMUM,
        }
    }

    /// Set the thread table size
    pub fn with_maximum_threads(mut self, maximum: usize) -> Self {
        self.maximum_threads = maximum;
        self
    }

    /// Set the thread queue table size
    pub fn with_maximum_thread_queues(mut self, maximum: usize) -> Self {
        self.maximum_thread_queues = maximum;
        self
    }

    /// Set the least urgent priority
    pub fn with_priority_maximum(mut self, maximum: Priority) -> Self {
        self.priority_maximum = maximum;
        self
    }

    /// Number of processors
    pub fn processor_count(&self) -> usize {
        self.schedulers.len()
    }

    /// Validate the configuration
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the configuration can be brought up
    /// - `Err(Status::TooMany)` if a table is empty or too many schedulers exist
    /// - `Err(Status::IncorrectState)` if the processor numbering is not dense
    ///   or a processor has two schedulers
    pub fn validate(&self) -> Result {
        if self.maximum_threads == 0 || self.maximum_thread_queues == 0 {
            return Err(Status::TooMany);
        }

        if self.schedulers.is_empty() || self.schedulers.len() > MAXIMUM_SCHEDULERS {
            return Err(Status::TooMany);
        }

        let mut seen = [false; MAXIMUM_SCHEDULERS];
        for scheduler in &self.schedulers {
            if scheduler.cpu >= self.schedulers.len() || seen[scheduler.cpu] {
                return Err(Status::IncorrectState);
            }
            seen[scheduler.cpu] = true;
        }

        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::uniprocessor()
    }
}

// ============================================================================
// Tests
// ============================================================================
