// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! CPU Port
//!
//! The few processor services the dispatcher needs, behind one trait so
//! that the core runs on bare metal and in host tests alike.
//!
//! # Design
//!
//! - **Interrupt level**: `disable_interrupts` returns the previous level,
//!   `restore_interrupts` puts it back; nesting is the caller's business
//! - **Context switch**: Called with the system lock released, once per
//!   heir change
//! - **Dispatch requests**: Inter-processor interrupt asking another
//!   processor to run its dispatcher

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod amd64;

use crate::rustux::types::{CpuIndex, IsrLevel, ThreadId};

/// Processor services used by the dispatcher
pub trait CpuPort {
    /// Index of the processor executing the caller
    fn current_cpu(&self) -> CpuIndex;

    /// Disable interrupts on the current processor
    ///
    /// # Returns
    ///
    /// The previous interrupt level
    fn disable_interrupts(&self) -> IsrLevel;

    /// Restore an interrupt level returned by [`CpuPort::disable_interrupts`]
    fn restore_interrupts(&self, level: IsrLevel);

    /// Switch the processor from one thread to another
    ///
    /// # Arguments
    ///
    /// * `cpu` - Processor to switch
    /// * `from` - Thread executing so far (`None` if idle)
    /// * `to` - Thread to execute (`None` to idle)
    fn switch_context(&self, cpu: CpuIndex, from: Option<ThreadId>, to: Option<ThreadId>);

    /// Ask another processor to run its dispatcher
    fn send_dispatch_request(&self, _cpu: CpuIndex) {}
}
