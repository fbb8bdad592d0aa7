// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Rustux Dispatch Core Test Suite
//!
//! Scenario tests that drive several modules at once. Unit tests live next
//! to the code they test.
//!
//! # Organization
//!
//! - [`support`] - Recording CPU port and thread helpers
//! - [`inherit_tests`] - Priority inheritance, transitive chains, deadlock
//! - [`ceiling_tests`] - Priority ceiling hand-off
//! - [`order_tests`] - Unblock order across schedulers and FIFO order
//! - [`wait_tests`] - Timeouts, two-phase enqueue, flush
//! - [`dispatch_tests`] - Dispatcher, interrupt nesting, dispatch requests
//! - [`smp_tests`] - Heir arbitration between schedulers

pub mod support;

mod order_tests;
mod smp_tests;
