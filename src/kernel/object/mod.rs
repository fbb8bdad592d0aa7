// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Objects
//!
//! Threads and thread queues live in fixed-size tables and are named by
//! generational handles. A handle to a freed slot is stale and never
//! resolves, even after the slot is reused.
//!
//! # Modules
//!
//! - [`table`] - Generational object table

pub mod table;

// Re-exports
pub use table::ObjectTable;
