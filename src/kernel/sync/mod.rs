// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Synchronization Primitives
//!
//! Thread queues are the only blocking structure of the dispatch core.
//! Semaphores, mutexes and barriers of the outer layers are thread queues
//! with a discipline and a counter or owner kept by the caller.
//!
//! # Primitives
//!
//! - **Thread Queue**: Waiters per scheduler, optional owner with priority
//!   inheritance or ceiling

pub mod thread_queue;

// Re-exports
pub use thread_queue::{Discipline, SubQueue, ThreadQueue};
