// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Common types used throughout the dispatch core
//!
//! Objects are never referenced by pointer. Threads and thread queues live
//! in preallocated tables and are named by generational handles, schedulers
//! and processors by plain indices.

use core::fmt;

/// Priority scalar (lower value = more urgent)
pub type Priority = u32;

/// Processor index (0-based)
pub type CpuIndex = usize;

/// Saved interrupt state returned by the CPU port
pub type IsrLevel = usize;

/// ============================================================================
/// Thread Handle
/// ============================================================================

/// Thread handle
///
/// Index into the thread table plus the generation of the slot. A handle
/// outlives its thread only as a stale value; every lookup checks the
/// generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId {
    index: u32,
    generation: u32,
}

impl ThreadId {
    /// Raw encoding for "no thread" in per-CPU atomics
    pub const RAW_NONE: u64 = u64::MAX;

    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the thread table
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Slot generation
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Encode an optional handle into a single word
    pub const fn encode(id: Option<ThreadId>) -> u64 {
        match id {
            Some(id) => ((id.generation as u64) << 32) | id.index as u64,
            None => Self::RAW_NONE,
        }
    }

    /// Decode a word produced by [`ThreadId::encode`]
    pub const fn decode(raw: u64) -> Option<ThreadId> {
        if raw == Self::RAW_NONE {
            None
        } else {
            Some(ThreadId::new(raw as u32, (raw >> 32) as u32))
        }
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}.{}", self.index, self.generation)
    }
}

/// ============================================================================
/// Thread Queue Handle
/// ============================================================================

/// Thread queue handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueId {
    index: u32,
    generation: u32,
}

impl QueueId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the queue table
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Slot generation
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}.{}", self.index, self.generation)
    }
}

/// ============================================================================
/// Scheduler Handle
/// ============================================================================

/// Scheduler instance index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchedulerId(pub(crate) u16);

impl SchedulerId {
    /// Handle of the scheduler at `index` in the configuration
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Index in the scheduler table
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SchedulerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_encoding() {
        let id = ThreadId::new(7, 3);
        assert_eq!(ThreadId::decode(ThreadId::encode(Some(id))), Some(id));
        assert_eq!(ThreadId::decode(ThreadId::encode(None)), None);
    }

    #[test]
    fn test_handle_ordering() {
        assert!(ThreadId::new(1, 0) < ThreadId::new(2, 0));
        assert!(SchedulerId(0) < SchedulerId(1));
        assert_eq!(QueueId::new(4, 1).index(), 4);
    }
}
