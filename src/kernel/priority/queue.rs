// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Priority-Ordered Map
//!
//! An ordered map from handles to priorities, sorted by priority and then
//! by placement order. It backs every priority-ordered structure of the
//! core: aggregation contributors, scheduler ready queues and thread
//! queue sub-queues.
//!
//! # Design
//!
//! - **Two trees**: `order` sorts entries by `(priority, sequence)`, `index`
//!   finds the key of a given handle. Every operation is O(log n).
//! - **Placement**: Among equal priorities, appended entries go behind all
//!   peers and prepended entries ahead of them. Appends draw increasing
//!   sequence numbers, prepends decreasing ones.

use alloc::collections::BTreeMap;

use crate::rustux::types::Priority;

/// Position of an entry among peers of equal priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Behind all peers of equal priority
    Append,

    /// Ahead of all peers of equal priority
    Prepend,
}

/// Sort key of one entry
type Key = (Priority, i64);

/// Priority-ordered map
#[derive(Debug, Clone)]
pub struct PriorityQueue<T: Ord + Copy> {
    /// Entries in priority order
    order: BTreeMap<Key, T>,

    /// Key of each handle
    index: BTreeMap<T, Key>,

    /// Next sequence number for an appended entry
    tail: i64,

    /// Next sequence number for a prepended entry
    head: i64,
}

impl<T: Ord + Copy> PriorityQueue<T> {
    /// Create an empty map
    pub const fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            index: BTreeMap::new(),
            tail: 0,
            head: -1,
        }
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if a handle is present
    pub fn contains(&self, item: T) -> bool {
        self.index.contains_key(&item)
    }

    /// Priority of a handle, if present
    pub fn priority_of(&self, item: T) -> Option<Priority> {
        self.index.get(&item).map(|&(priority, _)| priority)
    }

    /// Most urgent entry
    pub fn first(&self) -> Option<(T, Priority)> {
        self.order
            .iter()
            .next()
            .map(|(&(priority, _), &item)| (item, priority))
    }

    /// Entries from most to least urgent
    pub fn iter(&self) -> impl Iterator<Item = (T, Priority)> + '_ {
        self.order.iter().map(|(&(priority, _), &item)| (item, priority))
    }

    /// Insert a handle
    ///
    /// A handle that is already present is repositioned.
    ///
    /// # Arguments
    ///
    /// * `item` - Handle to insert
    /// * `priority` - Sort priority
    /// * `placement` - Position among peers of equal priority
    pub fn insert(&mut self, item: T, priority: Priority, placement: Placement) {
        self.remove(item);

        let sequence = match placement {
            Placement::Append => {
                let sequence = self.tail;
                self.tail += 1;
                sequence
            }
            Placement::Prepend => {
                let sequence = self.head;
                self.head -= 1;
                sequence
            }
        };

        self.order.insert((priority, sequence), item);
        self.index.insert(item, (priority, sequence));
    }

    /// Remove a handle
    ///
    /// # Returns
    ///
    /// The priority the handle had, or `None` if it was absent
    pub fn remove(&mut self, item: T) -> Option<Priority> {
        let key = self.index.remove(&item)?;
        self.order.remove(&key);
        Some(key.0)
    }

    /// Move a handle to a new priority
    ///
    /// # Returns
    ///
    /// `false` if the handle is absent
    pub fn change(&mut self, item: T, priority: Priority, placement: Placement) -> bool {
        if !self.contains(item) {
            return false;
        }
        self.insert(item, priority, placement);
        true
    }

    /// Put `replacement` exactly where `victim` was
    ///
    /// # Returns
    ///
    /// `false` if `victim` is absent
    pub fn replace(&mut self, victim: T, replacement: T) -> bool {
        let key = match self.index.remove(&victim) {
            Some(key) => key,
            None => return false,
        };
        self.remove(replacement);
        self.order.insert(key, replacement);
        self.index.insert(replacement, key);
        true
    }
}

impl<T: Ord + Copy> Default for PriorityQueue<T> {
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

    fn items(queue: &PriorityQueue<u32>) -> Vec<u32> {
        queue.iter().map(|(item, _)| item).collect()
    }

    #[test]
    fn test_priority_then_fifo() {
        let mut queue = PriorityQueue::new();
        queue.insert(1, 20, Placement::Append);
        queue.insert(2, 10, Placement::Append);
        queue.insert(3, 20, Placement::Append);
        queue.insert(4, 10, Placement::Append);

        assert_eq!(items(&queue), [2, 4, 1, 3]);
        assert_eq!(queue.first(), Some((2, 10)));
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_prepend_goes_ahead_of_peers() {
        let mut queue = PriorityQueue::new();
        queue.insert(1, 5, Placement::Append);
        queue.insert(2, 5, Placement::Append);
        queue.insert(3, 5, Placement::Prepend);
        queue.insert(4, 5, Placement::Prepend);

        assert_eq!(items(&queue), [4, 3, 1, 2]);
    }

    #[test]
    fn test_remove_and_change() {
        let mut queue = PriorityQueue::new();
        queue.insert(1, 5, Placement::Append);
        queue.insert(2, 6, Placement::Append);

        assert!(queue.change(2, 1, Placement::Append));
        assert_eq!(queue.first(), Some((2, 1)));
        assert!(!queue.change(9, 1, Placement::Append));

        assert_eq!(queue.remove(2), Some(1));
        assert_eq!(queue.remove(2), None);
        assert_eq!(queue.priority_of(1), Some(5));
        assert!(!queue.contains(2));
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut queue = PriorityQueue::new();
        queue.insert(1, 5, Placement::Append);
        queue.insert(2, 5, Placement::Append);
        queue.insert(3, 5, Placement::Append);

        assert!(queue.replace(2, 7));
        assert_eq!(items(&queue), [1, 7, 3]);
        assert_eq!(queue.priority_of(7), Some(5));
        assert!(!queue.replace(2, 8));
    }

    #[test]
    fn test_reinsert_moves_entry() {
        let mut queue = PriorityQueue::new();
        queue.insert(1, 5, Placement::Append);
        queue.insert(2, 5, Placement::Append);
        queue.insert(1, 5, Placement::Append);

        assert_eq!(items(&queue), [2, 1]);
        assert_eq!(queue.len(), 2);
    }
}
