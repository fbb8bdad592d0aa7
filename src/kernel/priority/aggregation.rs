// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Priority Aggregation
//!
//! The set of priority nodes contributing to one resource, together with
//! their minimum. A thread's own scheduler node is an aggregation (its real
//! priority plus whatever its resources lend it), and so is every
//! sub-queue of a thread queue (the priorities of its waiters).
//!
//! # Design
//!
//! - **Actions, not callbacks**: Each mutation returns the effect it had on
//!   the aggregation as a whole. The caller decides where to propagate it.
//! - **Incremental minimum**: The effective priority is the first entry of
//!   the ordered contributors, never a rescan.
//! - **Generic nodes**: The aggregation knows nothing about what a node is;
//!   any ordered handle type works.
//!
//! # Actions
//!
//! ```text
//! empty  --insert-->  non-empty         Add(p)
//! non-empty --insert/extract/changed--> Change(p, placement)   if the minimum moved
//! non-empty --extract last--> empty     Remove
//! ```

use crate::kernel::priority::queue::{Placement, PriorityQueue};
use crate::rustux::types::Priority;

/// Effect of a mutation on an aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The aggregation gained its first contributor
    Add(Priority),

    /// The effective priority moved
    Change {
        /// New effective priority
        priority: Priority,

        /// Where the owner goes among peers of equal priority
        placement: Placement,
    },

    /// The aggregation lost its last contributor
    Remove,
}

/// Priority aggregation
#[derive(Debug, Clone)]
pub struct PriorityAggregation<N: Ord + Copy> {
    /// Contributing nodes in priority order
    contributors: PriorityQueue<N>,
}

impl<N: Ord + Copy> PriorityAggregation<N> {
    /// Create an aggregation without contributors
    pub const fn initialize_empty() -> Self {
        Self {
            contributors: PriorityQueue::new(),
        }
    }

    /// Create an aggregation with exactly one contributor
    pub fn initialize_one(node: N, priority: Priority) -> Self {
        let mut aggregation = Self::initialize_empty();
        aggregation.contributors.insert(node, priority, Placement::Append);
        aggregation
    }

    /// Minimum priority of all contributors
    pub fn effective_priority(&self) -> Option<Priority> {
        self.contributors.first().map(|(_, priority)| priority)
    }

    /// Effective priority, or `base` without contributors
    pub fn priority_or(&self, base: Priority) -> Priority {
        self.effective_priority().unwrap_or(base)
    }

    /// Check if there are no contributors
    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    /// Number of contributors
    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    /// Check if a node contributes
    pub fn contains(&self, node: N) -> bool {
        self.contributors.contains(node)
    }

    /// Priority a node contributes
    pub fn priority_of(&self, node: N) -> Option<Priority> {
        self.contributors.priority_of(node)
    }

    /// Most urgent contributor
    pub fn first(&self) -> Option<N> {
        self.contributors.first().map(|(node, _)| node)
    }

    /// Contributors from most to least urgent
    pub fn contributors(&self) -> impl Iterator<Item = (N, Priority)> + '_ {
        self.contributors.iter()
    }

    /// Add a contributor
    ///
    /// # Arguments
    ///
    /// * `node` - Contributing node
    /// * `priority` - Priority it contributes
    /// * `placement` - Tie placement reported with a change
    ///
    /// # Returns
    ///
    /// `Add` for the first contributor, `Change` if the node is the new
    /// minimum, otherwise nothing
    pub fn insert(&mut self, node: N, priority: Priority, placement: Placement) -> Option<Action> {
        let before = self.effective_priority();
        self.contributors.insert(node, priority, Placement::Append);

        match before {
            None => Some(Action::Add(priority)),
            Some(old) if priority < old => Some(Action::Change { priority, placement }),
            Some(_) => None,
        }
    }

    /// Remove a contributor
    ///
    /// # Returns
    ///
    /// `Remove` for the last contributor, `Change` if the minimum moved,
    /// otherwise nothing (also if the node did not contribute)
    pub fn extract(&mut self, node: N, placement: Placement) -> Option<Action> {
        let before = self.effective_priority();
        self.contributors.remove(node)?;

        match self.effective_priority() {
            None => Some(Action::Remove),
            Some(priority) if Some(priority) != before => Some(Action::Change { priority, placement }),
            Some(_) => None,
        }
    }

    /// Reposition a contributor whose priority changed
    ///
    /// # Returns
    ///
    /// `Change` if the minimum moved, otherwise nothing (also if the node
    /// did not contribute)
    pub fn changed(&mut self, node: N, priority: Priority, placement: Placement) -> Option<Action> {
        let before = self.effective_priority();
        if !self.contributors.change(node, priority, placement) {
            return None;
        }

        match self.effective_priority() {
            Some(after) if Some(after) != before => Some(Action::Change {
                priority: after,
                placement,
            }),
            _ => None,
        }
    }

    /// Substitute `replacement` for `victim` at the same priority and position
    ///
    /// Never produces an action.
    ///
    /// # Returns
    ///
    /// `false` if `victim` did not contribute
    pub fn replace(&mut self, victim: N, replacement: N) -> bool {
        self.contributors.replace(victim, replacement)
    }
}

impl<N: Ord + Copy> Default for PriorityAggregation<N> {
    fn default() -> Self {
        Self::initialize_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
