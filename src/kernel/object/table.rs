// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Object Table
//!
//! Fixed-capacity table of objects addressed by `(index, generation)`.
//! Slots are allocated once at bring-up; freeing a slot bumps its
//! generation so that old handles stop resolving.

use alloc::vec::Vec;

use crate::err::{Result, Status};

/// One table slot
#[derive(Debug)]
struct Slot<T> {
    /// Incremented every time the slot is freed
    generation: u32,

    /// Object stored in the slot
    value: Option<T>,
}

/// Object table
#[derive(Debug)]
pub struct ObjectTable<T> {
    /// Array of slots
    slots: Vec<Slot<T>>,

    /// Number of live objects
    count: usize,
}

impl<T> ObjectTable<T> {
    /// Create a table with `capacity` free slots
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot {
            generation: 0,
            value: None,
        });

        Self { slots, count: 0 }
    }

    /// Store a new object
    ///
    /// # Arguments
    ///
    /// * `make` - Builds the object from its `(index, generation)`
    ///
    /// # Returns
    ///
    /// The `(index, generation)` of the new object, or `Status::TooMany`
    /// if every slot is in use
    pub fn insert_with(&mut self, make: impl FnOnce(u32, u32) -> T) -> Result<(u32, u32)> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.value.is_none())
            .ok_or(Status::TooMany)?;

        let index = index as u32;
        slot.value = Some(make(index, slot.generation));
        self.count += 1;

        Ok((index, slot.generation))
    }

    /// Look up an object
    pub fn get(&self, index: usize, generation: u32) -> Option<&T> {
        self.slots
            .get(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Look up an object for modification
    pub fn get_mut(&mut self, index: usize, generation: u32) -> Option<&mut T> {
        self.slots
            .get_mut(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Free a slot
    ///
    /// # Returns
    ///
    /// The object that was stored, or `None` for a stale handle
    pub fn remove(&mut self, index: usize, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index)?;
        if slot.generation != generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.count -= 1;
        Some(value)
    }

    /// Live objects in slot order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }

    /// Number of live objects
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Check if every slot is in use
    pub fn is_full(&self) -> bool {
        self.count >= self.slots.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
