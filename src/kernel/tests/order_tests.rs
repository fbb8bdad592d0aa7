// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Unblock Order Tests
//!
//! Three schedulers. B and C have their home on S0, D on S1. C always
//! blocks last. The unblock order depends on B's priority relative to C, on
//! whether D blocks before or after B, and on whether C is helped through a
//! mutex it owns. The helper runs on S1 if D does not block and on S2
//! otherwise, so D's sub-queue never belongs to a scheduler of C.

use alloc::vec::Vec;

use super::support::*;
use crate::kernel::config::Configuration;
use crate::kernel::sync::Discipline;
use crate::kernel::system::System;
use crate::kernel::thread::Timeout;
use crate::rustux::types::{Priority, QueueId, ThreadId};

/// Priority of B relative to C
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relative {
    High,
    Equal,
    Low,
}

impl Relative {
    fn priority(self) -> Priority {
        match self {
            Relative::High => ULTRA_HIGH,
            Relative::Equal => VERY_HIGH,
            Relative::Low => HIGH,
        }
    }
}

/// When D blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Other {
    None,
    Before,
    After,
}

const DISCIPLINES: [Discipline; 2] = [Discipline::Priority, Discipline::PriorityInherit];

fn block(system: &mut System, queue: QueueId, thread: ThreadId) {
    system.enqueue(queue, thread, Timeout::Forever).unwrap();
}

/// Block the threads and surrender until the queue is empty
fn unblock_order(discipline: Discipline, helping: bool, b: Option<Relative>, other: Other) -> Vec<&'static str> {
    let mut system = System::new(Configuration::smp(3)).unwrap();
    let runner = spawn(&mut system, "A", NORMAL, S0);
    let queue = system.create_queue("tq", discipline).unwrap();
    system.seize(queue, runner).unwrap();

    let c = spawn(&mut system, "C", VERY_HIGH, S0);
    if helping {
        let helper = if other == Other::None { S1 } else { S2 };
        let e = spawn(&mut system, "E", LOW, helper);
        let mutex = system.create_queue("mtx", Discipline::PriorityInherit).unwrap();
        system.seize(mutex, c).unwrap();
        block(&mut system, mutex, e);
        assert_eq!(system.priority(c, helper), Some(LOW));
    }

    let b = b.map(|relative| spawn(&mut system, "B", relative.priority(), S0));
    let d = match other {
        Other::None => None,
        Other::Before | Other::After => Some(spawn(&mut system, "D", HIGH, S1)),
    };

    if let (Other::Before, Some(d)) = (other, d) {
        block(&mut system, queue, d);
    }
    if let Some(b) = b {
        block(&mut system, queue, b);
    }
    if let (Other::After, Some(d)) = (other, d) {
        block(&mut system, queue, d);
    }
    block(&mut system, queue, c);

    let mut order = Vec::new();
    while let Some(thread) = system.surrender(queue) {
        order.push(system.thread(thread).name());
    }

    assert!(system.queue(queue).is_empty());
    order
}

fn check(helping: bool, b: Option<Relative>, other: Other, expected: &[&str]) {
    for discipline in DISCIPLINES {
        assert_eq!(
            unblock_order(discipline, helping, b, other),
            expected,
            "{:?} helping={} b={:?} d={:?}",
            discipline,
            helping,
            b,
            other
        );
    }
}

#[test]
fn test_home_only_c() {
    check(false, None, Other::None, &["C"]);
}

#[test]
fn test_home_d_only() {
    check(false, None, Other::Before, &["D", "C"]);
}

#[test]
fn test_home_b_without_d() {
    check(false, Some(Relative::High), Other::None, &["B", "C"]);
    check(false, Some(Relative::Equal), Other::None, &["B", "C"]);
    check(false, Some(Relative::Low), Other::None, &["C", "B"]);
}

#[test]
fn test_home_d_before() {
    check(false, Some(Relative::High), Other::Before, &["D", "B", "C"]);
    check(false, Some(Relative::Equal), Other::Before, &["D", "B", "C"]);
    check(false, Some(Relative::Low), Other::Before, &["D", "C", "B"]);
}

#[test]
fn test_home_d_after() {
    check(false, Some(Relative::High), Other::After, &["B", "D", "C"]);
    check(false, Some(Relative::Equal), Other::After, &["B", "D", "C"]);
    check(false, Some(Relative::Low), Other::After, &["C", "D", "B"]);
}

#[test]
fn test_helping_only_c() {
    check(true, None, Other::None, &["C"]);
}

#[test]
fn test_helping_d_only() {
    check(true, None, Other::Before, &["D", "C"]);
}

#[test]
fn test_helping_b_without_d() {
    check(true, Some(Relative::High), Other::None, &["B", "C"]);
    check(true, Some(Relative::Equal), Other::None, &["B", "C"]);
    check(true, Some(Relative::Low), Other::None, &["C", "B"]);
}

#[test]
fn test_helping_d_before() {
    check(true, Some(Relative::High), Other::Before, &["D", "B", "C"]);
    check(true, Some(Relative::Equal), Other::Before, &["D", "B", "C"]);
    check(true, Some(Relative::Low), Other::Before, &["D", "C", "B"]);
}

#[test]
fn test_helping_d_after() {
    check(true, Some(Relative::High), Other::After, &["B", "D", "C"]);
    check(true, Some(Relative::Equal), Other::After, &["B", "D", "C"]);
    check(true, Some(Relative::Low), Other::After, &["C", "D", "B"]);
}

#[test]
fn test_helping_adds_sub_queue_behind_existing() {
    let mut system = System::new(Configuration::smp(3)).unwrap();
    let runner = spawn(&mut system, "A", NORMAL, S0);
    let queue = system.create_queue("tq", Discipline::Priority).unwrap();
    system.seize(queue, runner).unwrap();

    let c = spawn(&mut system, "C", VERY_HIGH, S0);
    let e = spawn(&mut system, "E", LOW, S2);
    let mutex = system.create_queue("mtx", Discipline::PriorityInherit).unwrap();
    system.seize(mutex, c).unwrap();
    block(&mut system, mutex, e);

    let d = spawn(&mut system, "D", HIGH, S1);
    block(&mut system, queue, d);
    block(&mut system, queue, c);

    let chain: Vec<_> = system.queue(queue).sub_queues().iter().map(|head| head.scheduler()).collect();
    assert_eq!(chain, [Some(S1), Some(S0), Some(S2)]);
    assert_eq!(system.thread(c).contributed_sub_queues().len(), 2);
}

#[test]
fn test_later_waiter_does_not_reorder_existing_sub_queue() {
    let mut system = System::new(Configuration::smp(2)).unwrap();
    let runner = spawn(&mut system, "A", NORMAL, S0);
    let queue = system.create_queue("tq", Discipline::PriorityInherit).unwrap();
    system.seize(queue, runner).unwrap();

    let d = spawn(&mut system, "D", LOW, S1);
    block(&mut system, queue, d);
    let b = spawn(&mut system, "B", ULTRA_HIGH, S0);
    block(&mut system, queue, b);

    let chain: Vec<_> = system.queue(queue).sub_queues().iter().map(|head| head.scheduler()).collect();
    assert_eq!(chain, [Some(S1), Some(S0)]);
    assert_eq!(system.first(queue), Some(d));

    // The owner is helped by S1 with D's priority
    assert_eq!(system.priority(runner, S1), Some(LOW));
    assert_eq!(system.priority(runner, S0), Some(ULTRA_HIGH));
}

#[test]
fn test_fifo_order() {
    let mut system = System::new(Configuration::uniprocessor()).unwrap();
    let owner = spawn(&mut system, "owner", NORMAL, S0);
    let queue = system.create_queue("fifo", Discipline::Fifo).unwrap();
    system.seize(queue, owner).unwrap();

    let threads = [
        spawn(&mut system, "T1", HIGH, S0),
        spawn(&mut system, "T2", HIGH, S0),
        spawn(&mut system, "T3", HIGH, S0),
    ];
    for &thread in &threads {
        block(&mut system, queue, thread);
    }

    for &thread in &threads {
        assert_eq!(system.surrender(queue), Some(thread));
    }
    assert_eq!(system.surrender(queue), None);
}

#[test]
fn test_fifo_ignores_priority() {
    let mut system = System::new(Configuration::smp(2)).unwrap();
    let owner = spawn(&mut system, "owner", NORMAL, S0);
    let queue = system.create_queue("fifo", Discipline::Fifo).unwrap();
    system.seize(queue, owner).unwrap();

    let low = spawn(&mut system, "low", LOW, S0);
    let foreign = spawn(&mut system, "foreign", HIGH, S1);
    let urgent = spawn(&mut system, "urgent", ULTRA_HIGH, S0);
    for thread in [low, foreign, urgent] {
        block(&mut system, queue, thread);
    }
    assert_eq!(system.queue(queue).sub_queues().len(), 1);

    assert_eq!(system.surrender(queue), Some(low));
    assert_eq!(system.surrender(queue), Some(foreign));
    assert_eq!(system.surrender(queue), Some(urgent));

    // No inheritance through FIFO queues
    assert_eq!(system.thread(owner).current_priority(), NORMAL);
}
