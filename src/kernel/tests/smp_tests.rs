// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! SMP Tests
//!
//! Heir arbitration between schedulers, helping and scheduler changes.

use alloc::vec::Vec;

use super::support::*;
use crate::err::Status;
use crate::kernel::config::Configuration;
use crate::kernel::sync::Discipline;
use crate::kernel::system::System;
use crate::kernel::thread::{BlockReason, Timeout};

#[test]
fn test_helped_owner_runs_on_one_scheduler() {
    let mut system = System::new(Configuration::smp(2)).unwrap();
    let owner = spawn(&mut system, "owner", NORMAL, S0);
    let urgent = spawn(&mut system, "urgent", HIGH, S0);
    let mutex = system.create_queue("mtx", Discipline::PriorityInherit).unwrap();
    system.seize(mutex, owner).unwrap();

    let foreign = spawn(&mut system, "foreign", VERY_HIGH, S1);
    system.enqueue(mutex, foreign, Timeout::Forever).unwrap();
    assert_eq!(system.helping_schedulers(owner).collect::<Vec<_>>(), [S1]);
    assert_eq!(system.priority(owner, S1), Some(VERY_HIGH));
    assert_eq!(system.priority(owner, S0), Some(NORMAL));

    // S0 keeps its own urgent thread, S1 helps the owner
    assert_eq!(system.heir(S0), Some(urgent));
    assert_eq!(system.heir(S1), Some(owner));

    // Once S0 chooses the owner, S1 has nothing left
    system.block(urgent, BlockReason::Delay).unwrap();
    assert_eq!(system.heir(S0), Some(owner));
    assert_eq!(system.heir(S1), None);

    assert_eq!(system.release(mutex, owner), Ok(Some(foreign)));
    assert_eq!(system.helping_schedulers(owner).count(), 0);
    assert_eq!(system.heir(S0), Some(owner));
    assert_eq!(system.heir(S1), Some(foreign));
}

#[test]
fn test_helping_priority_follows_waiter() {
    let mut system = System::new(Configuration::smp(2)).unwrap();
    let owner = spawn(&mut system, "owner", NORMAL, S0);
    let mutex = system.create_queue("mtx", Discipline::PriorityInherit).unwrap();
    system.seize(mutex, owner).unwrap();

    let foreign = spawn(&mut system, "foreign", LOW, S1);
    system.enqueue(mutex, foreign, Timeout::Ticks(5)).unwrap();
    assert_eq!(system.priority(owner, S1), Some(LOW));

    system.set_priority(foreign, ULTRA_HIGH).unwrap();
    assert_eq!(system.priority(owner, S1), Some(ULTRA_HIGH));
    assert_eq!(system.sub_queue(mutex, S1).and_then(|sub| sub.priority()), Some(ULTRA_HIGH));

    // The last contribution gone, the helping node goes too
    assert!(system.timeout(foreign));
    assert_eq!(system.priority(owner, S1), None);
    assert_eq!(system.heir(S1), Some(foreign));
}

#[test]
fn test_set_scheduler_moves_ready_thread() {
    let mut system = System::new(Configuration::smp(2)).unwrap();
    let thread = spawn(&mut system, "mover", NORMAL, S0);
    assert_eq!(system.heir(S0), Some(thread));

    system.set_scheduler(thread, S1).unwrap();
    assert_eq!(system.thread(thread).home_scheduler(), S1);
    assert_eq!(system.heir(S0), None);
    assert_eq!(system.heir(S1), Some(thread));
    assert!(!system.scheduler(S0).contains(thread));
}

#[test]
fn test_set_scheduler_refusals() {
    let mut system = System::new(Configuration::smp(2)).unwrap();
    let owner = spawn(&mut system, "owner", NORMAL, S0);
    let waiter = spawn(&mut system, "waiter", HIGH, S0);
    let mutex = system.create_queue("mtx", Discipline::PriorityInherit).unwrap();
    system.seize(mutex, owner).unwrap();
    system.enqueue(mutex, waiter, Timeout::Forever).unwrap();

    assert_eq!(system.set_scheduler(owner, S1), Err(Status::ResourceInUse));
    assert_eq!(system.set_scheduler(waiter, S1), Err(Status::IncorrectState));
    assert_eq!(system.thread(waiter).home_scheduler(), S0);
}

#[test]
fn test_processors_map_to_schedulers() {
    let system = System::new(Configuration::smp(2)).unwrap();
    assert_eq!(system.scheduler_of_cpu(0), Some(S0));
    assert_eq!(system.scheduler_of_cpu(1), Some(S1));
    assert_eq!(system.scheduler_of_cpu(2), None);
    assert!(system.schedulers().iter().all(|sched| sched.is_idle()));
}

#[test]
fn test_helped_thread_stays_on_its_processor() {
    let kernel = kernel(2);
    let other = spawn_on(&kernel, "other", HIGH, S0);
    let owner = spawn_on(&kernel, "owner", LOW, S0);
    let mutex = kernel.create_queue("mtx", Discipline::PriorityInherit).unwrap();
    kernel.seize(mutex, owner).unwrap();
    assert_eq!(kernel.executing(0), Some(other));

    // The owner runs on CPU1 on behalf of the waiter
    kernel.port().set_cpu(1);
    let waiter = spawn_on(&kernel, "waiter", VERY_HIGH, S1);
    kernel.enqueue(mutex, waiter, Timeout::Forever);
    assert_eq!(kernel.executing(1), Some(owner));
    kernel.port().take_switches();

    // The owner is now the most urgent thread of S0 but keeps CPU1
    kernel.port().set_cpu(0);
    kernel.suspend(other).unwrap();
    assert_eq!(kernel.heir(0), None);
    assert_eq!(kernel.heir(1), Some(owner));
    assert_eq!(kernel.executing(0), None);
    assert_eq!(kernel.executing(1), Some(owner));
    assert_eq!(kernel.port().take_switches(), [Switch { cpu: 0, from: Some(other), to: None }]);

    // Released from CPU0: CPU0 waits until CPU1 switched away from the owner
    assert_eq!(kernel.release(mutex, owner), Ok(Some(waiter)));
    assert_eq!(kernel.heir(0), Some(owner));
    assert_eq!(kernel.heir(1), Some(waiter));
    assert_eq!(kernel.executing(0), None);
    assert!(kernel.port().switches().is_empty());

    kernel.port().set_cpu(1);
    kernel.dispatch(1);
    assert_eq!(kernel.executing(1), Some(waiter));
    assert_eq!(kernel.port().requests(), [1, 0]);
    assert!(kernel.percpu(0).dispatch_necessary());

    kernel.port().set_cpu(0);
    kernel.dispatch(0);
    assert_eq!(kernel.executing(0), Some(owner));
    assert_eq!(
        kernel.port().take_switches(),
        [
            Switch { cpu: 1, from: Some(owner), to: Some(waiter) },
            Switch { cpu: 0, from: None, to: Some(owner) },
        ]
    );
}

#[test]
fn test_executing_thread_released_when_scheduler_prefers_another() {
    let mut system = System::new(Configuration::smp(2)).unwrap();
    let other = spawn(&mut system, "other", HIGH, S0);
    let owner = spawn(&mut system, "owner", LOW, S0);
    let mutex = system.create_queue("mtx", Discipline::PriorityInherit).unwrap();
    system.seize(mutex, owner).unwrap();

    let waiter = spawn(&mut system, "waiter", VERY_HIGH, S1);
    system.enqueue(mutex, waiter, Timeout::Forever).unwrap();
    system.set_executing(S0, Some(other));
    system.set_executing(S1, Some(owner));

    system.suspend(other).unwrap();
    assert_eq!(system.heir(S0), None);
    assert_eq!(system.heir(S1), Some(owner));

    // S1 moves on to a more urgent thread, so S0 may take the owner
    let urgent = spawn(&mut system, "urgent", ULTRA_HIGH, S1);
    assert_eq!(system.heir(S1), Some(urgent));
    assert_eq!(system.heir(S0), Some(owner));
}
