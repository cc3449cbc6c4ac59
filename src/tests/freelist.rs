use core::ptr;
use core::time::Duration;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::vec::Vec;

use super::CapturedDiagnostics;
use crate::sync::Deadline;
use crate::sys::FreelistMutex;
use crate::sys::freelist::{Freelist, MAX_INDEX};
use crate::sys::waiter::WaiterRecord;

#[test]
fn pool_hands_out_distinct_indices() {
    let pool: Freelist<AtomicUsize> = Freelist::new();
    let taken: Vec<usize> = (0..200).map(|_| pool.next()).collect();
    let unique: HashSet<usize> = taken.iter().copied().collect();
    assert_eq!(unique.len(), taken.len());

    // 200 slots span the first three blocks; every slot is its own storage.
    let addresses: HashSet<*const AtomicUsize> =
        taken.iter().map(|&i| pool.get(i) as *const _).collect();
    assert_eq!(addresses.len(), taken.len());
}

#[test]
fn pool_reuses_released_slots() {
    let pool: Freelist<AtomicUsize> = Freelist::new();
    let a = pool.next();
    let b = pool.next();
    pool.release(a);
    assert_eq!(pool.next(), a);
    pool.release(b);
    pool.release(a);
    assert_eq!(pool.next(), a);
    assert_eq!(pool.next(), b);
}

#[test]
fn pool_never_hands_a_slot_to_two_owners() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 2_000;

    let pool: Freelist<AtomicUsize> = Freelist::new();
    thread::scope(|s| {
        for t in 1..=THREADS {
            let pool = &pool;
            s.spawn(move || {
                let mut held = Vec::new();
                for round in 0..ROUNDS {
                    let index = pool.next();
                    let previous = pool.get(index).swap(t, Ordering::Relaxed);
                    assert_eq!(previous, 0, "slot {index} already owned by thread {previous}");
                    held.push(index);
                    if round % 3 == 2 {
                        for index in held.drain(..) {
                            pool.get(index).store(0, Ordering::Relaxed);
                            pool.release(index);
                        }
                    }
                }
                for index in held {
                    pool.get(index).store(0, Ordering::Relaxed);
                    pool.release(index);
                }
            });
        }
    });
}

#[test]
#[should_panic(expected = "exhausted")]
fn pool_panics_once_every_slot_is_taken() {
    let pool: Freelist<u8> = Freelist::new();
    for _ in 0..=MAX_INDEX {
        pool.next();
    }
    pool.next();
}

#[test]
fn record_refcount_gates_new_references() {
    let record = WaiterRecord::allocate();
    let handle = record.handle();
    assert!(WaiterRecord::is_handle(handle));
    assert!(ptr::eq(WaiterRecord::from_handle(handle), record));
    assert_eq!(record.ref_count(), 1);

    assert!(record.try_ref());
    assert_eq!(record.ref_count(), 2);
    record.deref();
    record.deref();

    // A record sitting in the pool has no references; a late reader must not
    // be able to revive it.
    let recycled = WaiterRecord::default();
    assert!(!recycled.try_ref());
    assert_eq!(recycled.ref_count(), 0);
}

#[test]
fn unlock_offset_blocks_new_waiters() {
    let record = WaiterRecord::default();
    assert!(record.begin_unlock());
    assert!(!record.add_waiter());
    record.deref_waiters(0);
    assert_eq!(record.waiters(), 0);

    assert!(record.add_waiter());
    assert!(!record.begin_unlock());
    record.deref_waiters(0);
    assert_eq!(record.waiters(), 1);
    record.deref_waiters(1);
    assert_eq!(record.waiters(), 0);
}

/// Leaves `m` in the state where an unlock handed the lock to a waiter that
/// had already timed out: the word still names the record, nobody holds the
/// lock, and a wake-up is pending on the record.
fn strand_handoff(m: &FreelistMutex) {
    assert!(m.try_lock());

    // A waiter arrives: installs a record, references it and registers.
    let record = WaiterRecord::allocate();
    let handle = record.handle();
    m.set_state(handle);
    assert!(record.try_ref());
    assert!(record.add_waiter());

    // The holder unlocks and hands the lock over...
    unsafe { m.unlock() };
    assert_eq!(m.state(), handle);

    // ...but the waiter had just given up.
    record.deref_waiters(1);
    record.mark_possibly_unlocked();
}

#[test]
fn stranded_handoff_is_claimed_without_blocking() {
    let m = FreelistMutex::new();
    strand_handoff(&m);

    assert!(m.is_locked());
    assert!(!m.try_lock());
    assert!(m.try_lock_until(Deadline::expired()));
    unsafe { m.unlock() };
    assert!(!m.is_locked());
    assert!(m.try_lock());
    unsafe { m.unlock() };
}

#[test]
fn stranded_handoff_is_claimed_by_blocking_lock() {
    let m = FreelistMutex::new();
    strand_handoff(&m);

    thread::scope(|s| {
        s.spawn(|| {
            m.lock();
            unsafe { m.unlock() };
        });
    });
    assert!(!m.is_locked());
}

#[test]
fn stranded_handoff_is_cleaned_up_on_drop() {
    let diagnostics = CapturedDiagnostics::install();
    let m = FreelistMutex::new();
    strand_handoff(&m);
    drop(m);
    assert!(diagnostics.messages().is_empty(), "{:?}", diagnostics.messages());
}

#[test]
fn timed_out_waiter_leaves_holder_in_charge() {
    let m = FreelistMutex::new();
    m.lock();
    thread::scope(|s| {
        s.spawn(|| assert!(!m.try_lock_until(Deadline::after(Duration::from_millis(10)))));
    });

    let record = WaiterRecord::from_handle(m.state());
    assert!(record.is_possibly_unlocked());
    // The flag alone does not free the lock: the holder still has it.
    assert!(!m.try_lock_until(Deadline::expired()));

    unsafe { m.unlock() };
    assert_eq!(m.state(), 0);
    assert!(m.try_lock());
    unsafe { m.unlock() };
}
