use core::cell::UnsafeCell;
use core::time::Duration;
use std::format;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::channel;
use std::thread;
use std::time::Instant;

use crate::sync::{BasicMutex, Deadline};
use crate::sys::RawMutex;

/// Data guarded by a raw mutex of type `M`.
struct Guarded<M, T> {
    lock: M,
    value: UnsafeCell<T>,
}

unsafe impl<M: RawMutex, T: Send> Sync for Guarded<M, T> {}

impl<M: RawMutex, T> Guarded<M, T> {
    fn new(value: T) -> Self {
        Guarded { lock: M::INIT, value: UnsafeCell::new(value) }
    }

    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.lock.lock();
        let r = f(unsafe { &mut *self.value.get() });
        unsafe { self.lock.unlock() };
        r
    }
}

fn smoke<M: RawMutex>() {
    let m = M::INIT;
    m.lock();
    unsafe { m.unlock() };
    m.lock();
    unsafe { m.unlock() };
    assert!(!m.is_locked());
}

fn try_lock<M: RawMutex>() {
    let m = M::INIT;
    assert!(m.try_lock());
    assert!(m.is_locked());
    assert!(!m.try_lock());
    unsafe { m.unlock() };
    assert!(m.try_lock());
    unsafe { m.unlock() };
}

fn lots_and_lots<M: RawMutex>() {
    const THREADS: u64 = 4;
    const INCREMENTS: u64 = 100_000;

    let counter = Guarded::<M, u64>::new(0);
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..INCREMENTS {
                    counter.with(|c| *c += 1);
                }
            });
        }
    });
    assert_eq!(counter.with(|c| *c), THREADS * INCREMENTS);
}

fn no_lost_wakeups<M: RawMutex + 'static>() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 5_000;

    let shared = Arc::new(Guarded::<M, usize>::new(0));
    let completions = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = channel();
    for _ in 0..THREADS {
        let (shared, completions, tx) = (shared.clone(), completions.clone(), tx.clone());
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                shared.with(|n| {
                    *n += 1;
                    core::hint::spin_loop();
                });
                completions.fetch_add(1, Ordering::Relaxed);
            }
            tx.send(()).unwrap();
        });
    }
    drop(tx);

    for _ in 0..THREADS {
        rx.recv_timeout(Duration::from_secs(60)).expect("a locking thread never finished");
    }
    assert_eq!(completions.load(Ordering::Relaxed), THREADS * ROUNDS);
    assert_eq!(shared.with(|n| *n), THREADS * ROUNDS);
}

fn zero_timeout_never_blocks<M: RawMutex>() {
    let m = M::INIT;
    m.lock();
    thread::scope(|s| {
        s.spawn(|| {
            let start = Instant::now();
            for _ in 0..100 {
                assert!(!m.try_lock());
                assert!(!m.try_lock_until(Deadline::expired()));
                assert!(!m.try_lock_until(Deadline::after(Duration::ZERO)));
            }
            assert!(start.elapsed() < Duration::from_millis(500), "took {:?}", start.elapsed());
        });
    });
    unsafe { m.unlock() };
}

fn deadline_is_honored<M: RawMutex>() {
    const TIMEOUT: Duration = Duration::from_millis(50);

    let m = M::INIT;
    m.lock();
    thread::scope(|s| {
        s.spawn(|| {
            let start = Instant::now();
            assert!(!m.try_lock_until(Deadline::after(TIMEOUT)));
            let elapsed = start.elapsed();
            assert!(elapsed >= TIMEOUT, "gave up after {elapsed:?}");
            assert!(elapsed < Duration::from_secs(5), "gave up after {elapsed:?}");
        });
    });

    // Still ours after the other thread gave up.
    assert!(m.is_locked());
    assert!(!m.try_lock());
    unsafe { m.unlock() };

    thread::scope(|s| {
        s.spawn(|| {
            m.lock();
            unsafe { m.unlock() };
        });
    });
    assert!(m.try_lock());
    unsafe { m.unlock() };
}

fn timed_waiter_then_blocking_waiter<M: RawMutex>() {
    let m = M::INIT;
    let acquired = AtomicBool::new(false);
    m.lock();
    thread::scope(|s| {
        s.spawn(|| assert!(!m.try_lock_until(Deadline::after(Duration::from_millis(20)))));
        let blocked = s.spawn(|| {
            m.lock();
            acquired.store(true, Ordering::Relaxed);
            unsafe { m.unlock() };
        });
        thread::sleep(Duration::from_millis(60));
        assert!(!acquired.load(Ordering::Relaxed));
        unsafe { m.unlock() };
        blocked.join().unwrap();
    });
    assert!(acquired.load(Ordering::Relaxed));
}

fn handoff_publishes_writes<M: RawMutex>() {
    const ROUNDS: u64 = 200;

    struct Payload {
        ready: bool,
        words: [u64; 16],
    }

    let shared = Guarded::<M, Payload>::new(Payload { ready: false, words: [0; 16] });
    for round in 1..=ROUNDS {
        shared.lock.lock();
        thread::scope(|s| {
            let reader = s.spawn(|| {
                // Blocks until the writer below unlocks.
                shared.with(|p| {
                    assert!(p.ready, "reader got in before the writer released");
                    assert!(p.words.iter().all(|&w| w == round), "torn payload in round {round}");
                    p.ready = false;
                });
            });
            {
                let p = unsafe { &mut *shared.value.get() };
                p.words = [round; 16];
                p.ready = true;
            }
            unsafe { shared.lock.unlock() };
            reader.join().unwrap();
        });
    }
}

fn mixed_timed_and_blocking<M: RawMutex>() {
    const THREADS: usize = 6;
    const ROUNDS: usize = 2_000;

    let counter = Guarded::<M, usize>::new(0);
    let timeouts = AtomicUsize::new(0);
    thread::scope(|s| {
        for t in 0..THREADS {
            let (counter, timeouts) = (&counter, &timeouts);
            s.spawn(move || {
                for i in 0..ROUNDS {
                    if (t + i) % 3 == 0 {
                        let deadline = Deadline::after(Duration::from_micros(20));
                        if counter.lock.try_lock_until(deadline) {
                            unsafe { *counter.value.get() += 1 };
                            unsafe { counter.lock.unlock() };
                        } else {
                            timeouts.fetch_add(1, Ordering::Relaxed);
                        }
                    } else {
                        counter.with(|c| *c += 1);
                    }
                }
            });
        }
    });

    // A waiter that timed out may have left the lock handed to nobody; a
    // zero-timeout attempt claims it.
    assert!(counter.lock.try_lock_until(Deadline::expired()));
    unsafe { counter.lock.unlock() };
    assert!(!counter.lock.is_locked());
    assert_eq!(
        unsafe { *counter.value.get() } + timeouts.load(Ordering::Relaxed),
        THREADS * ROUNDS
    );
}

macro_rules! engine_tests {
    ($($module:ident: $engine:ty,)*) => {$(
        mod $module {
            use super::*;

            #[test]
            fn smoke() { super::smoke::<$engine>() }
            #[test]
            fn try_lock() { super::try_lock::<$engine>() }
            #[test]
            fn lots_and_lots() { super::lots_and_lots::<$engine>() }
            #[test]
            fn no_lost_wakeups() { super::no_lost_wakeups::<$engine>() }
            #[test]
            fn zero_timeout_never_blocks() { super::zero_timeout_never_blocks::<$engine>() }
            #[test]
            fn deadline_is_honored() { super::deadline_is_honored::<$engine>() }
            #[test]
            fn timed_waiter_then_blocking_waiter() {
                super::timed_waiter_then_blocking_waiter::<$engine>()
            }
            #[test]
            fn handoff_publishes_writes() { super::handoff_publishes_writes::<$engine>() }
            #[test]
            fn mixed_timed_and_blocking() { super::mixed_timed_and_blocking::<$engine>() }
        }
    )*};
}

engine_tests! {
    futex: crate::sys::FutexMutex,
    freelist: crate::sys::FreelistMutex,
}

#[test]
fn basic_mutex_in_a_static() {
    static LOCK: BasicMutex = BasicMutex::new();
    LOCK.lock();
    assert!(LOCK.is_locked());
    unsafe { LOCK.unlock() };
    assert!(!LOCK.is_locked());
}

#[test]
fn basic_mutex_try_lock_for() {
    let m = Arc::new(BasicMutex::new());
    m.lock();
    let m2 = m.clone();
    let t = thread::spawn(move || m2.try_lock_for(Duration::from_millis(10)));
    assert!(!t.join().unwrap());

    let m2 = m.clone();
    let t = thread::spawn(move || {
        let got = m2.try_lock_for(Duration::from_secs(30));
        if got {
            unsafe { m2.unlock() };
        }
        got
    });
    thread::sleep(Duration::from_millis(10));
    unsafe { m.unlock() };
    assert!(t.join().unwrap());
}

#[test]
fn basic_mutex_debug() {
    let m = BasicMutex::default();
    assert_eq!(format!("{m:?}"), "BasicMutex { locked: false }");
    m.lock();
    assert_eq!(format!("{m:?}"), "BasicMutex { locked: true }");
    unsafe { m.unlock() };
}
