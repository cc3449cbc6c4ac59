use super::{WaitOutcome, WaitPrimitive};
use crate::sync::Deadline;
use crate::sys::{Condvar, FutexMutex};
use core::cell::UnsafeCell;

/// A "signaled" flag guarded by a lock, with a condition variable to sleep on
/// until it is raised.
pub(crate) struct SignalCondvar {
    lock: FutexMutex,
    cond: Condvar,
    signaled: UnsafeCell<bool>,
}

// `signaled` is only touched with `lock` held.
unsafe impl Send for SignalCondvar {}
unsafe impl Sync for SignalCondvar {}

impl SignalCondvar {
    pub const fn new() -> SignalCondvar {
        SignalCondvar {
            lock: FutexMutex::new(),
            cond: Condvar::new(),
            signaled: UnsafeCell::new(false),
        }
    }
}

impl Default for SignalCondvar {
    fn default() -> SignalCondvar {
        SignalCondvar::new()
    }
}

impl WaitPrimitive for SignalCondvar {
    fn wait(&self, deadline: &Deadline) -> WaitOutcome {
        self.lock.lock();
        let mut timed_out = false;
        let outcome = loop {
            let signaled = unsafe { &mut *self.signaled.get() };
            if *signaled {
                *signaled = false;
                break WaitOutcome::Woken;
            }
            // Spurious returns from the condvar land back on the flag check.
            if timed_out {
                break WaitOutcome::TimedOut;
            }
            timed_out = !unsafe { self.cond.wait_until(&self.lock, deadline) };
        };
        unsafe { self.lock.unlock() };
        outcome
    }

    fn wake_up(&self) {
        self.lock.lock();
        unsafe { *self.signaled.get() = true };
        self.cond.notify_one();
        unsafe { self.lock.unlock() };
    }
}
