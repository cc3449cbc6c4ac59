//! Mutex engine keeping its waiters in the kernel's futex queue.
//!
//! No auxiliary object is ever allocated: the kernel addresses the wait queue
//! by the mutex word itself.

use crate::sync::Deadline;
use crate::sys::RawMutex;
use crate::sys::futex::{Futex, Primitive, futex_wait, futex_wake};
use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};

const UNLOCKED: Primitive = 0;
const LOCKED: Primitive = 1;
/// Locked, and some thread may be blocked in `futex_wait`.
const CONTENDED: Primitive = 2;

pub(crate) struct FutexMutex {
    futex: Futex,
}

impl FutexMutex {
    #[inline]
    pub const fn new() -> FutexMutex {
        FutexMutex { futex: Futex::new(UNLOCKED) }
    }

    #[inline]
    pub fn try_lock(&self) -> bool {
        self.futex.compare_exchange(UNLOCKED, LOCKED, Acquire, Relaxed).is_ok()
    }

    #[inline]
    pub fn lock(&self) {
        if !self.try_lock() {
            self.lock_contended(Deadline::forever());
        }
    }

    #[inline]
    pub fn try_lock_until(&self, deadline: Deadline) -> bool {
        self.try_lock() || self.lock_contended(deadline)
    }

    #[cold]
    fn lock_contended(&self, deadline: Deadline) -> bool {
        if deadline.has_expired() {
            return false;
        }

        // Announce ourselves as a waiter. If the lock was released in the
        // meantime the swap itself took it.
        if self.futex.swap(CONTENDED, Acquire) == UNLOCKED {
            return true;
        }

        loop {
            // The kernel re-checks the word against CONTENDED atomically, so
            // an unlock between the swap and the wait cannot be missed.
            let woken = futex_wait(&self.futex, CONTENDED, &deadline);

            // Woken or not, we cannot know whether other waiters remain, so
            // keep the word at CONTENDED.
            if self.futex.swap(CONTENDED, Acquire) == UNLOCKED {
                return true;
            }
            if !woken || deadline.has_expired() {
                return false;
            }
        }
    }

    #[inline]
    pub unsafe fn unlock(&self) {
        if self.futex.compare_exchange(LOCKED, UNLOCKED, Release, Relaxed).is_err() {
            self.unlock_contended();
        }
    }

    #[cold]
    fn unlock_contended(&self) {
        self.futex.store(UNLOCKED, Release);
        // Only one thread is woken. It marks the word CONTENDED again on its
        // way in, so the remaining waiters get their wake-up from its unlock.
        futex_wake(&self.futex);
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.futex.load(Relaxed) != UNLOCKED
    }
}

impl RawMutex for FutexMutex {
    const INIT: FutexMutex = FutexMutex::new();

    fn lock(&self) {
        FutexMutex::lock(self)
    }

    fn try_lock(&self) -> bool {
        FutexMutex::try_lock(self)
    }

    fn try_lock_until(&self, deadline: Deadline) -> bool {
        FutexMutex::try_lock_until(self, deadline)
    }

    unsafe fn unlock(&self) {
        unsafe { FutexMutex::unlock(self) }
    }

    fn is_locked(&self) -> bool {
        FutexMutex::is_locked(self)
    }
}

impl Drop for FutexMutex {
    fn drop(&mut self) {
        if *self.futex.get_mut() != UNLOCKED {
            crate::diagnostic::warn(format_args!("destroying locked mutex"));
        }
    }
}
