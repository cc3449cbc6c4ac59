//! Mutex engine that parks contended threads on pooled waiter records.
//!
//! This is the engine for kernels without a futex-like call; the only thing
//! it asks of the platform is a wait primitive (see [`super::wait`]). The
//! state word is one of:
//!
//! * `UNLOCKED`
//! * `LOCKED`: held, and nobody has needed to wait yet
//! * a [`WaiterRecord`] handle: held, with a record threads block on
//!
//! While a handle is installed the lock is handed from the unlocking thread
//! straight to a woken waiter; the word does not pass through `UNLOCKED`.

use super::waiter::WaiterRecord;
use crate::sync::Deadline;
use crate::sys::RawMutex;
use crate::sys::wait::WaitOutcome;
use core::sync::atomic::AtomicUsize;
use core::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release, SeqCst};

const UNLOCKED: usize = 0;
const LOCKED: usize = 1;

pub(crate) struct FreelistMutex {
    state: AtomicUsize,
}

impl FreelistMutex {
    #[inline]
    pub const fn new() -> FreelistMutex {
        FreelistMutex { state: AtomicUsize::new(UNLOCKED) }
    }

    #[inline]
    pub fn try_lock(&self) -> bool {
        self.state.compare_exchange(UNLOCKED, LOCKED, Acquire, Relaxed).is_ok()
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
        let non_blocking = deadline.has_expired();

        while !self.try_lock() {
            let mut word = self.state.load(Acquire);
            if word == UNLOCKED {
                continue;
            }

            if word == LOCKED {
                if non_blocking {
                    return false;
                }
                // First waiter of this episode: install a record. Its initial
                // reference passes to whoever holds the lock through it.
                let fresh = WaiterRecord::allocate();
                let handle = fresh.handle();
                if self.state.compare_exchange(LOCKED, handle, AcqRel, Acquire).is_err() {
                    // Unlocked meanwhile, or another waiter installed one.
                    fresh.deref();
                    continue;
                }
                word = handle;
            }

            let record = WaiterRecord::from_handle(word);

            // A waiter that timed out may have been handed the lock anyway;
            // then even a non-blocking attempt can take it over.
            if non_blocking && !record.is_possibly_unlocked() {
                return false;
            }

            // The record may be released and recycled at any moment. A zero
            // count means it already was.
            if !record.try_ref() {
                continue;
            }
            // Our reference pins it now, but it may have been recycled for
            // another episode before we took it.
            if self.state.load(Acquire) != word {
                record.deref();
                continue;
            }

            if !record.add_waiter() {
                // The holder is unlocking and found no waiters; it is about to
                // reset the word to UNLOCKED. Take the lock over instead.
                if self.state.compare_exchange(word, LOCKED, SeqCst, Relaxed).is_ok() {
                    record.clear_possibly_unlocked();
                    record.deref();
                    return true;
                }
                record.deref();
                continue;
            }

            if self.state.load(Acquire) != word {
                // Unlocked before we registered.
                record.deref_waiters(1);
                record.deref();
                continue;
            }

            match record.wait(&deadline) {
                WaitOutcome::Woken => {
                    // The lock was handed to us. Keep the reference: it is
                    // dropped by our own unlock.
                    record.clear_possibly_unlocked();
                    record.deref_waiters(1);
                    debug_assert_eq!(self.state.load(Relaxed), word);
                    return true;
                }
                WaitOutcome::TimedOut => {
                    record.deref_waiters(1);
                    // An unlock may have counted us and signaled after we gave
                    // up. Leave a mark so the signal is not stranded; our
                    // reference stays with the mark.
                    if record.mark_possibly_unlocked() && self.state.load(SeqCst) != word {
                        // Already detached; nobody else will lower the mark.
                        record.clear_possibly_unlocked();
                    }
                    return false;
                }
            }
        }
        true
    }

    #[inline]
    pub unsafe fn unlock(&self) {
        if self.state.compare_exchange(LOCKED, UNLOCKED, Release, Relaxed).is_err() {
            self.unlock_contended();
        }
    }

    #[cold]
    fn unlock_contended(&self) {
        let word = self.state.load(Acquire);
        debug_assert!(WaiterRecord::is_handle(word), "unlocking a mutex that is not locked");
        let record = WaiterRecord::from_handle(word);

        // Lockers cannot register while the offset is applied, so a zero here
        // stays zero until the word is reset.
        if record.begin_unlock() {
            if self.state.compare_exchange(word, UNLOCKED, SeqCst, Relaxed).is_ok() {
                record.clear_possibly_unlocked();
            }
            record.deref_waiters(0);
        } else {
            record.deref_waiters(0);
            // Ownership passes to the woken thread.
            record.wake_up();
        }
        record.deref();
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Relaxed) != UNLOCKED
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> usize {
        self.state.load(Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn set_state(&self, word: usize) {
        self.state.store(word, Release);
    }
}

impl RawMutex for FreelistMutex {
    const INIT: FreelistMutex = FreelistMutex::new();

    fn lock(&self) {
        FreelistMutex::lock(self)
    }

    fn try_lock(&self) -> bool {
        FreelistMutex::try_lock(self)
    }

    fn try_lock_until(&self, deadline: Deadline) -> bool {
        FreelistMutex::try_lock_until(self, deadline)
    }

    unsafe fn unlock(&self) {
        unsafe { FreelistMutex::unlock(self) }
    }

    fn is_locked(&self) -> bool {
        FreelistMutex::is_locked(self)
    }
}

impl Drop for FreelistMutex {
    fn drop(&mut self) {
        let word = *self.state.get_mut();
        if word == UNLOCKED {
            return;
        }
        // A timed-out waiter may have left the lock handed over to nobody.
        // Claim it and release it properly so the record goes back to the pool.
        if WaiterRecord::is_handle(word)
            && WaiterRecord::from_handle(word).is_possibly_unlocked()
            && self.try_lock_until(Deadline::expired())
        {
            unsafe { self.unlock() };
            return;
        }
        crate::diagnostic::warn(format_args!("destroying locked mutex"));
    }
}
