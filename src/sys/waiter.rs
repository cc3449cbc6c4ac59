//! Pooled, reference-counted waiter records for the freelist mutex engine.
//!
//! A record hosts one wait primitive for one contention episode of one mutex.
//! The mutex state word refers to it by handle; every thread that blocks on
//! it, or holds the mutex through it, owns one reference. A record goes back
//! to the pool when its last reference is dropped, at which point nothing can
//! be waiting on it.

use super::freelist::{Freelist, MAX_INDEX};
use super::wait::{PlatformWait, WaitOutcome, WaitPrimitive};
use crate::sync::Deadline;
use core::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release, SeqCst};
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicUsize, fence};

/// Offset subtracted from `waiters` while an unlock decides whether anyone is
/// left to hand the lock to. A record whose count reads `-UNLOCKING` is about
/// to be detached from its mutex.
pub(crate) const UNLOCKING: i32 = 0x0010_0000;

/// Low bits of a state word that holds a record handle.
pub(crate) const HANDLE_TAG: usize = 0b10;
const INDEX_SHIFT: usize = 2;
const GENERATION_SHIFT: usize = INDEX_SHIFT + MAX_INDEX.count_ones() as usize;

static POOL: Freelist<WaiterRecord> = Freelist::new();

#[derive(Default)]
pub(crate) struct WaiterRecord {
    /// Pool slot index.
    id: AtomicU32,
    /// Bumped on every allocation, so handles to earlier episodes go stale.
    generation: AtomicUsize,
    ref_count: AtomicI32,
    waiters: AtomicI32,
    /// Set by a waiter that timed out: an unlock may have handed it the lock
    /// after it stopped waiting. Holds one reference of its own while set.
    possibly_unlocked: AtomicBool,
    wait: PlatformWait,
}

impl WaiterRecord {
    /// Takes a record from the pool with one reference, owned by the caller.
    pub fn allocate() -> &'static WaiterRecord {
        let id = POOL.next();
        let record = POOL.get(id);
        debug_assert_eq!(record.ref_count.load(Relaxed), 0);
        debug_assert_eq!(record.waiters.load(Relaxed), 0);
        debug_assert!(!record.possibly_unlocked.load(Relaxed));

        record.id.store(id as u32, Relaxed);
        record.generation.fetch_add(1, Relaxed);
        record.ref_count.store(1, Relaxed);
        record
    }

    /// Whether a state word is a record handle rather than a plain state.
    #[inline]
    pub fn is_handle(word: usize) -> bool {
        word & HANDLE_TAG != 0
    }

    /// The record a handle names. The record may since have been recycled;
    /// callers validate with [`try_ref`](Self::try_ref) and a re-read of the
    /// state word.
    pub fn from_handle(word: usize) -> &'static WaiterRecord {
        debug_assert!(Self::is_handle(word));
        POOL.get((word >> INDEX_SHIFT) & MAX_INDEX)
    }

    /// The value a state word holds while it refers to this record.
    pub fn handle(&self) -> usize {
        let generation = self.generation.load(Relaxed);
        let index = self.id.load(Relaxed) as usize;
        (generation << GENERATION_SHIFT) | (index << INDEX_SHIFT) | HANDLE_TAG
    }

    /// Adds a reference, unless the record has already gone back to the pool.
    pub fn try_ref(&self) -> bool {
        let mut count = self.ref_count.load(Relaxed);
        loop {
            debug_assert!(count >= 0);
            if count == 0 {
                return false;
            }
            match self.ref_count.compare_exchange_weak(count, count + 1, Relaxed, Relaxed) {
                Ok(_) => return true,
                Err(c) => count = c,
            }
        }
    }

    /// Drops a reference, returning the record to the pool with the last one.
    pub fn deref(&self) {
        let previous = self.ref_count.fetch_sub(1, AcqRel);
        debug_assert!(previous > 0);
        if previous == 1 {
            self.release();
        }
    }

    fn release(&self) {
        debug_assert_eq!(self.waiters.load(Relaxed), 0);
        debug_assert!(!self.possibly_unlocked.load(Relaxed));
        POOL.release(self.id.load(Relaxed) as usize);
    }

    /// Registers one more waiter.
    ///
    /// Returns false without registering when an unlock is concluding that
    /// nobody is waiting; the caller should then try to take the lock over
    /// directly instead of sleeping.
    pub fn add_waiter(&self) -> bool {
        let mut waiters = self.waiters.load(Relaxed);
        loop {
            if waiters == -UNLOCKING {
                // Pairs with the release in `begin_unlock`: a direct hand-off
                // must see the unlocking thread's writes.
                fence(Acquire);
                return false;
            }
            match self.waiters.compare_exchange_weak(waiters, waiters + 1, Relaxed, Relaxed) {
                Ok(_) => return true,
                Err(w) => waiters = w,
            }
        }
    }

    /// Subtracts `count` waiters, also removing the unlock offset if present.
    pub fn deref_waiters(&self, count: i32) {
        let mut waiters = self.waiters.load(Relaxed);
        loop {
            let mut new = waiters;
            if new < 0 {
                new += UNLOCKING;
            }
            new -= count;
            match self.waiters.compare_exchange_weak(waiters, new, Relaxed, Relaxed) {
                Ok(_) => return,
                Err(w) => waiters = w,
            }
        }
    }

    /// Starts an unlock by applying the offset. Returns true if no thread was
    /// registered as a waiter.
    pub fn begin_unlock(&self) -> bool {
        self.waiters.fetch_sub(UNLOCKING, Release) == 0
    }

    pub fn is_possibly_unlocked(&self) -> bool {
        self.possibly_unlocked.load(Relaxed)
    }

    /// Raises the flag. The caller's reference is kept by the flag, unless
    /// the flag was already up, in which case it is dropped. Returns whether
    /// this call raised it.
    pub fn mark_possibly_unlocked(&self) -> bool {
        if self.possibly_unlocked.compare_exchange(false, true, SeqCst, Relaxed).is_err() {
            self.deref();
            return false;
        }
        true
    }

    /// Lowers the flag, dropping the reference it held.
    ///
    /// The flag and the mutex word are ordered against each other: a thread
    /// that raises the flag and then finds the record still attached can rely
    /// on the thread detaching it to see the flag here.
    pub fn clear_possibly_unlocked(&self) {
        if self.possibly_unlocked.load(SeqCst)
            && self.possibly_unlocked.compare_exchange(true, false, Relaxed, Relaxed).is_ok()
        {
            self.deref();
        }
    }

    pub fn wait(&self, deadline: &Deadline) -> WaitOutcome {
        self.wait.wait(deadline)
    }

    pub fn wake_up(&self) {
        self.wait.wake_up();
    }

    #[cfg(test)]
    pub fn ref_count(&self) -> i32 {
        self.ref_count.load(Relaxed)
    }

    #[cfg(test)]
    pub fn waiters(&self) -> i32 {
        self.waiters.load(Relaxed)
    }
}
