use crate::sync::{BasicMutex, Deadline};
use crate::sys::thread;
use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::AtomicUsize;
use core::sync::atomic::Ordering::Relaxed;
use core::time::Duration;

const NO_OWNER: usize = 0;

/// A mutex the holding thread can lock again without deadlocking.
///
/// The mutex is released to other threads once [`unlock`] has been called as
/// many times as it was locked. Re-locking by the holder never touches the
/// inner [`BasicMutex`].
///
/// [`unlock`]: Self::unlock
///
/// # Examples
///
/// ```
/// use slimlock::sync::RecursiveMutex;
///
/// let mutex = RecursiveMutex::new();
/// mutex.lock();
/// mutex.lock();
/// unsafe {
///     mutex.unlock();
///     mutex.unlock();
/// }
/// ```
pub struct RecursiveMutex {
    /// Identity of the holder. Only ever set to the calling thread's id or
    /// cleared by the holder, so a thread comparing it with its own id gets a
    /// reliable answer even with relaxed loads.
    owner: AtomicUsize,
    /// Extra locks taken by the holder. Only the holder touches it.
    count: UnsafeCell<u32>,
    mutex: BasicMutex,
}

// `count` is only accessed by the thread that holds `mutex`.
unsafe impl Send for RecursiveMutex {}
unsafe impl Sync for RecursiveMutex {}

impl RecursiveMutex {
    /// Creates a new mutex in an unlocked state ready for use.
    #[inline]
    pub const fn new() -> RecursiveMutex {
        RecursiveMutex {
            owner: AtomicUsize::new(NO_OWNER),
            count: UnsafeCell::new(0),
            mutex: BasicMutex::new(),
        }
    }

    /// Acquires the mutex, blocking the current thread until it is able to do
    /// so. Returns at once if the current thread already holds it.
    pub fn lock(&self) {
        let me = thread::current_id();
        if self.reenter(me) {
            return;
        }
        self.mutex.lock();
        self.owner.store(me, Relaxed);
    }

    /// Attempts to acquire the mutex without blocking.
    #[must_use]
    pub fn try_lock(&self) -> bool {
        let me = thread::current_id();
        if self.reenter(me) {
            return true;
        }
        if !self.mutex.try_lock() {
            return false;
        }
        self.owner.store(me, Relaxed);
        true
    }

    /// Attempts to acquire the mutex, blocking for at most `timeout`.
    #[must_use]
    pub fn try_lock_for(&self, timeout: Duration) -> bool {
        self.try_lock_until(Deadline::after(timeout))
    }

    /// Attempts to acquire the mutex, blocking until `deadline` at the latest.
    ///
    /// # Examples
    ///
    /// ```
    /// use slimlock::sync::{Deadline, RecursiveMutex};
    ///
    /// let mutex = RecursiveMutex::new();
    /// assert!(mutex.try_lock_until(Deadline::forever()));
    /// // The holder gets straight back in, whatever the deadline.
    /// assert!(mutex.try_lock_until(Deadline::expired()));
    /// unsafe {
    ///     mutex.unlock();
    ///     mutex.unlock();
    /// }
    /// ```
    #[must_use]
    pub fn try_lock_until(&self, deadline: Deadline) -> bool {
        let me = thread::current_id();
        if self.reenter(me) {
            return true;
        }
        if !self.mutex.try_lock_until(deadline) {
            return false;
        }
        self.owner.store(me, Relaxed);
        true
    }

    /// Counts one more level if `me` already holds the mutex.
    #[inline]
    fn reenter(&self, me: usize) -> bool {
        if self.owner.load(Relaxed) != me {
            return false;
        }
        unsafe { *self.count.get() += 1 };
        true
    }

    /// Releases one level of locking. The last one releases the mutex.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the mutex, and may not call `unlock`
    /// more often than it locked.
    pub unsafe fn unlock(&self) {
        debug_assert_eq!(
            self.owner.load(Relaxed),
            thread::current_id(),
            "RecursiveMutex unlocked by a thread that does not hold it"
        );
        let count = unsafe { &mut *self.count.get() };
        if *count > 0 {
            *count -= 1;
        } else {
            self.owner.store(NO_OWNER, Relaxed);
            unsafe { self.mutex.unlock() };
        }
    }

    /// Whether some thread holds the mutex. Meant for diagnostics only.
    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }
}

impl Default for RecursiveMutex {
    fn default() -> RecursiveMutex {
        RecursiveMutex::new()
    }
}

impl fmt::Debug for RecursiveMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = self.owner.load(Relaxed);
        f.debug_struct("RecursiveMutex")
            .field("locked", &self.is_locked())
            .field("owner", &(owner != NO_OWNER).then_some(owner))
            .finish_non_exhaustive()
    }
}
