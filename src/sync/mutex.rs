use crate::sync::Deadline;
use crate::sys;
use core::fmt;
use core::time::Duration;

/// A non-recursive mutual exclusion primitive.
///
/// The mutex guards no data of its own; callers pair [`lock`] with
/// [`unlock`] around whatever they share. Without contention both are a
/// single compare-and-swap and make no syscall. Contended threads block in
/// the kernel until the holder unlocks or their deadline passes.
///
/// Memory written by a thread before it unlocks is visible to the thread
/// that next locks.
///
/// Locking a `BasicMutex` the calling thread already holds deadlocks. Use a
/// [`RecursiveMutex`](crate::sync::RecursiveMutex) where that is needed.
///
/// [`lock`]: Self::lock
/// [`unlock`]: Self::unlock
///
/// # Examples
///
/// ```
/// use slimlock::sync::BasicMutex;
/// use std::cell::UnsafeCell;
/// use std::sync::Arc;
/// use std::thread;
///
/// struct Counter {
///     lock: BasicMutex,
///     value: UnsafeCell<u64>,
/// }
///
/// // `value` is only touched with `lock` held.
/// unsafe impl Sync for Counter {}
///
/// let counter = Arc::new(Counter { lock: BasicMutex::new(), value: UnsafeCell::new(0) });
///
/// let threads: Vec<_> = (0..4)
///     .map(|_| {
///         let counter = Arc::clone(&counter);
///         thread::spawn(move || {
///             for _ in 0..1000 {
///                 counter.lock.lock();
///                 unsafe { *counter.value.get() += 1 };
///                 unsafe { counter.lock.unlock() };
///             }
///         })
///     })
///     .collect();
///
/// for thread in threads {
///     thread.join().unwrap();
/// }
/// assert_eq!(unsafe { *counter.value.get() }, 4000);
/// ```
pub struct BasicMutex {
    inner: sys::Mutex,
}

impl BasicMutex {
    /// Creates a new mutex in an unlocked state ready for use.
    ///
    /// # Examples
    ///
    /// ```
    /// use slimlock::sync::BasicMutex;
    ///
    /// static LOCK: BasicMutex = BasicMutex::new();
    /// ```
    #[inline]
    pub const fn new() -> BasicMutex {
        BasicMutex { inner: sys::Mutex::new() }
    }

    /// Acquires the mutex, blocking the current thread until it is able to
    /// do so.
    #[inline]
    pub fn lock(&self) {
        self.inner.lock()
    }

    /// Attempts to acquire the mutex without blocking.
    ///
    /// This is exactly the uncontended fast path: it fails whenever the
    /// mutex is held, and never makes a syscall.
    ///
    /// # Examples
    ///
    /// ```
    /// use slimlock::sync::BasicMutex;
    ///
    /// let mutex = BasicMutex::new();
    /// assert!(mutex.try_lock());
    /// assert!(!mutex.try_lock());
    /// unsafe { mutex.unlock() };
    /// ```
    #[inline]
    #[must_use]
    pub fn try_lock(&self) -> bool {
        self.inner.try_lock()
    }

    /// Attempts to acquire the mutex, blocking for at most `timeout`.
    ///
    /// A zero timeout never blocks. Unlike [`try_lock`](Self::try_lock) it may
    /// still take over a lock that an unlocking thread handed to a waiter
    /// which had already given up.
    #[must_use]
    pub fn try_lock_for(&self, timeout: Duration) -> bool {
        self.try_lock_until(Deadline::after(timeout))
    }

    /// Attempts to acquire the mutex, blocking until `deadline` at the latest.
    ///
    /// Timing out is not an error: the mutex is left exactly as it was.
    ///
    /// # Examples
    ///
    /// ```
    /// use slimlock::sync::{BasicMutex, Deadline};
    /// use std::time::Duration;
    ///
    /// let mutex = BasicMutex::new();
    /// mutex.lock();
    /// assert!(!mutex.try_lock_until(Deadline::after(Duration::from_millis(10))));
    /// unsafe { mutex.unlock() };
    /// ```
    #[inline]
    #[must_use]
    pub fn try_lock_until(&self, deadline: Deadline) -> bool {
        self.inner.try_lock_until(deadline)
    }

    /// Releases the mutex.
    ///
    /// # Safety
    ///
    /// The mutex must be held, and it must be held by the calling thread.
    #[inline]
    pub unsafe fn unlock(&self) {
        unsafe { self.inner.unlock() }
    }

    /// Whether some thread holds the mutex.
    ///
    /// The answer may be stale by the time it is returned; it is meant for
    /// assertions and diagnostics, not for synchronization.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

impl Default for BasicMutex {
    /// Creates an unlocked mutex. This is equivalent to [`BasicMutex::new`].
    fn default() -> BasicMutex {
        BasicMutex::new()
    }
}

impl fmt::Debug for BasicMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicMutex").field("locked", &self.is_locked()).finish()
    }
}
