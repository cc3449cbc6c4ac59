#[cfg_attr(not(all(feature = "freelist", feature = "wait-condvar")), allow(dead_code))]
mod condvar;
#[cfg_attr(not(all(feature = "freelist", feature = "wait-eventfd")), allow(dead_code))]
pub(crate) mod error;
#[cfg_attr(not(feature = "freelist"), allow(dead_code))]
pub(crate) mod freelist;
#[cfg_attr(not(feature = "freelist"), allow(dead_code))]
mod freelist_mutex;
pub(crate) mod futex;
mod futex_mutex;
pub(crate) mod thread;
pub(crate) mod timespec;
#[cfg_attr(not(feature = "freelist"), allow(dead_code))]
pub(crate) mod wait;
#[cfg_attr(not(feature = "freelist"), allow(dead_code))]
pub(crate) mod waiter;

use crate::sync::Deadline;

#[cfg_attr(not(feature = "freelist"), allow(unused_imports))]
pub(crate) use condvar::Condvar;
#[cfg_attr(not(feature = "freelist"), allow(unused_imports))]
pub(crate) use freelist_mutex::FreelistMutex;
pub(crate) use futex_mutex::FutexMutex;

/// The engine behind [`crate::sync::BasicMutex`], picked at build time.
#[cfg(not(feature = "freelist"))]
pub(crate) type Mutex = FutexMutex;
#[cfg(feature = "freelist")]
pub(crate) type Mutex = FreelistMutex;

/// The operations every mutex engine provides.
///
/// Both engines are always built; the seam lets the same tests drive each.
pub(crate) trait RawMutex: Send + Sync {
    const INIT: Self;

    /// Blocks until the lock is held by the calling thread.
    fn lock(&self);

    /// One compare-and-swap; never blocks and never touches a slow path.
    fn try_lock(&self) -> bool;

    /// Blocks until the lock is acquired or `deadline` passes. An expired
    /// deadline never blocks.
    fn try_lock_until(&self, deadline: Deadline) -> bool;

    /// # Safety
    ///
    /// The calling thread must hold the lock.
    unsafe fn unlock(&self);

    /// Whether some thread holds the lock. Stale as soon as it returns.
    fn is_locked(&self) -> bool;
}
