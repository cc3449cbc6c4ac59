//! Mutual exclusion primitives.
//!
//! - [`BasicMutex`]: A non-recursive mutex. Locking and unlocking without
//!   contention is a single atomic compare-and-swap and never enters the
//!   kernel.
//!
//! - [`RecursiveMutex`]: A mutex the holding thread may lock again. Each
//!   `lock` must be matched by an `unlock` before another thread gets in.
//!
//! - [`Deadline`]: Bounds how long a `try_lock_*` call may block.
//!
//! Both mutexes are raw: they protect no data and hand out no guards. Wake
//! order among blocked threads is unspecified; an unlock wakes one of them,
//! not necessarily the one that has waited longest.
//!
//! [`BasicMutex`]: BasicMutex
//! [`RecursiveMutex`]: RecursiveMutex
//! [`Deadline`]: Deadline

mod deadline;
mod mutex;
mod recursive_mutex;

pub use deadline::Deadline;
pub use mutex::BasicMutex;
pub use recursive_mutex::RecursiveMutex;
