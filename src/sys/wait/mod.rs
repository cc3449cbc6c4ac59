//! Blocking primitives a pooled waiter record sleeps on.
//!
//! All of them keep a pending signal when nobody is waiting: a `wake_up`
//! that runs before the matching `wait` is consumed by that `wait`.

#[cfg_attr(not(feature = "wait-eventfd"), allow(dead_code))]
mod event;
mod semaphore;
#[cfg_attr(not(feature = "wait-condvar"), allow(dead_code))]
mod signal;

use crate::sync::Deadline;

#[cfg_attr(not(feature = "wait-eventfd"), allow(unused_imports))]
pub(crate) use event::Event;
pub(crate) use semaphore::Semaphore;
#[cfg_attr(not(feature = "wait-condvar"), allow(unused_imports))]
pub(crate) use signal::SignalCondvar;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    /// A `wake_up` was consumed.
    Woken,
    TimedOut,
}

pub(crate) trait WaitPrimitive: Default + Send + Sync {
    /// Sleeps until a signal is available or `deadline` passes. An expired
    /// deadline still consumes a signal that is already pending.
    fn wait(&self, deadline: &Deadline) -> WaitOutcome;

    /// Releases one waiter, or leaves a signal for the next `wait`.
    fn wake_up(&self);
}

#[cfg(feature = "wait-eventfd")]
pub(crate) type PlatformWait = Event;
#[cfg(all(feature = "wait-condvar", not(feature = "wait-eventfd")))]
pub(crate) type PlatformWait = SignalCondvar;
#[cfg(not(any(feature = "wait-condvar", feature = "wait-eventfd")))]
pub(crate) type PlatformWait = Semaphore;
