use crate::sync::Deadline;
use crate::sys::FutexMutex;
use crate::sys::futex::{Futex, futex_wait, futex_wake};
use core::sync::atomic::Ordering::Relaxed;

/// Condition variable over a [`FutexMutex`].
///
/// The futex word is a notification counter: waiters sleep on the value they
/// saw before releasing the mutex, so a notify between the release and the
/// sleep changes the word and the sleep returns at once.
pub(crate) struct Condvar {
    futex: Futex,
}

impl Condvar {
    #[inline]
    pub const fn new() -> Condvar {
        Condvar { futex: Futex::new(0) }
    }

    pub fn notify_one(&self) {
        self.futex.fetch_add(1, Relaxed);
        futex_wake(&self.futex);
    }

    /// Releases `mutex`, sleeps until notified or `deadline` passes, then
    /// takes `mutex` back. Returns false on timeout. Spurious returns happen.
    ///
    /// # Safety
    ///
    /// The calling thread must hold `mutex`.
    pub unsafe fn wait_until(&self, mutex: &FutexMutex, deadline: &Deadline) -> bool {
        let futex_value = self.futex.load(Relaxed);

        unsafe { mutex.unlock() };
        let r = futex_wait(&self.futex, futex_value, deadline);
        mutex.lock();

        r
    }
}
