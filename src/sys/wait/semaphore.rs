use super::{WaitOutcome, WaitPrimitive};
use crate::sync::Deadline;
use crate::sys::futex::{Futex, futex_wait, futex_wake};
use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};

/// Counting semaphore whose count is itself the futex word.
pub(crate) struct Semaphore {
    count: Futex,
}

impl Semaphore {
    pub const fn new() -> Semaphore {
        Semaphore { count: Futex::new(0) }
    }

    fn try_acquire(&self) -> bool {
        let mut count = self.count.load(Relaxed);
        while count > 0 {
            match self.count.compare_exchange_weak(count, count - 1, Acquire, Relaxed) {
                Ok(_) => return true,
                Err(c) => count = c,
            }
        }
        false
    }
}

impl Default for Semaphore {
    fn default() -> Semaphore {
        Semaphore::new()
    }
}

impl WaitPrimitive for Semaphore {
    fn wait(&self, deadline: &Deadline) -> WaitOutcome {
        loop {
            if self.try_acquire() {
                return WaitOutcome::Woken;
            }
            if !futex_wait(&self.count, 0, deadline) {
                // A post may have landed right at the deadline.
                return if self.try_acquire() { WaitOutcome::Woken } else { WaitOutcome::TimedOut };
            }
        }
    }

    fn wake_up(&self) {
        self.count.fetch_add(1, Release);
        futex_wake(&self.count);
    }
}
