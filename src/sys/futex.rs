use crate::sync::Deadline;
use core::sync::atomic::AtomicU32;
use syscalls::{syscall, Errno, Sysno};

/// An atomic for use as a futex. The kernel only ever looks at 32 bits.
pub type Futex = AtomicU32;
/// Must be the underlying type of Futex
pub type Primitive = u32;

/// Waits for a `futex_wake` operation to wake us.
///
/// Returns directly if the futex doesn't hold the expected value.
///
/// Returns false once `deadline` has passed, and true in all other cases.
pub fn futex_wait(futex: &Futex, expected: Primitive, deadline: &Deadline) -> bool {
    use core::ptr::null;
    use core::sync::atomic::Ordering::Relaxed;

    // The deadline is already an absolute CLOCK_MONOTONIC time, which is what
    // FUTEX_WAIT_BITSET expects. Unrepresentable deadlines mean no timeout.
    let timespec = deadline.to_timespec();

    loop {
        // No need to wait if the value already changed.
        if futex.load(Relaxed) != expected {
            return true;
        }

        let r = unsafe {
            // Use FUTEX_WAIT_BITSET rather than FUTEX_WAIT to be able to give an
            // absolute time rather than a relative time.
            syscall!(
                Sysno::futex,
                futex as *const Futex,
                nc::FUTEX_WAIT_BITSET | nc::FUTEX_PRIVATE_FLAG,
                expected,
                timespec.as_ref().map_or(null(), |t| t as *const nc::timespec_t),
                null::<u32>(), // This argument is unused for FUTEX_WAIT_BITSET.
                !0u32          // A full bitmask, to make it behave like a regular FUTEX_WAIT.
            )
        };

        match r {
            Err(Errno::ETIMEDOUT) => return false,
            Err(Errno::EINTR) => continue,
            _ => return true,
        }
    }
}

/// Wakes up one thread that's blocked on `futex_wait` on this futex.
///
/// Returns true if this actually woke up such a thread,
/// or false if no thread was waiting on this futex.
pub fn futex_wake(futex: &Futex) -> bool {
    let ptr = futex as *const Futex;
    let op = nc::FUTEX_WAKE | nc::FUTEX_PRIVATE_FLAG;
    match unsafe { syscall!(Sysno::futex, ptr, op, 1) } {
        Ok(woken) => woken > 0,
        Err(errno) => {
            crate::diagnostic::warn(format_args!("futex wake failed: {errno:?}"));
            false
        }
    }
}

