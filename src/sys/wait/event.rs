use super::{Semaphore, WaitOutcome, WaitPrimitive};
use crate::sync::Deadline;
use crate::sys::error::SysError;
use crate::sys::timespec::duration_to_timespec;
use core::ptr::null;
use core::sync::atomic::AtomicI32;
use core::sync::atomic::Ordering::{AcqRel, Acquire};
use core::sync::atomic::fence;
use core::time::Duration;
use syscalls::{Errno, Sysno, syscall};

/// Not created yet.
const NO_FD: i32 = -1;
/// Creation failed; the event runs on its fallback semaphore for good.
const DEGRADED: i32 = -2;

/// Pause between attempts once the descriptor has started failing.
const BACK_OFF: Duration = Duration::from_millis(1);

const EFD_SEMAPHORE: i32 = 1;
const POLLIN: i16 = 0x1;

#[repr(C)]
struct PollFd {
    fd: i32,
    events: i16,
    revents: i16,
}

/// Event backed by an `eventfd` kernel object in semaphore mode: each
/// `wake_up` adds one to the kernel counter and each successful `wait` takes
/// one off.
///
/// The descriptor is created on first use, since pooled records are far more
/// numerous than records that ever see contention.
pub(crate) struct Event {
    fd: AtomicI32,
    fallback: Semaphore,
}

impl Event {
    pub const fn new() -> Event {
        Event { fd: AtomicI32::new(NO_FD), fallback: Semaphore::new() }
    }

    /// An event whose descriptor could not be created.
    #[cfg(test)]
    pub(crate) const fn degraded() -> Event {
        Event { fd: AtomicI32::new(DEGRADED), fallback: Semaphore::new() }
    }

    /// An event over an existing descriptor, which it takes ownership of.
    #[cfg(test)]
    pub(crate) const fn from_raw_fd(fd: i32) -> Event {
        Event { fd: AtomicI32::new(fd), fallback: Semaphore::new() }
    }

    /// The descriptor, or `None` when the event is degraded.
    fn fd(&self) -> Option<i32> {
        match self.fd.load(Acquire) {
            DEGRADED => return None,
            NO_FD => {}
            fd => return Some(fd),
        }

        let created = match create() {
            Ok(fd) => fd,
            Err(e) => {
                e.report();
                DEGRADED
            }
        };
        match self.fd.compare_exchange(NO_FD, created, AcqRel, Acquire) {
            Ok(_) => (created >= 0).then_some(created),
            Err(existing) => {
                if created >= 0 {
                    close(created);
                }
                (existing >= 0).then_some(existing)
            }
        }
    }
}

impl Default for Event {
    fn default() -> Event {
        Event::new()
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        let fd = *self.fd.get_mut();
        if fd >= 0 {
            close(fd);
        }
    }
}

impl WaitPrimitive for Event {
    fn wait(&self, deadline: &Deadline) -> WaitOutcome {
        let Some(fd) = self.fd() else {
            return self.fallback.wait(deadline);
        };

        let mut failing = false;
        loop {
            let error = match try_read(fd) {
                Ok(true) => {
                    fence(Acquire);
                    return WaitOutcome::Woken;
                }
                Ok(false) => None,
                Err(e) => Some(e),
            };
            if deadline.has_expired() {
                return WaitOutcome::TimedOut;
            }
            // Several waiters may share one event: a readable descriptor only
            // means the counter was non-zero, so go back to the read.
            if let Some(e) = error.or_else(|| poll(fd, deadline).err()) {
                // One report per wait; after that just keep checking the
                // counter at a slow pace.
                if !failing {
                    e.report();
                    failing = true;
                }
                back_off(deadline);
            }
        }
    }

    fn wake_up(&self) {
        match self.fd() {
            Some(fd) => {
                if let Err(e) = write_one(fd) {
                    e.report();
                }
            }
            None => self.fallback.wake_up(),
        }
    }
}

fn create() -> Result<i32, SysError> {
    let flags = EFD_SEMAPHORE | nc::O_NONBLOCK as i32 | nc::O_CLOEXEC as i32;
    unsafe { syscall!(Sysno::eventfd2, 0, flags) }
        .map(|fd| fd as i32)
        .map_err(SysError::EventCreate)
}

fn close(fd: i32) {
    // Nothing useful can be done if close fails.
    let _ = unsafe { syscall!(Sysno::close, fd) };
}

/// Takes one unit off the counter without blocking. `Ok(false)` when it is zero.
fn try_read(fd: i32) -> Result<bool, SysError> {
    let mut value: u64 = 0;
    loop {
        match unsafe { syscall!(Sysno::read, fd, &mut value as *mut u64, size_of::<u64>()) } {
            Ok(_) => return Ok(true),
            Err(Errno::EAGAIN) => return Ok(false),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(SysError::EventRead(errno)),
        }
    }
}

fn write_one(fd: i32) -> Result<(), SysError> {
    let value: u64 = 1;
    loop {
        match unsafe { syscall!(Sysno::write, fd, &value as *const u64, size_of::<u64>()) } {
            Ok(_) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(SysError::EventWrite(errno)),
        }
    }
}

/// Sleeps until the descriptor is readable or the deadline passes.
fn poll(fd: i32, deadline: &Deadline) -> Result<(), SysError> {
    let mut pollfd = PollFd { fd, events: POLLIN, revents: 0 };
    // ppoll takes a relative timeout.
    let timeout = deadline.remaining().map(duration_to_timespec);
    let r = unsafe {
        syscall!(
            Sysno::ppoll,
            &mut pollfd as *mut PollFd,
            1,
            timeout.as_ref().map_or(null(), |t| t as *const nc::timespec_t),
            null::<u8>(),
            0
        )
    };
    match r {
        Ok(_) | Err(Errno::EINTR) => Ok(()),
        Err(errno) => Err(SysError::Poll(errno)),
    }
}

/// Sleeps for [`BACK_OFF`], or until `deadline` if that comes first.
fn back_off(deadline: &Deadline) {
    let pause = deadline.remaining().map_or(BACK_OFF, |left| left.min(BACK_OFF));
    let pause = duration_to_timespec(pause);
    let _ = unsafe {
        syscall!(Sysno::nanosleep, &pause as *const nc::timespec_t, null::<nc::timespec_t>())
    };
}
