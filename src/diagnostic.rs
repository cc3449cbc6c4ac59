//! Warning sink for conditions the mutexes report but cannot return.
//!
//! The primitives in this crate have no error channel for a few rare events:
//! a mutex destroyed while still held, or a syscall failing while a wait
//! primitive is created or signaled. Those go through [`warn`], which calls
//! the installed sink. The default sink emits a `tracing` warning.
//!
//! ```
//! use core::fmt;
//!
//! fn quiet(_: fmt::Arguments<'_>) {}
//!
//! slimlock::diagnostic::set_sink(quiet);
//! slimlock::diagnostic::warn(format_args!("not shown"));
//! slimlock::diagnostic::reset_sink();
//! ```

use core::fmt;
use core::ptr;
use core::sync::atomic::AtomicPtr;
use core::sync::atomic::Ordering::{Acquire, Release};

/// A function receiving diagnostic messages.
pub type Sink = fn(fmt::Arguments<'_>);

// Null means the default sink.
static SINK: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

fn default_sink(message: fmt::Arguments<'_>) {
    tracing::warn!(target: "slimlock", "{}", message);
}

/// Replaces the process-wide sink.
pub fn set_sink(sink: Sink) {
    SINK.store(sink as *mut (), Release);
}

/// Restores the default `tracing` sink.
pub fn reset_sink() {
    SINK.store(ptr::null_mut(), Release);
}

/// Reports `message` through the current sink.
pub fn warn(message: fmt::Arguments<'_>) {
    let raw = SINK.load(Acquire);
    let sink: Sink = if raw.is_null() {
        default_sink
    } else {
        // SAFETY: only `set_sink` stores non-null values, and it stores a `Sink`.
        unsafe { core::mem::transmute::<*mut (), Sink>(raw) }
    };
    sink(message);
}
