use crate::sys::timespec::Timespec;
use core::time::Duration;

/// A point in time bounding a blocking wait, or no bound at all.
///
/// Deadlines are measured against `CLOCK_MONOTONIC`, so they are unaffected
/// by changes to the wall clock.
///
/// # Examples
///
/// ```
/// use slimlock::sync::Deadline;
/// use std::time::Duration;
///
/// let deadline = Deadline::after(Duration::from_secs(60));
/// assert!(!deadline.has_expired());
/// assert!(deadline.remaining().unwrap() <= Duration::from_secs(60));
///
/// assert_eq!(Deadline::forever().remaining(), None);
/// assert!(Deadline::expired().has_expired());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Deadline {
    expiry: Option<Timespec>,
}

impl Deadline {
    /// A deadline that never expires.
    #[must_use]
    pub const fn forever() -> Deadline {
        Deadline { expiry: None }
    }

    /// A deadline that has already passed. Waiting on it never blocks.
    #[must_use]
    pub fn expired() -> Deadline {
        Deadline { expiry: Some(now()) }
    }

    /// A deadline `timeout` from now.
    ///
    /// A timeout too large to represent yields [`Deadline::forever`].
    #[must_use]
    pub fn after(timeout: Duration) -> Deadline {
        Deadline { expiry: now().checked_add_duration(&timeout) }
    }

    /// Pushes the deadline back by `extra`. Returns `None` on overflow.
    #[must_use]
    pub fn checked_add(&self, extra: Duration) -> Option<Deadline> {
        match self.expiry {
            None => Some(*self),
            Some(t) => t.checked_add_duration(&extra).map(|t| Deadline { expiry: Some(t) }),
        }
    }

    #[must_use]
    pub fn is_forever(&self) -> bool {
        self.expiry.is_none()
    }

    #[must_use]
    pub fn has_expired(&self) -> bool {
        match self.expiry {
            None => false,
            Some(t) => now() >= t,
        }
    }

    /// Time left until the deadline, `Some(Duration::ZERO)` once it has
    /// passed, or `None` for a deadline that never expires.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.expiry.map(|t| t.saturating_duration_since(&now()))
    }

    /// The absolute expiry on `CLOCK_MONOTONIC`, for syscalls taking one.
    pub(crate) fn to_timespec(&self) -> Option<nc::timespec_t> {
        self.expiry.and_then(|t| t.to_timespec())
    }
}

impl Default for Deadline {
    fn default() -> Deadline {
        Deadline::forever()
    }
}

fn now() -> Timespec {
    Timespec::now(nc::CLOCK_MONOTONIC)
}
