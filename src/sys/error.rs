use syscalls::Errno;

/// A syscall failure inside a wait primitive.
///
/// These never reach callers of the mutexes; they are reported through
/// [`crate::diagnostic`] and the primitive degrades instead.
#[derive(Debug, thiserror::Error)]
pub(crate) enum SysError {
    #[error("eventfd2 failed: {0:?}")]
    EventCreate(Errno),
    #[error("eventfd read failed: {0:?}")]
    EventRead(Errno),
    #[error("eventfd write failed: {0:?}")]
    EventWrite(Errno),
    #[error("ppoll on eventfd failed: {0:?}")]
    Poll(Errno),
}

impl SysError {
    pub(crate) fn report(&self) {
        crate::diagnostic::warn(format_args!("{self}"));
    }
}
