mod freelist;
mod mutex;

use core::fmt;
use std::string::{String, ToString};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

static CAPTURED: Mutex<Vec<String>> = Mutex::new(Vec::new());
static SINK_USERS: Mutex<()> = Mutex::new(());

fn capture(message: fmt::Arguments<'_>) {
    CAPTURED.lock().unwrap_or_else(PoisonError::into_inner).push(message.to_string());
}

/// Routes diagnostics into a buffer for the lifetime of the value. Tests
/// holding one run one at a time.
pub(crate) struct CapturedDiagnostics {
    _serial: MutexGuard<'static, ()>,
}

impl CapturedDiagnostics {
    pub(crate) fn install() -> CapturedDiagnostics {
        let serial = SINK_USERS.lock().unwrap_or_else(PoisonError::into_inner);
        CAPTURED.lock().unwrap_or_else(PoisonError::into_inner).clear();
        crate::diagnostic::set_sink(capture);
        CapturedDiagnostics { _serial: serial }
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        CAPTURED.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Drop for CapturedDiagnostics {
    fn drop(&mut self) {
        crate::diagnostic::reset_sink();
    }
}
