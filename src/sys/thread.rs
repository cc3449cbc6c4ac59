//! Identity of the calling thread.
//!
//! Where the runtime has set up thread-local storage, the thread pointer is
//! read straight from its register: it is distinct for every live thread and
//! costs no syscall. Otherwise the kernel thread id is used.

use syscalls::{syscall, Sysno};

/// Identity of the calling thread. Never zero, so zero is free to mean
/// "no thread".
#[inline]
pub(crate) fn current_id() -> usize {
    match thread_pointer() {
        0 => kernel_id(),
        tp => tp,
    }
}

fn kernel_id() -> usize {
    unsafe { syscall!(Sysno::gettid) }.expect("gettid failed")
}

#[cfg(target_arch = "x86_64")]
fn thread_pointer() -> usize {
    use core::sync::atomic::AtomicU8;
    use core::sync::atomic::Ordering::Relaxed;

    const UNKNOWN: u8 = 0;
    const SET_UP: u8 = 1;
    const ABSENT: u8 = 2;
    const ARCH_GET_FS: usize = 0x1003;

    // The fs base can only be read through memory, which faults when it is
    // zero. A runtime that gives one thread a TLS block gives one to all of
    // them, so asking the kernel once settles it for the process.
    static TLS: AtomicU8 = AtomicU8::new(UNKNOWN);

    match TLS.load(Relaxed) {
        SET_UP => {}
        ABSENT => return 0,
        _ => {
            let mut base: usize = 0;
            let r = unsafe { syscall!(Sysno::arch_prctl, ARCH_GET_FS, &mut base as *mut usize) };
            if r.is_err() || base == 0 {
                TLS.store(ABSENT, Relaxed);
                return 0;
            }
            TLS.store(SET_UP, Relaxed);
        }
    }

    let tp: usize;
    // SAFETY: the x86_64 TLS ABI puts a pointer to the TCB itself at fs:0.
    unsafe {
        core::arch::asm!(
            "mov {}, qword ptr fs:[0]",
            out(reg) tp,
            options(nostack, readonly, preserves_flags)
        );
    }
    tp
}

#[cfg(target_arch = "aarch64")]
fn thread_pointer() -> usize {
    let tp: usize;
    unsafe {
        core::arch::asm!(
            "mrs {}, tpidr_el0",
            out(reg) tp,
            options(nomem, nostack, preserves_flags)
        );
    }
    tp
}

#[cfg(target_arch = "riscv64")]
fn thread_pointer() -> usize {
    let tp: usize;
    unsafe {
        core::arch::asm!("mv {}, tp", out(reg) tp, options(nomem, nostack, preserves_flags));
    }
    tp
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")))]
fn thread_pointer() -> usize {
    0
}
