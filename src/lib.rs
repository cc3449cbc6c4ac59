/*!
Low-overhead mutual exclusion for Linux, built directly on Linux syscalls
instead of libc.

The crate provides a non-recursive [`BasicMutex`](sync::BasicMutex) whose
uncontended lock and unlock are a single compare-and-swap, and a
[`RecursiveMutex`](sync::RecursiveMutex) layered on top of it. Contended
threads block in the kernel, either directly on the mutex word through
`futex(2)` or on a pooled, reference-counted waiter record.

# Crate features

* **freelist** -
  Back [`BasicMutex`](sync::BasicMutex) with the pooled waiter-record engine
  instead of the futex engine.
* **wait-condvar** -
  Pooled waiter records block on a lock + condition variable + flag triple.
* **wait-eventfd** -
  Pooled waiter records block on an `eventfd` kernel object.

Without a `wait-*` feature, waiter records use a futex-backed counting
semaphore.
*/

#![cfg(target_os = "linux")]
#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod diagnostic;
pub mod sync;
mod sys;
#[cfg(test)]
mod tests;
