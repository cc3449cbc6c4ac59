//! Lock-free pool of reusable slots, addressed by a dense integer index.
//!
//! Storage is a handful of blocks of growing size, allocated on first use and
//! never freed. Free slots form a singly linked list threaded through the
//! slots' `next` fields; the list head packs the first free index with a
//! serial number that changes on every release, so a head that was popped
//! and pushed back in between is not mistaken for the one read earlier.
//!
//! The pool cannot take a lock of its own: it is what the freelist mutex
//! engine allocates from.

use alloc::boxed::Box;
use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use core::sync::atomic::{AtomicPtr, AtomicU32};

const INDEX_MASK: u32 = 0x00ff_ffff;
const SERIAL_COUNTER: u32 = INDEX_MASK + 1;
const SERIAL_MASK: u32 = !INDEX_MASK & !0x8000_0000;

/// Largest index a slot can have.
pub(crate) const MAX_INDEX: usize = 0xffff;

const BLOCK_COUNT: usize = 4;
const BLOCK_SIZES: [usize; BLOCK_COUNT] = [16, 128, 1024, MAX_INDEX + 1 - (16 + 128 + 1024)];

struct Slot<T> {
    value: T,
    next: AtomicU32,
}

pub(crate) struct Freelist<T> {
    blocks: [AtomicPtr<Slot<T>>; BLOCK_COUNT],
    next: AtomicU32,
    _marker: PhantomData<T>,
}

/// Splits a global index into its block and the offset inside that block.
fn block_for(index: usize) -> (usize, usize) {
    let mut at = index;
    for (block, &size) in BLOCK_SIZES.iter().enumerate() {
        if at < size {
            return (block, at);
        }
        at -= size;
    }
    panic!("waiter record pool exhausted ({} slots in use)", MAX_INDEX + 1);
}

impl<T: Default> Freelist<T> {
    pub const fn new() -> Freelist<T> {
        Freelist {
            blocks: [const { AtomicPtr::new(ptr::null_mut()) }; BLOCK_COUNT],
            next: AtomicU32::new(0),
            _marker: PhantomData,
        }
    }

    /// Takes a free slot and returns its index.
    pub fn next(&self) -> usize {
        loop {
            let head = self.next.load(Acquire);
            let index = (head & INDEX_MASK) as usize;
            let slot = self.slot(index);
            let new_head = slot.next.load(Relaxed) | (head & !INDEX_MASK);
            if self.next.compare_exchange_weak(head, new_head, Release, Relaxed).is_ok() {
                return index;
            }
        }
    }

    /// Returns the slot at `index` to the pool.
    pub fn release(&self, index: usize) {
        let slot = self.slot(index);
        loop {
            let head = self.next.load(Acquire);
            slot.next.store(head & INDEX_MASK, Relaxed);
            let new_head = (head.wrapping_add(SERIAL_COUNTER) & SERIAL_MASK) | index as u32;
            if self.next.compare_exchange_weak(head, new_head, Release, Relaxed).is_ok() {
                return;
            }
        }
    }

    /// The value stored at `index`.
    pub fn get(&self, index: usize) -> &T {
        &self.slot(index).value
    }

    fn slot(&self, index: usize) -> &Slot<T> {
        let (block, at) = block_for(index);
        let base = self.block(block, index - at);
        // SAFETY: `at` is within the block, and blocks live as long as `self`.
        unsafe { &*base.add(at) }
    }

    /// The block's first slot, allocating the block if nobody has yet.
    /// `offset` is the global index of that first slot.
    fn block(&self, block: usize, offset: usize) -> *mut Slot<T> {
        let existing = self.blocks[block].load(Acquire);
        if !existing.is_null() {
            return existing;
        }

        let size = BLOCK_SIZES[block];
        let fresh: Box<[Slot<T>]> = (0..size)
            .map(|i| Slot { value: T::default(), next: AtomicU32::new((offset + i + 1) as u32) })
            .collect();
        let fresh = Box::into_raw(fresh) as *mut Slot<T>;

        match self.blocks[block].compare_exchange(ptr::null_mut(), fresh, Release, Acquire) {
            Ok(_) => {
                tracing::debug!(target: "slimlock", block, size, "waiter record pool grew");
                fresh
            }
            Err(winner) => {
                // SAFETY: `fresh` came from `Box::into_raw` above with this length
                // and was never published.
                drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(fresh, size)) });
                winner
            }
        }
    }
}

impl<T> Drop for Freelist<T> {
    fn drop(&mut self) {
        for (block, &size) in self.blocks.iter_mut().zip(BLOCK_SIZES.iter()) {
            let base = *block.get_mut();
            if !base.is_null() {
                // SAFETY: every non-null block was leaked from a boxed slice of `size`.
                drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(base, size)) });
            }
        }
    }
}
