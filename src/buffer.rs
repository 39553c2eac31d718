//! Shared scratch buffer with a single-borrower contract.
//!
//! The command parser and a long-running G-code command share one scratch
//! area: the parser decodes an inbound command's payload into it, and if the
//! command turns into a background G-code job, that job keeps pointing into
//! the same bytes for many planner ticks. The buffer therefore hands out at
//! most one [`BufferBorrow`] at a time; while a borrow is live, `borrow()`
//! returns `None` and the parser has to report the next command as colliding
//! with the one in progress.
//!
//! The flag is an atomic so a borrow may be dropped on a different task than
//! the one that took it.

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// Scratch capacity. Large enough for the longest G-code payload the server
/// is allowed to submit in one command.
pub const SCRATCH_SIZE: usize = 512;

/// A fixed scratch area with an atomic "taken" flag.
pub struct SharedBuffer {
    taken: AtomicBool,
    data: UnsafeCell<[u8; SCRATCH_SIZE]>,
}

// SAFETY: the cell is only ever reached through a `BufferBorrow`, and
// `borrow()` hands out at most one of those at a time (the `taken` swap).
unsafe impl Sync for SharedBuffer {}

impl SharedBuffer {
    pub const fn new() -> Self {
        Self {
            taken: AtomicBool::new(false),
            data: UnsafeCell::new([0; SCRATCH_SIZE]),
        }
    }

    /// Take the buffer, if nobody else holds it.
    pub fn borrow(&self) -> Option<BufferBorrow<'_>> {
        if self.taken.swap(true, Ordering::Acquire) {
            return None;
        }
        Some(BufferBorrow { owner: self })
    }
}

impl Default for SharedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to the scratch bytes. Releases the buffer on drop.
pub struct BufferBorrow<'a> {
    owner: &'a SharedBuffer,
}

impl Deref for BufferBorrow<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: this borrow is the only live one (see `SharedBuffer`).
        unsafe { &(&*self.owner.data.get())[..] }
    }
}

impl DerefMut for BufferBorrow<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, plus `&mut self` rules out aliasing through
        // this same borrow.
        unsafe { &mut (&mut *self.owner.data.get())[..] }
    }
}

impl Drop for BufferBorrow<'_> {
    fn drop(&mut self) {
        self.owner.taken.store(false, Ordering::Release);
    }
}

impl fmt::Debug for BufferBorrow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferBorrow")
            .field("len", &SCRATCH_SIZE)
            .finish()
    }
}
