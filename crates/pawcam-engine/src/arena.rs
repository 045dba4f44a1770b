//! Tensor arena.
//!
//! One contiguous byte region allocated at startup. The engine claims
//! sub-regions from it during initialization and never gives them back;
//! the arena itself is never resized.

use crate::error::{InitError, InitResult};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Alignment of every claimed region, in bytes.
pub const ARENA_ALIGNMENT: usize = 16;

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// `n` rounded up to [`ARENA_ALIGNMENT`], or `None` on overflow.
#[inline]
pub(crate) const fn align_up(n: usize) -> Option<usize> {
    match n.checked_add(ARENA_ALIGNMENT - 1) {
        Some(end) => Some(end & !(ARENA_ALIGNMENT - 1)),
        None => None,
    }
}

/// A claimed sub-region, addressed by offset into the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaRegion {
    pub offset: usize,
    pub len: usize,
}

impl ArenaRegion {
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Fixed-capacity, claim-only memory region.
pub struct Arena {
    id: u64,
    buf: Box<[u8]>,
    used: usize,
}

impl Arena {
    /// Allocate an arena of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        let id = NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed);
        debug!(arena = id, capacity, "Tensor arena allocated");
        Self {
            id,
            buf: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes claimed so far, including alignment padding.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> usize {
        self.capacity() - self.used
    }

    /// Claim `len` bytes. The claim is permanent.
    pub fn claim(&mut self, len: usize) -> InitResult<ArenaRegion> {
        let padded = align_up(len).unwrap_or(usize::MAX);
        if padded > self.remaining() {
            return Err(InitError::ArenaExhausted {
                required: padded,
                available: self.remaining(),
            });
        }
        let region = ArenaRegion {
            offset: self.used,
            len,
        };
        self.used += padded;
        Ok(region)
    }

    pub fn region(&self, region: ArenaRegion) -> &[u8] {
        &self.buf[region.offset..region.end()]
    }

    pub fn region_mut(&mut self, region: ArenaRegion) -> &mut [u8] {
        &mut self.buf[region.offset..region.end()]
    }

    /// Borrow one output region and one scratch region mutably and the
    /// rest of the arena immutably.
    ///
    /// `scratch` must start at or after the end of `output`.
    pub(crate) fn partition(&mut self, output: ArenaRegion, scratch: ArenaRegion) -> Partition<'_> {
        debug_assert!(output.end() <= scratch.offset);
        let (head, rest) = self.buf.split_at_mut(output.offset);
        let (out, rest) = rest.split_at_mut(output.len);
        let (middle, rest) = rest.split_at_mut(scratch.offset - output.end());
        let (scratch_buf, _) = rest.split_at_mut(scratch.len);
        Partition {
            head,
            output: out,
            middle,
            middle_base: output.end(),
            scratch: scratch_buf,
        }
    }
}

/// Disjoint borrows of the arena for one kernel call.
pub(crate) struct Partition<'a> {
    head: &'a [u8],
    pub output: &'a mut [u8],
    middle: &'a [u8],
    middle_base: usize,
    pub scratch: &'a mut [u8],
}

impl<'a> Partition<'a> {
    /// Read-only view of a region outside the output and scratch.
    pub fn input(&self, region: ArenaRegion) -> Option<&'a [u8]> {
        let head: &'a [u8] = self.head;
        let middle: &'a [u8] = self.middle;
        if region.end() <= head.len() {
            Some(&head[region.offset..region.end()])
        } else if region.offset >= self.middle_base {
            let start = region.offset - self.middle_base;
            middle.get(start..start + region.len)
        } else {
            None
        }
    }
}
