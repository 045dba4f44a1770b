//! Fixed-size frame buffer pool.
//!
//! All buffers are allocated in [`FramePool::new`]. Acquiring and giving
//! back never touches the allocator, so steady-state capture is
//! allocation-free.

use crate::error::{CaptureError, CaptureResult};
use pawcam_core::{Frame, FrameGeometry, FrameId};
use tracing::{debug, warn};

/// A pool of equally sized frame buffers.
pub struct FramePool {
    geometry: FrameGeometry,
    free: Vec<Box<[u8]>>,
    capacity: usize,
    next_id: u64,
}

impl FramePool {
    /// Create a pool holding `capacity` buffers for `geometry`.
    pub fn new(geometry: FrameGeometry, capacity: usize) -> Self {
        let mut free = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            free.push(vec![0u8; geometry.byte_len()].into_boxed_slice());
        }
        debug!(
            %geometry,
            capacity,
            bytes = capacity * geometry.byte_len(),
            "Frame pool allocated"
        );
        Self {
            geometry,
            free,
            capacity,
            next_id: 0,
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffers ready to be handed out.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Buffers currently held by callers.
    pub fn outstanding(&self) -> usize {
        self.capacity - self.free.len()
    }

    /// Take a free buffer as a frame. The contents are whatever the last
    /// user left in it.
    pub fn acquire(&mut self) -> CaptureResult<Frame> {
        let Some(buffer) = self.free.pop() else {
            return Err(CaptureError::NoBuffer {
                outstanding: self.outstanding(),
                capacity: self.capacity,
            });
        };
        let id = FrameId(self.next_id);
        self.next_id += 1;
        Ok(Frame::new(id, self.geometry, buffer)?)
    }

    /// Put a frame's buffer back.
    ///
    /// Buffers of the wrong size, or surplus buffers when the pool is
    /// already full, are dropped with a warning.
    pub fn give_back(&mut self, frame: Frame) {
        if frame.len() != self.geometry.byte_len() {
            warn!(
                frame = frame.id().0,
                len = frame.len(),
                expected = self.geometry.byte_len(),
                "Released frame does not belong to this pool, dropping"
            );
            return;
        }
        if self.free.len() >= self.capacity {
            warn!(frame = frame.id().0, "Frame released twice or pool overfilled, dropping");
            return;
        }
        self.free.push(frame.into_buffer());
    }
}
