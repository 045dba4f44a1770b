//! Raw RGB565 file replay.
//!
//! The file is a plain concatenation of frames, each exactly
//! `width * height * 2` bytes, high byte first. Playback loops at EOF.

use crate::error::{CaptureError, CaptureResult};
use crate::pool::FramePool;
use crate::source::FrameSource;
use pawcam_core::{memory_budget, Frame, FrameGeometry, PixelEncoding};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Frame source that streams frames from a raw capture dump.
pub struct RawFileCamera {
    path: PathBuf,
    file: File,
    pool: FramePool,
    frame_count: u64,
    position: u64,
}

impl RawFileCamera {
    /// Open a dump of `width x height` RGB565 frames.
    pub fn open<P: AsRef<Path>>(path: P, width: u32, height: u32) -> CaptureResult<Self> {
        let path = path.as_ref();
        let geometry = FrameGeometry::new(width, height, PixelEncoding::Rgb565);
        let frame_len = geometry.byte_len() as u64;

        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        if frame_len == 0 || file_len == 0 || file_len % frame_len != 0 {
            return Err(CaptureError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} is {} bytes, not a whole number of {} frames",
                    path.display(),
                    file_len,
                    geometry
                ),
            )));
        }

        let frame_count = file_len / frame_len;
        info!(path = %path.display(), %geometry, frame_count, "Opened raw frame dump");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            pool: FramePool::new(geometry, memory_budget::FRAME_BUFFER_COUNT),
            frame_count,
            position: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames in the dump.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Index of the frame the next capture will read.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        if self.position >= self.frame_count {
            self.file.seek(SeekFrom::Start(0))?;
            self.position = 0;
            debug!(path = %self.path.display(), "Rewinding raw frame dump");
        }
        self.file.read_exact(buf)?;
        self.position += 1;
        Ok(())
    }
}

impl FrameSource for RawFileCamera {
    fn geometry(&self) -> FrameGeometry {
        self.pool.geometry()
    }

    fn capture(&mut self) -> CaptureResult<Frame> {
        let mut frame = self.pool.acquire()?;
        if let Err(e) = self.read_into(frame.data_mut()) {
            self.pool.give_back(frame);
            return Err(e.into());
        }
        Ok(frame)
    }

    fn release(&mut self, frame: Frame) {
        self.pool.give_back(frame);
    }
}
