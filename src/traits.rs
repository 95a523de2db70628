//! Core traits and types for the capture pipeline.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::camera::CameraConfig;
use crate::error::{CameraError, CaptureError, InitError, WriteError};
use crate::sequencer::FilenameSequencer;
use crate::tuning::SensorSetting;

/// Pixel format representation (e.g., MJPG, YUYV).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// MJPEG pixel format (every frame a standalone JPEG).
    pub const MJPG: Self = Self::new(b"MJPG");
    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{}", char::from(byte))?;
        }
        Ok(())
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// One encoded frame leased from a capture device's buffer pool.
///
/// Not `Clone`: every buffer handed out by
/// [`CaptureDevice::capture_frame`] goes back through
/// [`CaptureDevice::release_frame`] exactly once.
#[derive(Debug)]
pub struct FrameBuffer {
    data: Vec<u8>,
    sequence: u32,
    timestamp: Duration,
}

impl FrameBuffer {
    /// Wrap encoded bytes produced by a driver.
    #[must_use]
    pub const fn new(data: Vec<u8>, sequence: u32, timestamp: Duration) -> Self {
        Self {
            data,
            sequence,
            timestamp,
        }
    }

    /// Encoded image bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of encoded bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Driver frame sequence number.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Driver capture timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> Duration {
        self.timestamp
    }
}

/// Abstraction over the image sensor and its encoder pipeline.
pub trait CaptureDevice {
    /// Whether memory for full-size frame buffers is available.
    fn high_speed_memory_available(&self) -> bool;

    /// Bring up the sensor with an already resolved configuration.
    fn initialize(&mut self, config: &CameraConfig) -> Result<(), InitError>;

    /// Push a single tuning parameter to the sensor.
    fn apply_setting(&mut self, setting: SensorSetting) -> Result<(), CameraError>;

    /// Block until one encoded frame is available.
    fn capture_frame(&mut self) -> Result<FrameBuffer, CaptureError>;

    /// Hand a frame back to the buffer pool.
    fn release_frame(&mut self, frame: FrameBuffer);
}

/// Outcome of a successful [`FrameStore::write_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    /// Volume-relative path that was written.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes: usize,
}

/// Abstraction over the removable volume that receives frames.
pub trait FrameStore {
    /// Create or overwrite `path` with the full byte range.
    fn write_file(&mut self, path: &Path, bytes: &[u8]) -> Result<Written, WriteError>;

    /// Highest sequence number already present under the sequencer's directory.
    fn last_sequence(&self, sequencer: &FilenameSequencer) -> Option<u32>;
}

/// Millisecond time source for the capture loop.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Clock backed by [`Instant`], counting from its creation.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Start counting from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
