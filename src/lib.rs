//! Timelapse-Cam: periodic JPEG capture to removable storage
//!
//! This library drives a single camera through a polling capture loop,
//! writing every encoded frame to a mounted card under a sequential name.
//! Hardware sits behind traits so the loop runs unchanged against a V4L2
//! camera or against the mock devices used in tests.

pub mod boot;
pub mod camera;
pub mod capture_loop;
pub mod config;
pub mod device;
pub mod error;
pub mod indicator;
pub mod sequencer;
pub mod storage;
pub mod traits;
pub mod tuning;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use boot::boot;
pub use camera::{ActiveSettings, CameraConfig, CameraPins, FrameLease, FrameSize};
pub use capture_loop::{CaptureLoop, CaptureState, CycleOutcome};
pub use config::{CaptureConfig, CounterMode, Preset, CAPTURE_CONFIG};
pub use device::V4L2Camera;
pub use error::{CameraError, CaptureError, InitError, MountError, ValidationError, WriteError};
pub use indicator::{Pattern, StatusIndicator, StdDelay, SysfsGpio};
pub use sequencer::FilenameSequencer;
pub use storage::{MediaUsage, MountEntry, MountTable, StorageManager};
pub use traits::{CaptureDevice, Clock, FourCC, FrameBuffer, FrameStore, MonotonicClock, Written};
pub use tuning::{SensorSetting, SensorTuning, TuningFailure};
