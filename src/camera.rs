//! Capture device bring-up and frame leasing.
//!
//! [`initialize`] picks the buffer setup from a single memory probe, brings
//! the sensor up and then pushes the tuning batch. [`FrameLease`] ties a
//! captured frame to its device so the buffer goes back to the pool on every
//! exit path.

use std::fmt;

use log::{info, warn};

use crate::config::{FALLBACK_BUFFER_COUNT, FALLBACK_FRAME_SIZE, FALLBACK_IMAGE_QUALITY};
use crate::error::{CaptureError, InitError};
use crate::traits::{CaptureDevice, FourCC, FrameBuffer};
use crate::tuning::{apply_tuning, SensorTuning, TuningFailure};

/// Enumerated resolution presets of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSize {
    /// 160x120
    Qqvga,
    /// 176x144
    Qcif,
    /// 240x176
    Hqvga,
    /// 320x240
    Qvga,
    /// 400x296
    Cif,
    /// 640x480
    Vga,
    /// 800x600
    Svga,
    /// 1024x768
    Xga,
    /// 1280x1024
    Sxga,
    /// 1600x1200
    Uxga,
    /// 2048x1536, needs high-speed memory
    Qxga,
}

impl FrameSize {
    /// Width and height in pixels.
    #[must_use]
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Qqvga => (160, 120),
            Self::Qcif => (176, 144),
            Self::Hqvga => (240, 176),
            Self::Qvga => (320, 240),
            Self::Cif => (400, 296),
            Self::Vga => (640, 480),
            Self::Svga => (800, 600),
            Self::Xga => (1024, 768),
            Self::Sxga => (1280, 1024),
            Self::Uxga => (1600, 1200),
            Self::Qxga => (2048, 1536),
        }
    }

    /// Preset name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Qqvga => "QQVGA",
            Self::Qcif => "QCIF",
            Self::Hqvga => "HQVGA",
            Self::Qvga => "QVGA",
            Self::Cif => "CIF",
            Self::Vga => "VGA",
            Self::Svga => "SVGA",
            Self::Xga => "XGA",
            Self::Sxga => "SXGA",
            Self::Uxga => "UXGA",
            Self::Qxga => "QXGA",
        }
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.dimensions();
        write!(f, "{} ({width}x{height})", self.name())
    }
}

/// Pin assignments of the 8-bit parallel camera interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraPins {
    /// D0..D7
    pub data: [u8; 8],
    /// Master clock output.
    pub xclk: u8,
    /// Pixel clock.
    pub pclk: u8,
    /// Vertical sync.
    pub vsync: u8,
    /// Horizontal reference.
    pub href: u8,
    /// SCCB data.
    pub sda: u8,
    /// SCCB clock.
    pub scl: u8,
    /// Power down line, if wired.
    pub pwdn: Option<u8>,
    /// Reset line, if wired.
    pub reset: Option<u8>,
}

/// Camera setup handed to [`CaptureDevice::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    /// Pin mapping.
    pub pins: CameraPins,
    /// Sensor master clock.
    pub xclk_freq_hz: u32,
    /// Encoded output format.
    pub pixel_format: FourCC,
    /// Resolution.
    pub frame_size: FrameSize,
    /// JPEG quality, 0-63, lower is better.
    pub jpeg_quality: u8,
    /// Number of frame buffers in the pool.
    pub buffer_count: u32,
}

impl CameraConfig {
    /// The reduced setup used without high-speed memory.
    #[must_use]
    pub fn low_memory(&self) -> Self {
        Self {
            frame_size: FALLBACK_FRAME_SIZE,
            jpeg_quality: FALLBACK_IMAGE_QUALITY,
            buffer_count: FALLBACK_BUFFER_COUNT,
            ..self.clone()
        }
    }
}

/// What the camera actually runs with after [`initialize`].
#[derive(Debug)]
pub struct ActiveSettings {
    /// Configuration passed to the device.
    pub config: CameraConfig,
    /// Whether the memory probe succeeded.
    pub high_speed_memory: bool,
    /// Tuning parameters the sensor refused.
    pub tuning_failures: Vec<TuningFailure>,
}

/// Bring up the capture device.
///
/// High-speed memory is probed once; without it the low-memory frame size,
/// quality and buffer count are forced. Tuning is best-effort and never fails
/// the init.
pub fn initialize<C>(
    device: &mut C,
    requested: &CameraConfig,
    tuning: &SensorTuning,
) -> Result<ActiveSettings, InitError>
where
    C: CaptureDevice + ?Sized,
{
    let high_speed_memory = device.high_speed_memory_available();
    let config = if high_speed_memory {
        info!("High-speed memory found - using high quality settings");
        requested.clone()
    } else {
        let fallback = requested.low_memory();
        warn!(
            "High-speed memory not found - using lower quality settings ({}, quality {}, {} buffer)",
            fallback.frame_size, fallback.jpeg_quality, fallback.buffer_count
        );
        fallback
    };

    device.initialize(&config)?;

    let tuning_failures = apply_tuning(device, tuning);

    Ok(ActiveSettings {
        config,
        high_speed_memory,
        tuning_failures,
    })
}

/// A captured frame bound to the device it came from.
///
/// Dropping the lease releases the frame back to the device.
pub struct FrameLease<'a, C: CaptureDevice + ?Sized> {
    device: &'a mut C,
    frame: Option<FrameBuffer>,
}

impl<'a, C: CaptureDevice + ?Sized> FrameLease<'a, C> {
    /// Capture one frame from `device`.
    pub fn acquire(device: &'a mut C) -> Result<Self, CaptureError> {
        let frame = device.capture_frame()?;
        Ok(Self {
            device,
            frame: Some(frame),
        })
    }

    /// Encoded bytes of the leased frame.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.frame.as_ref().map_or(&[], FrameBuffer::data)
    }

    /// Number of encoded bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    /// Whether the frame carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

impl<C: CaptureDevice + ?Sized> Drop for FrameLease<'_, C> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.device.release_frame(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CAPTURE_CONFIG;
    use crate::mock::MockCamera;
    use crate::tuning::SensorSetting;

    #[test]
    fn test_initialize_keeps_requested_settings_with_memory() {
        let mut camera = MockCamera::new();
        let settings = initialize(&mut camera, &CAPTURE_CONFIG.camera, &CAPTURE_CONFIG.tuning)
            .expect("initialize should succeed");

        assert!(settings.high_speed_memory);
        assert_eq!(settings.config, CAPTURE_CONFIG.camera);
        assert_eq!(camera.initialized_with(), Some(&CAPTURE_CONFIG.camera));
    }

    #[test]
    fn test_initialize_falls_back_without_memory() {
        let mut camera = MockCamera::new().without_high_speed_memory();
        let settings = initialize(&mut camera, &CAPTURE_CONFIG.camera, &CAPTURE_CONFIG.tuning)
            .expect("initialize should succeed");

        assert!(!settings.high_speed_memory);
        assert_eq!(settings.config.frame_size, FrameSize::Svga);
        assert_eq!(settings.config.jpeg_quality, 12);
        assert_eq!(settings.config.buffer_count, 1);
        assert_eq!(settings.config.pins, CAPTURE_CONFIG.camera.pins);
        assert_eq!(camera.memory_probes(), 1);
    }

    #[test]
    fn test_initialize_failure_skips_tuning() {
        let mut camera = MockCamera::new().failing_init();
        let result = initialize(&mut camera, &CAPTURE_CONFIG.camera, &CAPTURE_CONFIG.tuning);

        assert!(matches!(result, Err(InitError::MissingCapability(_))));
        assert_eq!(camera.init_calls(), 1);
        assert!(camera.applied_settings().is_empty());
    }

    #[test]
    fn test_tuning_failures_do_not_fail_init() {
        let mut camera = MockCamera::new().rejecting_setting("lens correction");
        let settings = initialize(&mut camera, &CAPTURE_CONFIG.camera, &CAPTURE_CONFIG.tuning)
            .expect("initialize should succeed despite tuning failure");

        assert_eq!(settings.tuning_failures.len(), 1);
        assert!(matches!(
            settings.tuning_failures[0].setting,
            SensorSetting::LensCorrection(_)
        ));
        assert_eq!(camera.applied_settings().len(), 21);
    }

    #[test]
    fn test_lease_releases_on_drop() {
        let mut camera = MockCamera::new();
        {
            let lease = FrameLease::acquire(&mut camera).expect("capture should succeed");
            assert!(!lease.is_empty());
        }
        assert_eq!(camera.captures(), 1);
        assert_eq!(camera.releases(), 1);
        assert_eq!(camera.leased(), 0);
    }

    #[test]
    fn test_failed_acquire_releases_nothing() {
        let mut camera = MockCamera::new().failing_captures(1);
        assert!(FrameLease::acquire(&mut camera).is_err());
        assert_eq!(camera.releases(), 0);
    }

    #[test]
    fn test_frame_size_display() {
        assert_eq!(FrameSize::Uxga.to_string(), "UXGA (1600x1200)");
        assert_eq!(FrameSize::Qqvga.dimensions(), (160, 120));
    }
}
