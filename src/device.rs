//! V4L2 capture device implementation using the v4l crate.

use std::fs;
use std::time::Duration;

use log::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::control::{Control, Value};
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as _;
use v4l::video::Capture;
use v4l::Device;

use crate::camera::CameraConfig;
use crate::config::HIGH_SPEED_MEMORY_MIN_KB;
use crate::error::{CameraError, CaptureError, InitError};
use crate::traits::{CaptureDevice, FourCC, FrameBuffer};
use crate::tuning::SensorSetting;

const MEMINFO: &str = "/proc/meminfo";

/// V4L2 control identifiers.
mod cid {
    const USER_BASE: u32 = 0x0098_0900;
    const CAMERA_BASE: u32 = 0x009a_0900;
    const JPEG_BASE: u32 = 0x009d_0900;
    const IMAGE_PROC_BASE: u32 = 0x009f_0900;

    pub const BRIGHTNESS: u32 = USER_BASE;
    pub const CONTRAST: u32 = USER_BASE + 1;
    pub const SATURATION: u32 = USER_BASE + 2;
    pub const AUTO_WHITE_BALANCE: u32 = USER_BASE + 12;
    pub const AUTOGAIN: u32 = USER_BASE + 18;
    pub const GAIN: u32 = USER_BASE + 19;
    pub const HFLIP: u32 = USER_BASE + 20;
    pub const VFLIP: u32 = USER_BASE + 21;
    pub const COLORFX: u32 = USER_BASE + 31;

    pub const EXPOSURE_AUTO: u32 = CAMERA_BASE + 1;
    pub const EXPOSURE_ABSOLUTE: u32 = CAMERA_BASE + 2;
    pub const AUTO_EXPOSURE_BIAS: u32 = CAMERA_BASE + 19;
    pub const AUTO_N_PRESET_WHITE_BALANCE: u32 = CAMERA_BASE + 20;

    pub const JPEG_COMPRESSION_QUALITY: u32 = JPEG_BASE + 3;

    pub const TEST_PATTERN: u32 = IMAGE_PROC_BASE + 3;
}

/// `V4L2_EXPOSURE_MANUAL`
const EXPOSURE_MANUAL: i64 = 1;
/// `V4L2_EXPOSURE_APERTURE_PRIORITY`, the automatic mode UVC sensors offer.
const EXPOSURE_APERTURE_PRIORITY: i64 = 3;

/// Camera behind a `/dev/video<N>` node, streaming MJPG over mmap buffers.
pub struct V4L2Camera {
    index: usize,
    device: Option<Device>,
    stream: Option<Stream<'static>>,
    buffer_count: u32,
    leased: u32,
}

impl V4L2Camera {
    /// Camera at `/dev/video<index>`; nothing is opened until init.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            device: None,
            stream: None,
            buffer_count: 0,
            leased: 0,
        }
    }

    /// Frames currently leased out of the pool.
    #[must_use]
    pub const fn leased(&self) -> u32 {
        self.leased
    }

    fn set_control(&self, name: &'static str, id: u32, value: Value) -> Result<(), CameraError> {
        let device = self.device.as_ref().ok_or(CameraError::NotInitialized)?;
        device
            .set_control(Control { id, value })
            .map_err(|source| CameraError::ControlRejected { name, source })
    }
}

impl CaptureDevice for V4L2Camera {
    fn high_speed_memory_available(&self) -> bool {
        match fs::read_to_string(MEMINFO) {
            Ok(text) => parse_mem_available_kb(&text)
                .is_some_and(|available| available >= HIGH_SPEED_MEMORY_MIN_KB),
            Err(err) => {
                warn!("Cannot read {MEMINFO}: {err}");
                false
            }
        }
    }

    fn initialize(&mut self, config: &CameraConfig) -> Result<(), InitError> {
        let device = Device::new(self.index).map_err(|source| InitError::DeviceOpenFailed {
            index: self.index,
            source,
        })?;

        let caps = device
            .query_caps()
            .map_err(|source| InitError::DeviceOpenFailed {
                index: self.index,
                source,
            })?;
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            return Err(InitError::MissingCapability("video capture"));
        }
        if !caps.capabilities.contains(Flags::STREAMING) {
            return Err(InitError::MissingCapability("streaming"));
        }
        info!("Camera: {} ({})", caps.card, caps.driver);
        debug!(
            "Pin mapping {:?} and XCLK {} Hz are fixed by the device tree",
            config.pins, config.xclk_freq_hz
        );

        let (width, height) = config.frame_size.dimensions();
        let mut fmt = device.format().map_err(InitError::Format)?;
        fmt.width = width;
        fmt.height = height;
        fmt.fourcc = config.pixel_format.into();
        let fmt = device.set_format(&fmt).map_err(InitError::Format)?;

        let actual_fourcc = FourCC::from(fmt.fourcc);
        if actual_fourcc != config.pixel_format || fmt.width != width || fmt.height != height {
            return Err(InitError::FormatRejected {
                requested: format!("{width}x{height} {}", config.pixel_format),
                actual: format!("{}x{} {actual_fourcc}", fmt.width, fmt.height),
            });
        }

        let quality = Control {
            id: cid::JPEG_COMPRESSION_QUALITY,
            value: Value::Integer(quality_percent(config.jpeg_quality)),
        };
        if let Err(err) = device.set_control(quality) {
            debug!("JPEG quality control not available: {err}");
        }

        let stream = Stream::with_buffers(&device, Type::VideoCapture, config.buffer_count)
            .map_err(|source| InitError::BufferAllocation {
                count: config.buffer_count,
                source,
            })?;

        self.device = Some(device);
        self.stream = Some(stream);
        self.buffer_count = config.buffer_count;
        self.leased = 0;
        Ok(())
    }

    fn apply_setting(&mut self, setting: SensorSetting) -> Result<(), CameraError> {
        let name = setting.name();
        match setting {
            SensorSetting::Brightness(v) => {
                self.set_control(name, cid::BRIGHTNESS, Value::Integer(i64::from(v)))
            }
            SensorSetting::Contrast(v) => {
                self.set_control(name, cid::CONTRAST, Value::Integer(i64::from(v)))
            }
            SensorSetting::Saturation(v) => {
                self.set_control(name, cid::SATURATION, Value::Integer(i64::from(v)))
            }
            SensorSetting::SpecialEffect(v) => {
                self.set_control(name, cid::COLORFX, Value::Integer(i64::from(v)))
            }
            SensorSetting::WhiteBalance(on) => {
                self.set_control(name, cid::AUTO_WHITE_BALANCE, Value::Boolean(on))
            }
            SensorSetting::WbMode(v) => self.set_control(
                name,
                cid::AUTO_N_PRESET_WHITE_BALANCE,
                Value::Integer(i64::from(v)),
            ),
            SensorSetting::ExposureCtrl(on) => {
                let mode = if on {
                    EXPOSURE_APERTURE_PRIORITY
                } else {
                    EXPOSURE_MANUAL
                };
                self.set_control(name, cid::EXPOSURE_AUTO, Value::Integer(mode))
            }
            SensorSetting::AeLevel(v) => {
                self.set_control(name, cid::AUTO_EXPOSURE_BIAS, Value::Integer(i64::from(v)))
            }
            SensorSetting::AecValue(v) => {
                self.set_control(name, cid::EXPOSURE_ABSOLUTE, Value::Integer(i64::from(v)))
            }
            SensorSetting::GainCtrl(on) => {
                self.set_control(name, cid::AUTOGAIN, Value::Boolean(on))
            }
            SensorSetting::AgcGain(v) => {
                self.set_control(name, cid::GAIN, Value::Integer(i64::from(v)))
            }
            SensorSetting::HMirror(on) => self.set_control(name, cid::HFLIP, Value::Boolean(on)),
            SensorSetting::VFlip(on) => self.set_control(name, cid::VFLIP, Value::Boolean(on)),
            SensorSetting::ColorBar(on) => {
                self.set_control(name, cid::TEST_PATTERN, Value::Integer(i64::from(on)))
            }
            SensorSetting::AwbGain(_)
            | SensorSetting::Aec2(_)
            | SensorSetting::GainCeiling(_)
            | SensorSetting::Bpc(_)
            | SensorSetting::Wpc(_)
            | SensorSetting::RawGamma(_)
            | SensorSetting::LensCorrection(_)
            | SensorSetting::Dcw(_) => Err(CameraError::UnsupportedSetting(name)),
        }
    }

    fn capture_frame(&mut self) -> Result<FrameBuffer, CaptureError> {
        if self.leased >= self.buffer_count && self.stream.is_some() {
            return Err(CaptureError::NoBuffer(self.leased));
        }
        let stream = self.stream.as_mut().ok_or(CaptureError::NotInitialized)?;

        let (buf, meta) = stream.next()?;
        let sequence = meta.sequence;

        let used = usize::try_from(meta.bytesused).unwrap_or(usize::MAX);
        let data = buf.get(..used).unwrap_or(buf).to_vec();
        if data.is_empty() {
            return Err(CaptureError::EmptyFrame);
        }

        // Safe conversions: V4L2 timestamps are always non-negative in practice
        #[allow(clippy::cast_sign_loss)]
        let secs = meta.timestamp.sec.max(0) as u64;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let nanos = (meta.timestamp.usec.max(0) as u32).saturating_mul(1000);

        self.leased += 1;
        Ok(FrameBuffer::new(data, sequence, Duration::new(secs, nanos)))
    }

    fn release_frame(&mut self, frame: FrameBuffer) {
        self.leased = self.leased.saturating_sub(1);
        drop(frame);
    }
}

/// `MemAvailable` in kB from `/proc/meminfo` text.
fn parse_mem_available_kb(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemAvailable:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

/// Map the sensor's 0-63 scale (lower is better) onto V4L2's 1-100 percent.
fn quality_percent(quality: u8) -> i64 {
    let quality = i64::from(quality.min(63));
    100 - quality * 99 / 63
}
