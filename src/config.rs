//! Build-time configuration.
//!
//! Every value here is fixed when the binary is built. A capture preset can be
//! selected with one of the `preset-*` cargo features; it overrides interval,
//! frame size and quality as a bundle.

use crate::camera::{CameraConfig, CameraPins, FrameSize};
use crate::traits::FourCC;
use crate::tuning::SensorTuning;

// ---------------------------------------------------------------------------
// Timelapse
// ---------------------------------------------------------------------------

/// Capture interval in milliseconds when no preset is enabled.
pub const BASE_CAPTURE_INTERVAL_MS: u64 = 10_000;

/// JPEG quality when no preset is enabled (0-63, lower is better).
pub const BASE_IMAGE_QUALITY: u8 = 10;

/// Frame size when no preset (or a preset without a frame size) is enabled.
pub const BASE_FRAME_SIZE: FrameSize = FrameSize::Uxga;

/// Named bundles of interval, frame size and quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// 5 seconds, SVGA, quality 12.
    FastTest,
    /// 5 minutes, quality 10.
    PlantGrowth,
    /// 30 minutes, quality 10.
    Construction,
    /// 10 seconds, quality 10.
    CloudMotion,
    /// 15 seconds, quality 8.
    Sunset,
}

impl Preset {
    /// Capture interval for this preset.
    #[must_use]
    pub const fn interval_ms(self) -> u64 {
        match self {
            Self::FastTest => 5_000,
            Self::PlantGrowth => 300_000,
            Self::Construction => 1_800_000,
            Self::CloudMotion => 10_000,
            Self::Sunset => 15_000,
        }
    }

    /// JPEG quality for this preset.
    #[must_use]
    pub const fn quality(self) -> u8 {
        match self {
            Self::FastTest => 12,
            Self::Sunset => 8,
            Self::PlantGrowth | Self::Construction | Self::CloudMotion => 10,
        }
    }

    /// Frame size override, if the preset carries one.
    #[must_use]
    pub const fn frame_size(self) -> Option<FrameSize> {
        match self {
            Self::FastTest => Some(FrameSize::Svga),
            _ => None,
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FastTest => "fast test",
            Self::PlantGrowth => "plant growth",
            Self::Construction => "construction",
            Self::CloudMotion => "cloud motion",
            Self::Sunset => "sunset",
        }
    }
}

#[allow(clippy::cast_lossless)]
const fn enabled_presets() -> u32 {
    cfg!(feature = "preset-fast-test") as u32
        + cfg!(feature = "preset-plant-growth") as u32
        + cfg!(feature = "preset-construction") as u32
        + cfg!(feature = "preset-cloud-motion") as u32
        + cfg!(feature = "preset-sunset") as u32
}

const _: () = assert!(
    enabled_presets() <= 1,
    "enable at most one preset-* feature"
);

const fn active_preset() -> Option<Preset> {
    if cfg!(feature = "preset-fast-test") {
        Some(Preset::FastTest)
    } else if cfg!(feature = "preset-plant-growth") {
        Some(Preset::PlantGrowth)
    } else if cfg!(feature = "preset-construction") {
        Some(Preset::Construction)
    } else if cfg!(feature = "preset-cloud-motion") {
        Some(Preset::CloudMotion)
    } else if cfg!(feature = "preset-sunset") {
        Some(Preset::Sunset)
    } else {
        None
    }
}

/// The preset selected by cargo features, if any.
pub const ACTIVE_PRESET: Option<Preset> = active_preset();

/// Time between captures in milliseconds.
pub const CAPTURE_INTERVAL_MS: u64 = match ACTIVE_PRESET {
    Some(preset) => preset.interval_ms(),
    None => BASE_CAPTURE_INTERVAL_MS,
};

/// JPEG quality (0-63, lower means higher quality).
pub const IMAGE_QUALITY: u8 = match ACTIVE_PRESET {
    Some(preset) => preset.quality(),
    None => BASE_IMAGE_QUALITY,
};

/// Requested frame size.
pub const FRAME_SIZE: FrameSize = match ACTIVE_PRESET {
    Some(preset) => match preset.frame_size() {
        Some(frame_size) => frame_size,
        None => BASE_FRAME_SIZE,
    },
    None => BASE_FRAME_SIZE,
};

// ---------------------------------------------------------------------------
// Camera hardware
// ---------------------------------------------------------------------------

/// V4L2 device index (`/dev/video<N>`).
pub const CAMERA_DEVICE_INDEX: usize = 0;

/// AI-Thinker style pin mapping for the 8-bit parallel camera interface.
pub const CAMERA_PINS: CameraPins = CameraPins {
    data: [5, 18, 19, 21, 36, 39, 34, 35],
    xclk: 0,
    pclk: 22,
    vsync: 25,
    href: 23,
    sda: 26,
    scl: 27,
    pwdn: Some(32),
    reset: None,
};

/// Sensor master clock.
pub const XCLK_FREQ_HZ: u32 = 20_000_000;

/// Frame buffers allocated when high-speed memory is available.
pub const BUFFER_COUNT: u32 = 2;

/// Free memory below which the low-memory settings are forced.
pub const HIGH_SPEED_MEMORY_MIN_KB: u64 = 4096;

/// Frame size forced when high-speed memory is missing.
pub const FALLBACK_FRAME_SIZE: FrameSize = FrameSize::Svga;

/// Quality forced when high-speed memory is missing.
pub const FALLBACK_IMAGE_QUALITY: u8 = 12;

/// Buffer count forced when high-speed memory is missing.
pub const FALLBACK_BUFFER_COUNT: u32 = 1;

// ---------------------------------------------------------------------------
// Sensor tuning
// ---------------------------------------------------------------------------

/// Brightness: -2 to 2.
pub const CAM_BRIGHTNESS: i8 = 0;
/// Contrast: -2 to 2.
pub const CAM_CONTRAST: i8 = 0;
/// Saturation: -2 to 2.
pub const CAM_SATURATION: i8 = 0;
/// Auto exposure level: -2 to 2.
pub const CAM_AE_LEVEL: i8 = 0;
/// Manual exposure: 0 to 1200, only used with auto exposure disabled.
pub const CAM_AEC_VALUE: u16 = 300;
/// Horizontal mirror.
pub const CAM_HMIRROR: bool = false;
/// Vertical flip.
pub const CAM_VFLIP: bool = false;

/// Automatic white balance.
pub const ENABLE_AWB: bool = true;
/// Automatic exposure control.
pub const ENABLE_AEC: bool = true;
/// Automatic gain control.
pub const ENABLE_AGC: bool = true;

/// Sensor parameters pushed after a successful camera init.
pub const SENSOR_TUNING: SensorTuning = SensorTuning {
    brightness: CAM_BRIGHTNESS,
    contrast: CAM_CONTRAST,
    saturation: CAM_SATURATION,
    special_effect: 0,
    white_balance: ENABLE_AWB,
    awb_gain: ENABLE_AWB,
    wb_mode: 0,
    exposure_ctrl: ENABLE_AEC,
    aec2: false,
    ae_level: CAM_AE_LEVEL,
    aec_value: CAM_AEC_VALUE,
    gain_ctrl: ENABLE_AGC,
    agc_gain: 0,
    gain_ceiling: 0,
    bpc: false,
    wpc: true,
    raw_gamma: true,
    lens_correction: true,
    hmirror: CAM_HMIRROR,
    vflip: CAM_VFLIP,
    dcw: true,
    colorbar: false,
};

const _: () = assert!(IMAGE_QUALITY <= 63, "JPEG quality must be 0-63");
const _: () = assert!(SENSOR_TUNING.in_range(), "sensor tuning value out of range");

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Where the card's filesystem is mounted.
pub const MOUNT_POINT: &str = "/mnt/sdcard";

/// Directory on the card that receives the images.
pub const TIMELAPSE_DIR: &str = "/timelapse";

/// Images are named `IMG_00000.jpg`, `IMG_00001.jpg`, ...
pub const FILENAME_PREFIX: &str = "IMG_";
/// Filename extension.
pub const FILENAME_SUFFIX: &str = ".jpg";
/// Zero padding of the sequence number.
pub const FILENAME_DIGITS: usize = 5;

/// What the capture counter starts from after a reboot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMode {
    /// Start at zero; older files with the same names are overwritten.
    ResetOnBoot,
    /// Continue after the highest sequence number already on the card.
    ResumeFromMedia,
}

/// Counter policy, selected with the `resume-counter` feature.
pub const COUNTER_MODE: CounterMode = if cfg!(feature = "resume-counter") {
    CounterMode::ResumeFromMedia
} else {
    CounterMode::ResetOnBoot
};

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Serial console speed, reported in the startup dump.
pub const SERIAL_BAUD: u32 = 115_200;

/// Debug level logging by default.
pub const DEBUG_ENABLED: bool = true;

/// Status LED GPIO (built-in flash LED).
pub const LED_PIN: u8 = 4;

/// Blinks after the camera initialized.
pub const LED_BLINK_CAMERA_OK: u32 = 2;
/// Blinks after the card mounted.
pub const LED_BLINK_SD_OK: u32 = 3;
/// Blinks when the card is unavailable.
pub const LED_BLINK_SD_WARN: u32 = 5;
/// Blinks before halting on a fatal error.
pub const LED_BLINK_ERROR: u32 = 10;

/// On and off time of a single blink.
pub const LED_BLINK_DURATION_MS: u32 = 100;
/// On/off time of each pulse in the fatal pattern.
pub const LED_BLINK_ERROR_DURATION_MS: u32 = 200;

/// Brownout detector state, reported in the startup dump.
pub const ENABLE_BROWNOUT_DETECTOR: bool = false;

/// Sleep between two evaluations of the capture interval.
pub const POLL_INTERVAL_MS: u64 = 10;

/// Everything the boot sequence and capture loop need, resolved at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Time between captures in milliseconds.
    pub capture_interval_ms: u64,
    /// Requested camera setup before the memory probe.
    pub camera: CameraConfig,
    /// Sensor parameters applied after init.
    pub tuning: SensorTuning,
    /// Mount point of the card.
    pub mount_point: &'static str,
    /// Image directory on the card.
    pub directory: &'static str,
    /// Filename prefix.
    pub filename_prefix: &'static str,
    /// Filename suffix.
    pub filename_suffix: &'static str,
    /// Zero padding of the sequence number.
    pub filename_digits: usize,
    /// Counter policy after reboot.
    pub counter_mode: CounterMode,
}

/// The build's configuration.
pub const CAPTURE_CONFIG: CaptureConfig = CaptureConfig {
    capture_interval_ms: CAPTURE_INTERVAL_MS,
    camera: CameraConfig {
        pins: CAMERA_PINS,
        xclk_freq_hz: XCLK_FREQ_HZ,
        pixel_format: FourCC::MJPG,
        frame_size: FRAME_SIZE,
        jpeg_quality: IMAGE_QUALITY,
        buffer_count: BUFFER_COUNT,
    },
    tuning: SENSOR_TUNING,
    mount_point: MOUNT_POINT,
    directory: TIMELAPSE_DIR,
    filename_prefix: FILENAME_PREFIX,
    filename_suffix: FILENAME_SUFFIX,
    filename_digits: FILENAME_DIGITS,
    counter_mode: COUNTER_MODE,
};
