//! Sensor tuning applied as a best-effort batch.

use std::fmt;

use log::{debug, warn};

use crate::error::CameraError;
use crate::traits::CaptureDevice;

/// Analog and digital sensor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct SensorTuning {
    /// -2 to 2
    pub brightness: i8,
    /// -2 to 2
    pub contrast: i8,
    /// -2 to 2
    pub saturation: i8,
    /// 0 to 6, 0 is no effect
    pub special_effect: u8,
    /// Automatic white balance.
    pub white_balance: bool,
    /// Automatic white balance gain.
    pub awb_gain: bool,
    /// 0 to 4, used when `awb_gain` is enabled
    pub wb_mode: u8,
    /// Automatic exposure control.
    pub exposure_ctrl: bool,
    /// DSP exposure control.
    pub aec2: bool,
    /// -2 to 2
    pub ae_level: i8,
    /// 0 to 1200, manual exposure
    pub aec_value: u16,
    /// Automatic gain control.
    pub gain_ctrl: bool,
    /// 0 to 30, manual gain
    pub agc_gain: u8,
    /// 0 to 6
    pub gain_ceiling: u8,
    /// Black pixel correction.
    pub bpc: bool,
    /// White pixel correction.
    pub wpc: bool,
    /// Raw gamma.
    pub raw_gamma: bool,
    /// Lens correction.
    pub lens_correction: bool,
    /// Horizontal mirror.
    pub hmirror: bool,
    /// Vertical flip.
    pub vflip: bool,
    /// Downsize crop window.
    pub dcw: bool,
    /// Test color bar.
    pub colorbar: bool,
}

const fn level_in_range(level: i8) -> bool {
    level >= -2 && level <= 2
}

impl SensorTuning {
    /// Whether every value lies within the sensor's accepted range.
    #[must_use]
    pub const fn in_range(&self) -> bool {
        level_in_range(self.brightness)
            && level_in_range(self.contrast)
            && level_in_range(self.saturation)
            && level_in_range(self.ae_level)
            && self.special_effect <= 6
            && self.wb_mode <= 4
            && self.aec_value <= 1200
            && self.agc_gain <= 30
            && self.gain_ceiling <= 6
    }

    /// The batch in the order it is pushed to the sensor.
    #[must_use]
    pub const fn settings(&self) -> [SensorSetting; 22] {
        [
            SensorSetting::Brightness(self.brightness),
            SensorSetting::Contrast(self.contrast),
            SensorSetting::Saturation(self.saturation),
            SensorSetting::SpecialEffect(self.special_effect),
            SensorSetting::WhiteBalance(self.white_balance),
            SensorSetting::AwbGain(self.awb_gain),
            SensorSetting::WbMode(self.wb_mode),
            SensorSetting::ExposureCtrl(self.exposure_ctrl),
            SensorSetting::Aec2(self.aec2),
            SensorSetting::AeLevel(self.ae_level),
            SensorSetting::AecValue(self.aec_value),
            SensorSetting::GainCtrl(self.gain_ctrl),
            SensorSetting::AgcGain(self.agc_gain),
            SensorSetting::GainCeiling(self.gain_ceiling),
            SensorSetting::Bpc(self.bpc),
            SensorSetting::Wpc(self.wpc),
            SensorSetting::RawGamma(self.raw_gamma),
            SensorSetting::LensCorrection(self.lens_correction),
            SensorSetting::HMirror(self.hmirror),
            SensorSetting::VFlip(self.vflip),
            SensorSetting::Dcw(self.dcw),
            SensorSetting::ColorBar(self.colorbar),
        ]
    }
}

/// One tuning parameter with its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SensorSetting {
    Brightness(i8),
    Contrast(i8),
    Saturation(i8),
    SpecialEffect(u8),
    WhiteBalance(bool),
    AwbGain(bool),
    WbMode(u8),
    ExposureCtrl(bool),
    Aec2(bool),
    AeLevel(i8),
    AecValue(u16),
    GainCtrl(bool),
    AgcGain(u8),
    GainCeiling(u8),
    Bpc(bool),
    Wpc(bool),
    RawGamma(bool),
    LensCorrection(bool),
    HMirror(bool),
    VFlip(bool),
    Dcw(bool),
    ColorBar(bool),
}

impl SensorSetting {
    /// Parameter name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Brightness(_) => "brightness",
            Self::Contrast(_) => "contrast",
            Self::Saturation(_) => "saturation",
            Self::SpecialEffect(_) => "special effect",
            Self::WhiteBalance(_) => "white balance",
            Self::AwbGain(_) => "awb gain",
            Self::WbMode(_) => "wb mode",
            Self::ExposureCtrl(_) => "exposure control",
            Self::Aec2(_) => "aec2",
            Self::AeLevel(_) => "ae level",
            Self::AecValue(_) => "aec value",
            Self::GainCtrl(_) => "gain control",
            Self::AgcGain(_) => "agc gain",
            Self::GainCeiling(_) => "gain ceiling",
            Self::Bpc(_) => "bpc",
            Self::Wpc(_) => "wpc",
            Self::RawGamma(_) => "raw gamma",
            Self::LensCorrection(_) => "lens correction",
            Self::HMirror(_) => "hmirror",
            Self::VFlip(_) => "vflip",
            Self::Dcw(_) => "dcw",
            Self::ColorBar(_) => "colorbar",
        }
    }
}

impl fmt::Display for SensorSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Brightness(v) | Self::Contrast(v) | Self::Saturation(v) | Self::AeLevel(v) => {
                write!(f, "{}={v}", self.name())
            }
            Self::SpecialEffect(v) | Self::WbMode(v) | Self::AgcGain(v) | Self::GainCeiling(v) => {
                write!(f, "{}={v}", self.name())
            }
            Self::AecValue(v) => write!(f, "{}={v}", self.name()),
            Self::WhiteBalance(on)
            | Self::AwbGain(on)
            | Self::ExposureCtrl(on)
            | Self::Aec2(on)
            | Self::GainCtrl(on)
            | Self::Bpc(on)
            | Self::Wpc(on)
            | Self::RawGamma(on)
            | Self::LensCorrection(on)
            | Self::HMirror(on)
            | Self::VFlip(on)
            | Self::Dcw(on)
            | Self::ColorBar(on) => write!(f, "{}={}", self.name(), u8::from(on)),
        }
    }
}

/// A parameter the sensor refused.
#[derive(Debug)]
pub struct TuningFailure {
    /// The refused parameter.
    pub setting: SensorSetting,
    /// Why it was refused.
    pub error: CameraError,
}

/// Push every tuning parameter, collecting the ones that fail.
///
/// Failures are logged and returned; they never abort the batch.
pub fn apply_tuning<C>(device: &mut C, tuning: &SensorTuning) -> Vec<TuningFailure>
where
    C: CaptureDevice + ?Sized,
{
    let mut failures = Vec::new();
    for setting in tuning.settings() {
        match device.apply_setting(setting) {
            Ok(()) => debug!("Sensor {setting}"),
            Err(error) => {
                warn!("Sensor {setting} not applied: {error}");
                failures.push(TuningFailure { setting, error });
            }
        }
    }
    if !failures.is_empty() {
        debug!("{} of 22 sensor settings not applied", failures.len());
    }
    failures
}
