//! Status LED driven in blink patterns.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};
use log::warn;
use thiserror::Error;

use crate::config::{LED_BLINK_CAMERA_OK, LED_BLINK_ERROR, LED_BLINK_SD_OK, LED_BLINK_SD_WARN};

/// Coarse system state shown on the LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Camera initialized.
    CameraOk,
    /// Storage mounted.
    StorageOk,
    /// Storage unavailable, running without saving.
    StorageWarn,
    /// Camera failed, system halts.
    FatalError,
}

impl Pattern {
    /// Number of on/off pulses.
    #[must_use]
    pub const fn pulses(self) -> u32 {
        match self {
            Self::CameraOk => LED_BLINK_CAMERA_OK,
            Self::StorageOk => LED_BLINK_SD_OK,
            Self::StorageWarn => LED_BLINK_SD_WARN,
            Self::FatalError => LED_BLINK_ERROR,
        }
    }
}

/// Single LED that signals patterns and marks captures in progress.
///
/// Pin errors are ignored; the LED is informational only.
pub struct StatusIndicator<P: OutputPin, D: DelayNs> {
    pin: P,
    delay: D,
    pulse_ms: u32,
    fatal_pulse_ms: u32,
}

impl<P: OutputPin, D: DelayNs> StatusIndicator<P, D> {
    /// Take ownership of the pin and switch the LED off.
    pub fn new(mut pin: P, delay: D, pulse_ms: u32) -> Self {
        pin.set_low().ok();
        Self {
            pin,
            delay,
            pulse_ms,
            fatal_pulse_ms: pulse_ms,
        }
    }

    /// Use a slower pulse for [`Pattern::FatalError`].
    #[must_use]
    pub fn with_fatal_pulse_ms(mut self, fatal_pulse_ms: u32) -> Self {
        self.fatal_pulse_ms = fatal_pulse_ms;
        self
    }

    /// Blink `pattern`, blocking for `pulses * 2` times its pulse length.
    pub fn signal(&mut self, pattern: Pattern) {
        let pulse_ms = match pattern {
            Pattern::FatalError => self.fatal_pulse_ms,
            _ => self.pulse_ms,
        };
        for _ in 0..pattern.pulses() {
            self.pin.set_high().ok();
            self.delay.delay_ms(pulse_ms);
            self.pin.set_low().ok();
            self.delay.delay_ms(pulse_ms);
        }
    }

    /// Hold the LED on while a capture is running.
    pub fn set_busy(&mut self, busy: bool) {
        if busy {
            self.pin.set_high().ok();
        } else {
            self.pin.set_low().ok();
        }
    }
}

/// Failure writing a sysfs GPIO attribute.
#[derive(Error, Debug)]
#[error("gpio write failed: {0}")]
pub struct GpioError(#[from] io::Error);

impl digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Output pin driven through the sysfs GPIO interface.
#[derive(Debug)]
pub struct SysfsGpio {
    value: PathBuf,
}

impl SysfsGpio {
    /// Export `pin` and configure it as an output.
    ///
    /// Export failures are logged; later writes then fail silently.
    #[must_use]
    pub fn new(pin: u8) -> Self {
        let base = PathBuf::from(format!("/sys/class/gpio/gpio{pin}"));
        if !base.exists() {
            if let Err(err) = fs::write("/sys/class/gpio/export", pin.to_string()) {
                warn!("Cannot export GPIO {pin}: {err}");
            }
        }
        if let Err(err) = fs::write(base.join("direction"), "out") {
            warn!("Cannot configure GPIO {pin} as output: {err}");
        }
        Self {
            value: base.join("value"),
        }
    }
}

impl ErrorType for SysfsGpio {
    type Error = GpioError;
}

impl OutputPin for SysfsGpio {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        fs::write(&self.value, "0")?;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        fs::write(&self.value, "1")?;
        Ok(())
    }
}

/// Blocking delay on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}
