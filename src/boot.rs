//! One-time startup: camera, then storage, then a ready capture loop.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{error, info, warn};

use crate::camera;
use crate::capture_loop::{CaptureLoop, CaptureState};
use crate::config::{
    CaptureConfig, CounterMode, ACTIVE_PRESET, ENABLE_BROWNOUT_DETECTOR, SERIAL_BAUD,
};
use crate::error::{InitError, MountError};
use crate::indicator::{Pattern, StatusIndicator};
use crate::sequencer::FilenameSequencer;
use crate::traits::{CaptureDevice, Clock, FrameStore};

/// Bring the system up and hand back the loop that runs it.
///
/// The camera comes first. If it fails, the fatal pattern is shown once, the
/// error is returned and `mount` is never called. A failing `mount` only
/// leaves the loop without storage.
///
/// # Errors
///
/// Returns the camera's [`InitError`]; there is no other fatal path.
pub fn boot<C, S, P, D, K, M>(
    mut camera: C,
    mut indicator: StatusIndicator<P, D>,
    clock: K,
    config: &CaptureConfig,
    mount: M,
) -> Result<CaptureLoop<C, S, P, D, K>, InitError>
where
    C: CaptureDevice,
    S: FrameStore,
    P: OutputPin,
    D: DelayNs,
    K: Clock,
    M: FnOnce() -> Result<S, MountError>,
{
    info!("========================================");
    info!("Timelapse camera v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");

    info!("[1/2] Initializing camera...");
    let settings = match camera::initialize(&mut camera, &config.camera, &config.tuning) {
        Ok(settings) => settings,
        Err(err) => {
            error!("Camera init failed: {err}");
            indicator.signal(Pattern::FatalError);
            return Err(err);
        }
    };
    info!("Camera initialized successfully");
    indicator.signal(Pattern::CameraOk);

    info!("[2/2] Initializing storage...");
    let storage = match mount() {
        Ok(storage) => {
            info!("Storage mounted at {}", config.mount_point);
            indicator.signal(Pattern::StorageOk);
            Some(storage)
        }
        Err(err) => {
            warn!("Storage mount failed: {err}");
            warn!("Continuing without storage, images will not be saved");
            indicator.signal(Pattern::StorageWarn);
            None
        }
    };

    let sequencer = FilenameSequencer::new(
        config.directory,
        config.filename_prefix,
        config.filename_suffix,
        config.filename_digits,
    );
    let counter = starting_counter(config.counter_mode, storage.as_ref(), &sequencer);

    info!("========================================");
    info!("Configuration:");
    info!(
        "  Preset: {}",
        ACTIVE_PRESET.map_or("none", |preset| preset.name())
    );
    info!("  Capture interval: {} ms", config.capture_interval_ms);
    info!("  Frame size: {}", settings.config.frame_size);
    info!("  JPEG quality: {}", settings.config.jpeg_quality);
    info!("  Frame buffers: {}", settings.config.buffer_count);
    info!(
        "  Sensor settings rejected: {}",
        settings.tuning_failures.len()
    );
    info!("  Save path: {}{}", config.mount_point, config.directory);
    info!(
        "  First file: {} ({} names before the width grows)",
        sequencer.file_name(counter),
        sequencer.capacity()
    );
    info!("  Counter mode: {:?}", config.counter_mode);
    info!("  Storage: {}", if storage.is_some() { "ready" } else { "unavailable" });
    info!("  Serial baud: {SERIAL_BAUD}");
    info!(
        "  Brownout detector: {}",
        if ENABLE_BROWNOUT_DETECTOR { "enabled" } else { "disabled" }
    );
    info!("========================================");

    let state = CaptureState {
        counter,
        last_capture_ms: clock.now_ms(),
    };
    Ok(CaptureLoop::new(
        camera,
        storage,
        indicator,
        clock,
        sequencer,
        config.capture_interval_ms,
        state,
    ))
}

fn starting_counter<S: FrameStore>(
    mode: CounterMode,
    storage: Option<&S>,
    sequencer: &FilenameSequencer,
) -> u32 {
    match (mode, storage) {
        (CounterMode::ResumeFromMedia, Some(storage)) => {
            match storage.last_sequence(sequencer) {
                Some(last) => {
                    info!("Resuming after {}", sequencer.file_name(last));
                    last.saturating_add(1)
                }
                None => 0,
            }
        }
        _ => 0,
    }
}
