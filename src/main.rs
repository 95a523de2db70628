//! Timelapse camera service.

use std::path::Path;
use std::thread;
use std::time::Duration;

use env_logger::Env;
use log::error;
use timelapse_cam::config::{
    CAMERA_DEVICE_INDEX, CAPTURE_CONFIG, DEBUG_ENABLED, LED_BLINK_DURATION_MS,
    LED_BLINK_ERROR_DURATION_MS, LED_PIN,
};
use timelapse_cam::{
    boot, MonotonicClock, MountError, MountTable, StatusIndicator, StdDelay, StorageManager,
    SysfsGpio, V4L2Camera,
};

fn main() {
    let default_filter = if DEBUG_ENABLED { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let config = &CAPTURE_CONFIG;
    let indicator = StatusIndicator::new(SysfsGpio::new(LED_PIN), StdDelay, LED_BLINK_DURATION_MS)
        .with_fatal_pulse_ms(LED_BLINK_ERROR_DURATION_MS);
    let camera = V4L2Camera::new(CAMERA_DEVICE_INDEX);

    let mount = || {
        let mount_point = Path::new(config.mount_point);
        let mounts = MountTable::load().map_err(|source| MountError::MountFailed {
            path: mount_point.to_path_buf(),
            source,
        })?;
        StorageManager::initialize(mount_point, config.directory, &mounts)
    };

    match boot(camera, indicator, MonotonicClock::new(), config, mount) {
        Ok(capture) => capture.run(),
        Err(err) => {
            error!("System halted: {err}");
            halt()
        }
    }
}

fn halt() -> ! {
    loop {
        thread::sleep(Duration::from_secs(1));
    }
}
