//! Mock hardware for testing without a camera, card or LED.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::camera::CameraConfig;
use crate::error::{CameraError, CaptureError, InitError, WriteError};
use crate::sequencer::FilenameSequencer;
use crate::traits::{CaptureDevice, Clock, FrameBuffer, FrameStore, Written};
use crate::tuning::SensorSetting;

/// Scripted camera producing small JPEG-shaped frames.
pub struct MockCamera {
    high_speed_memory: bool,
    fail_init: bool,
    rejected: Vec<&'static str>,
    failing_captures: u32,
    capture_failure_every: Option<u32>,
    capture_delay: Option<(ManualClock, u64)>,
    initialized_with: Option<CameraConfig>,
    init_calls: u32,
    memory_probes: Cell<u32>,
    applied: Vec<SensorSetting>,
    attempts: u32,
    captures: u32,
    failed_captures: u32,
    releases: u32,
    leased: u32,
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCamera {
    /// Camera with enough memory that accepts every setting and capture.
    #[must_use]
    pub fn new() -> Self {
        Self {
            high_speed_memory: true,
            fail_init: false,
            rejected: Vec::new(),
            failing_captures: 0,
            capture_failure_every: None,
            capture_delay: None,
            initialized_with: None,
            init_calls: 0,
            memory_probes: Cell::new(0),
            applied: Vec::new(),
            attempts: 0,
            captures: 0,
            failed_captures: 0,
            releases: 0,
            leased: 0,
        }
    }

    /// Report no high-speed frame memory.
    #[must_use]
    pub fn without_high_speed_memory(mut self) -> Self {
        self.high_speed_memory = false;
        self
    }

    /// Fail driver init with a missing capability.
    #[must_use]
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Reject the setting with this name.
    #[must_use]
    pub fn rejecting_setting(mut self, name: &'static str) -> Self {
        self.rejected.push(name);
        self
    }

    /// Fail the first `count` capture attempts.
    #[must_use]
    pub fn failing_captures(mut self, count: u32) -> Self {
        self.failing_captures = count;
        self
    }

    /// Fail every `n`th capture attempt.
    #[must_use]
    pub fn capture_failure_every(mut self, n: u32) -> Self {
        self.capture_failure_every = Some(n.max(1));
        self
    }

    /// Advance `clock` by `ms` on every capture attempt.
    #[must_use]
    pub fn with_capture_delay(mut self, clock: ManualClock, ms: u64) -> Self {
        self.capture_delay = Some((clock, ms));
        self
    }

    /// Config passed to the last successful init.
    pub const fn initialized_with(&self) -> Option<&CameraConfig> {
        self.initialized_with.as_ref()
    }

    /// Number of init calls, successful or not.
    pub const fn init_calls(&self) -> u32 {
        self.init_calls
    }

    /// Number of memory probes.
    pub fn memory_probes(&self) -> u32 {
        self.memory_probes.get()
    }

    /// Settings the camera accepted, in order.
    pub fn applied_settings(&self) -> &[SensorSetting] {
        &self.applied
    }

    /// Frames handed out.
    pub const fn captures(&self) -> u32 {
        self.captures
    }

    /// Capture attempts that failed.
    pub const fn failed_captures(&self) -> u32 {
        self.failed_captures
    }

    /// Frames returned.
    pub const fn releases(&self) -> u32 {
        self.releases
    }

    /// Frames currently out.
    pub const fn leased(&self) -> u32 {
        self.leased
    }

    fn attempt_fails(&self) -> bool {
        self.attempts <= self.failing_captures
            || self
                .capture_failure_every
                .is_some_and(|n| self.attempts % n == 0)
    }
}

impl CaptureDevice for MockCamera {
    fn high_speed_memory_available(&self) -> bool {
        self.memory_probes.set(self.memory_probes.get() + 1);
        self.high_speed_memory
    }

    fn initialize(&mut self, config: &CameraConfig) -> Result<(), InitError> {
        self.init_calls += 1;
        if self.fail_init {
            return Err(InitError::MissingCapability("video capture"));
        }
        self.initialized_with = Some(config.clone());
        Ok(())
    }

    fn apply_setting(&mut self, setting: SensorSetting) -> Result<(), CameraError> {
        if self.rejected.contains(&setting.name()) {
            return Err(CameraError::ControlRejected {
                name: setting.name(),
                source: io::Error::from(io::ErrorKind::InvalidInput),
            });
        }
        self.applied.push(setting);
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<FrameBuffer, CaptureError> {
        self.attempts += 1;
        if let Some((clock, ms)) = &self.capture_delay {
            clock.advance(*ms);
        }
        if self.attempt_fails() {
            self.failed_captures += 1;
            return Err(CaptureError::Stream(io::Error::from(io::ErrorKind::TimedOut)));
        }

        let sequence = self.captures;
        self.captures += 1;
        self.leased += 1;
        Ok(FrameBuffer::new(
            jpeg_frame(sequence),
            sequence,
            Duration::from_millis(u64::from(sequence) * 33),
        ))
    }

    fn release_frame(&mut self, frame: FrameBuffer) {
        self.releases += 1;
        self.leased = self.leased.saturating_sub(1);
        drop(frame);
    }
}

/// Minimal JFIF-shaped payload whose body varies with `sequence`.
fn jpeg_frame(sequence: u32) -> Vec<u8> {
    let mut data = vec![
        0xFF, 0xD8, // SOI
        0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01,
        0x00, 0x01, 0x00, 0x00,
    ];
    data.extend(sequence.to_be_bytes());
    data.extend((0..64u8).map(|i| i.wrapping_mul(7)));
    data.extend([0xFF, 0xD9]); // EOI
    data
}

/// In-memory card.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: BTreeMap<PathBuf, Vec<u8>>,
    failing_writes: u32,
    write_failure_every: Option<u32>,
    write_attempts: u32,
}

impl MemoryStore {
    /// Empty store that accepts every write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `count` writes.
    #[must_use]
    pub fn failing_writes(mut self, count: u32) -> Self {
        self.failing_writes = count;
        self
    }

    /// Fail every `n`th write.
    #[must_use]
    pub fn write_failure_every(mut self, n: u32) -> Self {
        self.write_failure_every = Some(n.max(1));
        self
    }

    /// Pre-populate a file.
    #[must_use]
    pub fn with_file(mut self, path: &str, bytes: &[u8]) -> Self {
        self.files.insert(PathBuf::from(path), bytes.to_vec());
        self
    }

    /// Write calls, successful or not.
    pub const fn write_attempts(&self) -> u32 {
        self.write_attempts
    }

    /// Number of stored files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Stored paths in order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    /// Contents of `path`.
    pub fn file(&self, path: &Path) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }
}

impl FrameStore for MemoryStore {
    fn write_file(&mut self, path: &Path, bytes: &[u8]) -> Result<Written, WriteError> {
        self.write_attempts += 1;
        let fails = self.write_attempts <= self.failing_writes
            || self
                .write_failure_every
                .is_some_and(|n| self.write_attempts % n == 0);
        if fails {
            return Err(WriteError::Write {
                path: path.to_path_buf(),
                source: io::Error::other("card full"),
            });
        }
        self.files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(Written {
            path: path.to_path_buf(),
            bytes: bytes.len(),
        })
    }

    fn last_sequence(&self, sequencer: &FilenameSequencer) -> Option<u32> {
        let directory = Path::new(sequencer.directory());
        self.files
            .keys()
            .filter(|path| path.parent() == Some(directory))
            .filter_map(|path| sequencer.parse(path.file_name()?.to_str()?))
            .max()
    }
}

/// Clock moved by hand; clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    /// Clock reading `start_ms`.
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    /// Jump to `ms`.
    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    /// Move forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Output pin recording every level it is driven to; clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingPin {
    levels: Rc<RefCell<Vec<bool>>>,
}

impl RecordingPin {
    /// Pin with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every level written, in order.
    pub fn levels(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }

    /// Number of low-to-high transitions.
    pub fn pulses(&self) -> u32 {
        let levels = self.levels.borrow();
        let mut previous = false;
        let mut rising = 0;
        for &level in levels.iter() {
            if level && !previous {
                rising += 1;
            }
            previous = level;
        }
        rising
    }

    /// Last level written.
    pub fn is_high(&self) -> bool {
        self.levels.borrow().last().copied().unwrap_or(false)
    }
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(true);
        Ok(())
    }
}

/// Delay that only adds up the requested time; clones share the total.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    elapsed_ns: Rc<Cell<u64>>,
}

impl RecordingDelay {
    /// Delay with nothing elapsed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requested delay in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns.get() / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns
            .set(self.elapsed_ns.get().saturating_add(u64::from(ns)));
    }
}

/// Logger keeping each test thread's records apart.
struct ThreadLogger;

thread_local! {
    static RECORDS: RefCell<Option<Vec<(Level, String)>>> = const { RefCell::new(None) };
}

impl Log for ThreadLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        RECORDS.with(|records| {
            if let Some(records) = records.borrow_mut().as_mut() {
                records.push((record.level(), record.args().to_string()));
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: ThreadLogger = ThreadLogger;
static INSTALL_LOGGER: Once = Once::new();

/// Run `f` and return what it logged on this thread.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<(Level, String)>) {
    INSTALL_LOGGER.call_once(|| {
        log::set_logger(&LOGGER).expect("another logger is already installed");
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|records| *records.borrow_mut() = Some(Vec::new()));
    let result = f();
    let logged = RECORDS.with(|records| records.borrow_mut().take().unwrap_or_default());
    (result, logged)
}

static TEMP_DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Scratch directory removed on drop.
#[derive(Debug)]
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    /// Create a fresh directory under the system temp dir.
    #[must_use]
    pub fn new() -> Self {
        let n = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("timelapse-cam-{}-{n}", process::id()));
        if path.exists() {
            fs::remove_dir_all(&path).expect("failed to clear stale temp dir");
        }
        fs::create_dir_all(&path).expect("failed to create temp dir");
        Self { path }
    }

    /// The directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.path).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_camera_scripted_failures() {
        let mut camera = MockCamera::new().capture_failure_every(2);
        let first = camera.capture_frame().expect("first capture should succeed");
        assert!(camera.capture_frame().is_err());
        assert_eq!(first.sequence(), 0);
        camera.release_frame(first);

        assert_eq!(camera.captures(), 1);
        assert_eq!(camera.failed_captures(), 1);
        assert_eq!(camera.leased(), 0);
    }

    #[test]
    fn test_mock_frames_differ_by_sequence() {
        assert_ne!(jpeg_frame(0), jpeg_frame(1));
        assert_eq!(jpeg_frame(0).len(), jpeg_frame(1).len());
    }

    #[test]
    fn test_memory_store_last_sequence() {
        let sequencer = FilenameSequencer::new("/timelapse", "IMG_", ".jpg", 5);
        let store = MemoryStore::new()
            .with_file("/timelapse/IMG_00004.jpg", b"a")
            .with_file("/timelapse/IMG_00009.jpg", b"b")
            .with_file("/other/IMG_00050.jpg", b"c");
        assert_eq!(store.last_sequence(&sequencer), Some(9));
        assert_eq!(MemoryStore::new().last_sequence(&sequencer), None);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(5);
        let other = clock.clone();
        other.advance(10);
        assert_eq!(clock.now_ms(), 15);
    }

    #[test]
    fn test_recording_pin_counts_rising_edges() {
        let mut pin = RecordingPin::new();
        for level in [false, true, true, false, true] {
            if level {
                pin.set_high().expect("infallible");
            } else {
                pin.set_low().expect("infallible");
            }
        }
        assert_eq!(pin.pulses(), 2);
        assert!(pin.is_high());
    }

    #[test]
    fn test_capture_logs_only_inside_closure() {
        log::info!("before");
        let (value, logged) = capture_logs(|| {
            log::warn!("inside {}", 1);
            7
        });
        log::info!("after");

        assert_eq!(value, 7);
        assert_eq!(logged, vec![(Level::Warn, "inside 1".to_owned())]);
    }

    #[test]
    fn test_temp_dir_removed_on_drop() {
        let path = {
            let tmp = TempDir::new();
            assert!(tmp.path().is_dir());
            tmp.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
