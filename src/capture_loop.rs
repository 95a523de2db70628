//! The capture/persist polling loop.
//!
//! Two states: idle until the interval has elapsed, then one blocking capture
//! cycle. The interval runs from the start of one cycle to the start of the
//! next; a cycle that overruns it is followed at once by the next one, with
//! no catch-up of missed ticks.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{error, info};

use crate::camera::FrameLease;
use crate::config::POLL_INTERVAL_MS;
use crate::indicator::StatusIndicator;
use crate::sequencer::FilenameSequencer;
use crate::traits::{CaptureDevice, Clock, FrameStore, Written};

/// Mutable state owned by the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureState {
    /// Sequence number of the next saved image; advances only on a confirmed write.
    pub counter: u32,
    /// Clock reading that started the previous cycle (or boot).
    pub last_capture_ms: u64,
}

/// Result of one capture cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Frame written to the card.
    Saved(Written),
    /// Frame captured but the write failed; no sequence number consumed.
    WriteFailed,
    /// Frame captured and discarded because storage is unavailable.
    NotSaved,
    /// The camera produced no frame.
    CaptureFailed,
}

/// Periodic capture loop over a camera, an optional store and a status LED.
pub struct CaptureLoop<C, S, P, D, K>
where
    C: CaptureDevice,
    S: FrameStore,
    P: OutputPin,
    D: DelayNs,
    K: Clock,
{
    camera: C,
    storage: Option<S>,
    indicator: StatusIndicator<P, D>,
    clock: K,
    sequencer: FilenameSequencer,
    interval_ms: u64,
    state: CaptureState,
}

impl<C, S, P, D, K> CaptureLoop<C, S, P, D, K>
where
    C: CaptureDevice,
    S: FrameStore,
    P: OutputPin,
    D: DelayNs,
    K: Clock,
{
    /// Assemble a loop; `storage` of `None` runs in degraded mode.
    pub fn new(
        camera: C,
        storage: Option<S>,
        indicator: StatusIndicator<P, D>,
        clock: K,
        sequencer: FilenameSequencer,
        interval_ms: u64,
        state: CaptureState,
    ) -> Self {
        Self {
            camera,
            storage,
            indicator,
            clock,
            sequencer,
            interval_ms,
            state,
        }
    }

    /// Evaluate the interval once and run a cycle if it has elapsed.
    pub fn poll(&mut self) -> Option<CycleOutcome> {
        let now = self.clock.now_ms();
        if now.saturating_sub(self.state.last_capture_ms) < self.interval_ms {
            return None;
        }
        let outcome = self.capture_cycle();
        self.state.last_capture_ms = now;
        Some(outcome)
    }

    /// Capture one frame and persist it if storage is available.
    pub fn capture_cycle(&mut self) -> CycleOutcome {
        info!("----------------------------------------");
        info!("Capturing image #{}...", u64::from(self.state.counter) + 1);

        self.indicator.set_busy(true);

        let frame = match FrameLease::acquire(&mut self.camera) {
            Ok(frame) => frame,
            Err(err) => {
                error!("Camera capture failed: {err}");
                self.indicator.set_busy(false);
                return CycleOutcome::CaptureFailed;
            }
        };
        info!("Image captured: {} bytes", frame.len());

        let outcome = match self.storage.as_mut() {
            Some(storage) => {
                let path = self.sequencer.next_name(self.state.counter);
                match storage.write_file(&path, frame.bytes()) {
                    Ok(written) => {
                        self.state.counter = self.state.counter.saturating_add(1);
                        info!("Saved as {}", written.path.display());
                        CycleOutcome::Saved(written)
                    }
                    Err(err) => {
                        error!("Frame discarded: {err}");
                        CycleOutcome::WriteFailed
                    }
                }
            }
            None => {
                info!("Storage not available, image not saved");
                CycleOutcome::NotSaved
            }
        };
        drop(frame);

        self.indicator.set_busy(false);
        info!("Next capture in {} seconds", self.interval_ms / 1000);

        outcome
    }

    /// Poll forever with a short sleep between ticks.
    pub fn run(mut self) -> ! {
        info!("System ready, starting timelapse capture");
        loop {
            self.poll();
            thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
        }
    }

    /// Current loop state.
    pub const fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Whether frames are being persisted.
    pub const fn storage_available(&self) -> bool {
        self.storage.is_some()
    }

    /// The capture device.
    pub const fn camera(&self) -> &C {
        &self.camera
    }

    /// The store, when available.
    pub const fn storage(&self) -> Option<&S> {
        self.storage.as_ref()
    }

    /// Path the next saved frame will get.
    pub fn next_path(&self) -> PathBuf {
        self.sequencer.next_name(self.state.counter)
    }

    /// Directory frames are saved in.
    pub fn directory(&self) -> &Path {
        Path::new(self.sequencer.directory())
    }
}
