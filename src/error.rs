//! Error types, one per failure tier.
//!
//! `InitError` is fatal, `MountError` degrades the run to capture-without-save,
//! `CaptureError` and `WriteError` abort a single cycle.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error from an individual camera operation.
#[derive(Error, Debug)]
pub enum CameraError {
    /// The camera has not been brought up yet.
    #[error("camera not initialized")]
    NotInitialized,

    /// The sensor has no equivalent for this parameter.
    #[error("{0} is not supported by this sensor")]
    UnsupportedSetting(&'static str),

    /// The driver refused a control value.
    #[error("control {name} rejected: {source}")]
    ControlRejected {
        /// Control name.
        name: &'static str,
        /// Driver error.
        #[source]
        source: io::Error,
    },
}

/// Fatal error while bringing up the capture device.
#[derive(Error, Debug)]
pub enum InitError {
    /// Device node could not be opened.
    #[error("failed to open camera device {index}: {source}")]
    DeviceOpenFailed {
        /// Device index.
        index: usize,
        /// OS error.
        #[source]
        source: io::Error,
    },

    /// Device lacks a required capability.
    #[error("camera does not support {0}")]
    MissingCapability(&'static str),

    /// Driver could not be queried or configured.
    #[error("failed to configure format: {0}")]
    Format(#[source] io::Error),

    /// Driver answered with a different format than requested.
    #[error("format rejected: requested {requested}, driver chose {actual}")]
    FormatRejected {
        /// What was asked for.
        requested: String,
        /// What the driver settled on.
        actual: String,
    },

    /// Frame buffer pool could not be allocated.
    #[error("failed to allocate {count} frame buffers: {source}")]
    BufferAllocation {
        /// Requested buffer count.
        count: u32,
        /// Driver error.
        #[source]
        source: io::Error,
    },
}

/// Transient failure to produce one frame.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Capture attempted before init.
    #[error("camera not initialized")]
    NotInitialized,

    /// Every buffer of the pool is leased.
    #[error("no frame buffer available ({0} leased)")]
    NoBuffer(u32),

    /// Driver delivered a frame with no payload.
    #[error("driver returned an empty frame")]
    EmptyFrame,

    /// Streaming I/O failed.
    #[error("stream error: {0}")]
    Stream(#[from] io::Error),
}

/// Non-fatal failure to attach the removable volume.
#[derive(Error, Debug)]
pub enum MountError {
    /// The mount point is missing or unusable.
    #[error("mount of {path} failed: {source}")]
    MountFailed {
        /// Mount point.
        path: PathBuf,
        /// OS error.
        #[source]
        source: io::Error,
    },

    /// Nothing is mounted at the mount point.
    #[error("no media attached at {0}")]
    NoMedia(PathBuf),
}

/// Transient failure to persist one frame.
#[derive(Error, Debug)]
pub enum WriteError {
    /// The file could not be created.
    #[error("failed to open file {path}: {source}")]
    Open {
        /// File path.
        path: PathBuf,
        /// OS error.
        #[source]
        source: io::Error,
    },

    /// Writing or flushing the bytes failed.
    #[error("failed to write file {path}: {source}")]
    Write {
        /// File path.
        path: PathBuf,
        /// OS error.
        #[source]
        source: io::Error,
    },
}

/// A stored or captured payload that is not a standalone image.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Payload shorter than the two markers.
    #[error("payload too short: {0} bytes")]
    TooShort(usize),

    /// Missing `FF D8` start-of-image marker.
    #[error("missing start-of-image marker")]
    MissingSoi,

    /// Missing `FF D9` end-of-image marker.
    #[error("missing end-of-image marker")]
    MissingEoi,

    /// Sequence numbers are not consecutive.
    #[error("sequence gap at index {index}: expected {expected}, got {actual}")]
    SequenceGap {
        /// Position in the checked list.
        index: usize,
        /// Value that should have been there.
        expected: u32,
        /// Value found.
        actual: u32,
    },

    /// Nothing to check.
    #[error("empty sequence")]
    EmptySequence,
}
