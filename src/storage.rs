//! Removable storage on a mounted card.
//!
//! The OS attaches the card's filesystem; [`StorageManager::initialize`]
//! verifies that the mount point is usable and that the kernel mount table
//! lists a filesystem there before any frame is written.

use std::fs::{self, File};
use std::io::{self, Write as _};
use std::path::{Component, Path, PathBuf};

use log::{info, warn};
use nix::sys::statvfs::statvfs;

use crate::error::{MountError, WriteError};
use crate::sequencer::FilenameSequencer;
use crate::traits::{FrameStore, Written};

/// Kernel mount table.
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Block device or pseudo source.
    pub source: String,
    /// Where it is mounted.
    pub mount_point: PathBuf,
    /// Filesystem type.
    pub fs_type: String,
}

/// Snapshot of the kernel mount table.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    /// Read the current mount table.
    pub fn load() -> io::Result<Self> {
        Ok(Self::parse(&fs::read_to_string(PROC_MOUNTS)?))
    }

    /// Parse text in `/proc/mounts` format.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let source = unescape(fields.next()?);
                let mount_point = PathBuf::from(unescape(fields.next()?));
                let fs_type = fields.next()?.to_owned();
                Some(MountEntry {
                    source,
                    mount_point,
                    fs_type,
                })
            })
            .collect();
        Self { entries }
    }

    /// Entry mounted exactly at `mount_point`; later mounts shadow earlier ones.
    #[must_use]
    pub fn find(&self, mount_point: &Path) -> Option<&MountEntry> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.mount_point == mount_point)
    }
}

/// Decode the octal escapes (`\040` for space) used in the mount table.
fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut rest = field;
    while let Some(pos) = rest.find('\\') {
        out.push_str(rest.get(..pos).unwrap_or_default());
        let code = rest.get(pos + 1..pos + 4);
        match code.and_then(|digits| u8::from_str_radix(digits, 8).ok()) {
            Some(byte) => {
                out.push(char::from(byte));
                rest = rest.get(pos + 4..).unwrap_or_default();
            }
            None => {
                out.push('\\');
                rest = rest.get(pos + 1..).unwrap_or_default();
            }
        }
    }
    out.push_str(rest);
    out
}

/// Bytes per sector in `/sys/class/block/<dev>/size`.
const SECTOR_SIZE: u64 = 512;

const MIB: u64 = 1024 * 1024;

/// Space on the mounted filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaUsage {
    /// Filesystem size.
    pub total_bytes: u64,
    /// Space in use.
    pub used_bytes: u64,
    /// Space available to unprivileged writers.
    pub available_bytes: u64,
}

impl MediaUsage {
    /// Build from `statvfs` style block counts.
    #[must_use]
    pub const fn from_blocks(fragment_size: u64, blocks: u64, free: u64, available: u64) -> Self {
        Self {
            total_bytes: blocks.saturating_mul(fragment_size),
            used_bytes: blocks.saturating_sub(free).saturating_mul(fragment_size),
            available_bytes: available.saturating_mul(fragment_size),
        }
    }

    /// Query the filesystem mounted at `path`.
    ///
    /// # Errors
    ///
    /// Returns the `statvfs` failure.
    // field widths follow the platform's libc types
    #[allow(clippy::useless_conversion)]
    pub fn of(path: &Path) -> io::Result<Self> {
        let stat = statvfs(path).map_err(io::Error::from)?;
        Ok(Self::from_blocks(
            u64::from(stat.fragment_size()),
            u64::from(stat.blocks()),
            u64::from(stat.blocks_free()),
            u64::from(stat.blocks_available()),
        ))
    }
}

/// Raw size of the block device behind `source`, from sysfs.
fn card_size_bytes(source: &str) -> Option<u64> {
    let device = Path::new(source).file_name()?.to_str()?;
    let sectors = fs::read_to_string(format!("/sys/class/block/{device}/size")).ok()?;
    parse_sectors(&sectors)
}

fn parse_sectors(text: &str) -> Option<u64> {
    text.trim().parse::<u64>().ok()?.checked_mul(SECTOR_SIZE)
}

/// A mounted card that accepts frame files.
#[derive(Debug)]
pub struct StorageManager {
    mount_point: PathBuf,
    media: MountEntry,
    usage: Option<MediaUsage>,
}

impl StorageManager {
    /// Attach the volume at `mount_point` and make sure `directory` exists.
    ///
    /// A directory that cannot be created is only logged; the first write
    /// reports the real failure.
    pub fn initialize(
        mount_point: &Path,
        directory: &str,
        mounts: &MountTable,
    ) -> Result<Self, MountError> {
        let mount_failed = |source| MountError::MountFailed {
            path: mount_point.to_path_buf(),
            source,
        };

        let metadata = fs::metadata(mount_point).map_err(mount_failed)?;
        if !metadata.is_dir() {
            return Err(mount_failed(io::Error::other("mount point is not a directory")));
        }
        let canonical = fs::canonicalize(mount_point).map_err(mount_failed)?;

        let media = mounts
            .find(&canonical)
            .or_else(|| mounts.find(mount_point))
            .cloned()
            .ok_or_else(|| MountError::NoMedia(mount_point.to_path_buf()))?;

        info!("Media: {} ({})", media.source, media.fs_type);
        if let Some(size) = card_size_bytes(&media.source) {
            info!("Card size: {}MB", size / MIB);
        }
        let usage = match MediaUsage::of(&canonical) {
            Ok(usage) => {
                info!("Total space: {}MB", usage.total_bytes / MIB);
                info!("Used space: {}MB", usage.used_bytes / MIB);
                Some(usage)
            }
            Err(err) => {
                warn!("Cannot read filesystem usage: {err}");
                None
            }
        };

        let manager = Self {
            mount_point: canonical,
            media,
            usage,
        };
        manager.ensure_directory(directory);
        Ok(manager)
    }

    fn ensure_directory(&self, directory: &str) {
        let path = self.resolve(Path::new(directory));
        if path.is_dir() {
            return;
        }
        match fs::create_dir_all(&path) {
            Ok(()) => info!("Created {directory} directory"),
            Err(err) => warn!("Failed to create {directory} directory: {err}"),
        }
    }

    /// Absolute path of a volume-relative `path`.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let relative: PathBuf = path
            .components()
            .filter(|component| matches!(component, Component::Normal(_)))
            .collect();
        self.mount_point.join(relative)
    }

    /// The attached media.
    #[must_use]
    pub const fn media(&self) -> &MountEntry {
        &self.media
    }

    /// Filesystem usage sampled at mount time.
    #[must_use]
    pub const fn usage(&self) -> Option<MediaUsage> {
        self.usage
    }

    /// Resolved mount point.
    #[must_use]
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }
}

impl FrameStore for StorageManager {
    fn write_file(&mut self, path: &Path, bytes: &[u8]) -> Result<Written, WriteError> {
        let target = self.resolve(path);

        let mut file = File::create(&target).map_err(|source| WriteError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        file.write_all(bytes)
            .and_then(|()| file.sync_all())
            .map_err(|source| WriteError::Write {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Written {
            path: path.to_path_buf(),
            bytes: bytes.len(),
        })
    }

    fn last_sequence(&self, sequencer: &FilenameSequencer) -> Option<u32> {
        let directory = self.resolve(Path::new(sequencer.directory()));
        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Cannot scan {}: {err}", directory.display());
                return None;
            }
        };
        entries
            .filter_map(Result::ok)
            .filter_map(|entry| sequencer.parse(entry.file_name().to_str()?))
            .max()
    }
}
