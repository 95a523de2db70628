//! Counter to filename mapping.

use std::path::PathBuf;

/// Maps a capture counter to `<directory>/<prefix><zero padded counter><suffix>`.
///
/// Padding is a minimum width: past `10^digits - 1` the names grow a digit
/// instead of wrapping, so they stay unique but no longer sort lexically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameSequencer {
    directory: String,
    prefix: String,
    suffix: String,
    digits: usize,
}

impl FilenameSequencer {
    /// Create a sequencer for names under `directory`.
    #[must_use]
    pub fn new(directory: &str, prefix: &str, suffix: &str, digits: usize) -> Self {
        Self {
            directory: directory.trim_end_matches('/').to_owned(),
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
            digits,
        }
    }

    /// Volume-relative path for `counter`.
    #[must_use]
    pub fn next_name(&self, counter: u32) -> PathBuf {
        PathBuf::from(format!("{}/{}", self.directory, self.file_name(counter)))
    }

    /// Bare file name for `counter`.
    #[must_use]
    pub fn file_name(&self, counter: u32) -> String {
        format!(
            "{}{counter:0width$}{}",
            self.prefix,
            self.suffix,
            width = self.digits
        )
    }

    /// Recover the counter from a file name produced by this sequencer.
    #[must_use]
    pub fn parse(&self, file_name: &str) -> Option<u32> {
        let digits = file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        if digits.len() < self.digits || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Directory the names live in.
    #[must_use]
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Number of counters that fit the padded width.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        u32::try_from(self.digits)
            .ok()
            .and_then(|digits| 10u64.checked_pow(digits))
            .unwrap_or(u64::MAX)
    }
}
