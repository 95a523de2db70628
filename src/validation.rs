//! Checks on captured and stored frames.
//!
//! Used by the test suites to assert that every file written to the card is a
//! standalone JPEG and that saved sequence numbers have no gaps.

use crate::error::ValidationError;

/// Start-of-image marker.
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
/// End-of-image marker.
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Validates that `bytes` is a complete baseline JPEG.
///
/// Some MJPG drivers pad the buffer after the end marker, so trailing zero
/// bytes are ignored.
///
/// # Errors
///
/// Returns the first marker that is missing, or `TooShort` when the payload
/// cannot hold both markers.
pub fn validate_jpeg(bytes: &[u8]) -> Result<(), ValidationError> {
    if bytes.len() < JPEG_SOI.len() + JPEG_EOI.len() {
        return Err(ValidationError::TooShort(bytes.len()));
    }
    if !bytes.starts_with(&JPEG_SOI) {
        return Err(ValidationError::MissingSoi);
    }

    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    let trimmed = bytes.get(..end).unwrap_or_default();
    if trimmed.len() < JPEG_SOI.len() + JPEG_EOI.len() || !trimmed.ends_with(&JPEG_EOI) {
        return Err(ValidationError::MissingEoi);
    }
    Ok(())
}

/// Validates that `numbers` increment by exactly one.
///
/// # Errors
///
/// Returns `EmptySequence` for an empty slice, or `SequenceGap` at the first
/// number that does not follow its predecessor.
pub fn validate_sequence(numbers: &[u32]) -> Result<(), ValidationError> {
    let Some(&first) = numbers.first() else {
        return Err(ValidationError::EmptySequence);
    };

    let mut expected = first;
    for (index, &actual) in numbers.iter().enumerate().skip(1) {
        expected = expected.saturating_add(1);
        if actual != expected {
            return Err(ValidationError::SequenceGap {
                index,
                expected,
                actual,
            });
        }
    }
    Ok(())
}
