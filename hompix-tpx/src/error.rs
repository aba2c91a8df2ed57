//! TPX3-specific error types.

use thiserror::Error;

use crate::packet::RecordKind;

/// Result type for TPX3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort decoding of a capture file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Chunk header magic is wrong or its length is not a multiple of 8.
    #[error("corrupt chunk header at byte {offset}: {reason}")]
    CorruptHeader {
        /// Byte offset of the header.
        offset: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Stream ended inside a chunk header.
    #[error("incomplete chunk header at byte {offset}")]
    TruncatedHeader {
        /// Byte offset of the partial header.
        offset: usize,
    },

    /// Stream ended before the declared chunk length.
    #[error("chunk at byte {offset} declares {declared} bytes but only {available} remain")]
    TruncatedChunk {
        /// Byte offset of the chunk header.
        offset: usize,
        /// Declared body length.
        declared: usize,
        /// Bytes left in the stream.
        available: usize,
    },

    /// Only chip index 0 is supported.
    #[error("chunk at byte {offset} is from chip {chip}; only single-chip data is supported")]
    UnsupportedChip {
        /// Byte offset of the chunk header.
        offset: usize,
        /// Chip index found in the header.
        chip: u8,
    },

    /// A known record kind that the decoder does not handle.
    #[error("record kind {kind} is not implemented (byte {offset})")]
    UnimplementedRecord {
        /// Kind of the record.
        kind: RecordKind,
        /// Byte offset of the record.
        offset: usize,
    },

    /// Top nibble does not name any record kind.
    #[error("unknown record kind {nibble:#x} at byte {offset}")]
    UnknownRecord {
        /// Top nibble of the record.
        nibble: u8,
        /// Byte offset of the record.
        offset: usize,
    },
}

impl Error {
    /// Returns true for failures reported as warnings rather than errors.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::UnimplementedRecord { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_compare_and_classify() {
        let tdc = Error::UnimplementedRecord {
            kind: RecordKind::Tdc,
            offset: 8,
        };
        assert_eq!(tdc.clone(), tdc);
        assert!(tdc.is_warning());

        let chip = Error::UnsupportedChip { offset: 0, chip: 2 };
        assert_ne!(chip, Error::UnsupportedChip { offset: 0, chip: 3 });
        assert!(!chip.is_warning());
        assert!(chip.to_string().contains("chip 2"));
    }
}
