//! Error types for the Mini-ELF loader and simulator.
//!
//! This module defines all load-time error types. Runtime faults (bad
//! addresses, illegal opcodes) are not errors in this sense: they are
//! recorded in the CPU status word and terminate the execution loop.

use thiserror::Error;

/// Primary error type for loading a Mini-ELF container.
#[derive(Debug, Error)]
pub enum SimError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is too small to contain a Mini-ELF header.
    #[error("File too small: expected at least {expected} bytes, got {actual}")]
    FileTooSmall { expected: usize, actual: usize },

    /// Invalid magic bytes in the header or a program header.
    #[error("Invalid magic bytes: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    /// Truncated data when reading.
    #[error("Truncated data at offset {offset}: expected {expected} bytes, got {actual}")]
    TruncatedData {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// A segment does not fit inside the virtual address space.
    #[error("Segment out of bounds: vaddr 0x{vaddr:04x}, size 0x{size:x}")]
    SegmentOutOfBounds { vaddr: u32, size: u32 },
}

/// Result type alias for loader operations.
pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::FileTooSmall {
            expected: 16,
            actual: 4,
        };
        assert!(err.to_string().contains("16"));
        assert!(err.to_string().contains("4"));
    }

    #[test]
    fn test_segment_out_of_bounds() {
        let err = SimError::SegmentOutOfBounds {
            vaddr: 0xFFF0,
            size: 0x100,
        };
        let msg = err.to_string();
        assert!(msg.contains("0xfff0"));
        assert!(msg.contains("0x100"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = SimError::from(io);
        assert!(matches!(err, SimError::Io(_)));
    }
}
