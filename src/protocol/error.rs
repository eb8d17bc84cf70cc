//! Protocol-level error types.
//!
//! Every variant here is recoverable: the decoder drops the affected frame and
//! keeps scanning. They are surfaced only through counters and debug logs.

use thiserror::Error;

/// A framing attempt that did not produce a valid frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Trailing checksum byte disagrees with the payload sum.
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Length byte exceeds the protocol maximum.
    #[error("Frame too long: length byte {length} exceeds {max}", max = super::MAX_PAYLOAD_LEN)]
    FrameTooLong { length: u8 },
}

/// A checksum-valid payload whose rows could not be interpreted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// A row declared more bytes than the payload has left.
    #[error(
        "Malformed payload: code 0x{code:02X} at offset {offset} needs {needed} bytes, {remaining} remaining"
    )]
    Malformed {
        code: u8,
        offset: usize,
        needed: usize,
        remaining: usize,
    },
}
