//! TGAM frame checksum.
//!
//! The checksum byte is the low byte of the payload sum, bitwise inverted.

/// Compute the checksum byte the sender should have appended to `payload`.
#[inline]
pub fn compute(payload: &[u8]) -> u8 {
    let sum = payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    !sum
}

/// Check an observed checksum byte against `payload`.
#[inline]
pub fn validate(payload: &[u8], checksum: u8) -> bool {
    compute(payload) == checksum
}

/// Incremental checksum accumulator, fed one payload byte at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChecksumAccumulator {
    sum: u8,
}

impl ChecksumAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.sum = self.sum.wrapping_add(byte);
    }

    #[inline]
    pub fn reset(&mut self) {
        self.sum = 0;
    }

    /// The checksum byte for everything pushed so far.
    #[inline]
    pub fn finish(&self) -> u8 {
        !self.sum
    }

    #[inline]
    pub fn matches(&self, checksum: u8) -> bool {
        self.finish() == checksum
    }
}
