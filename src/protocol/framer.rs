//! Byte-driven frame synchronizer.
//!
//! Turns an arbitrarily chunked byte stream into framing attempts. State is
//! carried across calls, so the sequence of produced frames does not depend on
//! how the caller splits its input.
//!
//! ```text
//! WaitSync1 --AA--> WaitSync2 --AA--> WaitLength --L<=170--> ReadPayload --L bytes--> ReadChecksum
//!     ^                 |               |  ^  (AA absorbed)                                |
//!     +----- other -----+               |  +--+                                            |
//!     +------------ L>170: FrameTooLong-+                                                  |
//!     +-------------------------- frame emitted / ChecksumMismatch ------------------------+
//! ```

use super::checksum::ChecksumAccumulator;
use super::error::FrameError;
use super::frame::Frame;
use super::{MAX_PAYLOAD_LEN, SYNC_BYTE};

/// Synchronizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Scanning for the first sync byte.
    #[default]
    WaitSync1,
    /// One sync byte seen.
    WaitSync2,
    /// Both sync bytes seen; extra sync bytes are absorbed here.
    WaitLength,
    /// Accumulating payload bytes.
    ReadPayload,
    /// Waiting for the trailing checksum byte.
    ReadChecksum,
}

impl SyncState {
    /// Whether bytes of a frame in progress are currently held.
    pub fn is_mid_frame(&self) -> bool {
        !matches!(self, SyncState::WaitSync1)
    }
}

/// Outcome of one framing attempt.
pub type FrameResult = std::result::Result<Frame, FrameError>;

/// Incremental TGAM frame synchronizer.
#[derive(Debug, Clone)]
pub struct FrameSynchronizer {
    state: SyncState,
    expected_len: usize,
    payload: Vec<u8>,
    sum: ChecksumAccumulator,
}

impl Default for FrameSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSynchronizer {
    pub fn new() -> Self {
        Self {
            state: SyncState::WaitSync1,
            expected_len: 0,
            payload: Vec::with_capacity(MAX_PAYLOAD_LEN as usize),
            sum: ChecksumAccumulator::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Number of payload bytes accumulated for the frame in progress.
    pub fn buffered(&self) -> usize {
        self.payload.len()
    }

    /// Drop any partial frame and return to scanning.
    pub fn reset(&mut self) {
        self.state = SyncState::WaitSync1;
        self.expected_len = 0;
        self.payload.clear();
        self.sum.reset();
    }

    /// Advance by one byte. Returns the outcome if this byte ended an attempt.
    pub fn push_byte(&mut self, byte: u8) -> Option<FrameResult> {
        match self.state {
            SyncState::WaitSync1 => {
                if byte == SYNC_BYTE {
                    self.state = SyncState::WaitSync2;
                }
                None
            }
            SyncState::WaitSync2 => {
                self.state = if byte == SYNC_BYTE {
                    SyncState::WaitLength
                } else {
                    SyncState::WaitSync1
                };
                None
            }
            SyncState::WaitLength => {
                if byte == SYNC_BYTE {
                    return None;
                }
                if byte > MAX_PAYLOAD_LEN {
                    self.reset();
                    return Some(Err(FrameError::FrameTooLong { length: byte }));
                }
                self.expected_len = byte as usize;
                self.payload.clear();
                self.sum.reset();
                self.state = if self.expected_len == 0 {
                    SyncState::ReadChecksum
                } else {
                    SyncState::ReadPayload
                };
                None
            }
            SyncState::ReadPayload => {
                self.payload.push(byte);
                self.sum.push(byte);
                if self.payload.len() == self.expected_len {
                    self.state = SyncState::ReadChecksum;
                }
                None
            }
            SyncState::ReadChecksum => {
                let expected = self.sum.finish();
                let result = if expected == byte {
                    let payload = std::mem::replace(
                        &mut self.payload,
                        Vec::with_capacity(MAX_PAYLOAD_LEN as usize),
                    );
                    Ok(Frame::new_unchecked(payload, byte))
                } else {
                    Err(FrameError::ChecksumMismatch {
                        expected,
                        actual: byte,
                    })
                };
                self.reset();
                Some(result)
            }
        }
    }

    /// Feed a chunk, calling `on_result` for every finished attempt in order.
    pub fn feed_with<F>(&mut self, bytes: &[u8], mut on_result: F)
    where
        F: FnMut(FrameResult),
    {
        for &byte in bytes {
            if let Some(result) = self.push_byte(byte) {
                on_result(result);
            }
        }
    }

    /// Feed a chunk and collect every finished attempt.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FrameResult> {
        let mut results = Vec::new();
        self.feed_with(bytes, |r| results.push(r));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::encode;

    fn frames_only(results: Vec<FrameResult>) -> Vec<Vec<u8>> {
        results
            .into_iter()
            .filter_map(|r| r.ok())
            .map(|f| f.into_payload())
            .collect()
    }

    #[test]
    fn test_single_frame() {
        let mut sync = FrameSynchronizer::new();
        let results = sync.feed(&[0xAA, 0xAA, 0x03, 0x80, 0x03, 0xE8, 0x94]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap().payload(), &[0x80, 0x03, 0xE8]);
        assert_eq!(sync.state(), SyncState::WaitSync1);
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut sync = FrameSynchronizer::new();
        let results = sync.feed(&[0xAA, 0xAA, 0x00, 0xFF]);
        assert_eq!(results.len(), 1);
        assert!(results[0].as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_byte_at_a_time_keeps_state() {
        let bytes = encode(&[0x02, 0x00, 0x04, 0x37]).unwrap();
        let mut sync = FrameSynchronizer::new();
        for (i, &b) in bytes.iter().enumerate() {
            let out = sync.push_byte(b);
            if i + 1 < bytes.len() {
                assert!(out.is_none());
                assert!(sync.state().is_mid_frame());
            } else {
                assert!(out.unwrap().is_ok());
            }
        }
    }

    #[test]
    fn test_checksum_mismatch_resyncs() {
        let mut bytes = encode(&[0x80, 0x00, 0x01]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        bytes.extend(encode(&[0x04, 0x20]).unwrap());

        let mut sync = FrameSynchronizer::new();
        let results = sync.feed(&bytes);
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(FrameError::ChecksumMismatch { .. })
        ));
        assert_eq!(results[1].as_ref().unwrap().payload(), &[0x04, 0x20]);
    }

    #[test]
    fn test_frame_too_long() {
        let mut sync = FrameSynchronizer::new();
        let results = sync.feed(&[0xAA, 0xAA, 171]);
        assert_eq!(results, vec![Err(FrameError::FrameTooLong { length: 171 })]);
        assert_eq!(sync.state(), SyncState::WaitSync1);
    }

    #[test]
    fn test_repeated_sync_bytes_absorbed() {
        let mut bytes = vec![0xAA, 0xAA, 0xAA, 0xAA];
        bytes.extend(&encode(&[0x05, 0x10]).unwrap()[2..]);
        let mut sync = FrameSynchronizer::new();
        assert_eq!(frames_only(sync.feed(&bytes)), vec![vec![0x05, 0x10]]);
    }

    #[test]
    fn test_isolated_sync_byte_is_discarded() {
        let mut bytes = vec![0xAA, 0x03, 0x01, 0x02];
        bytes.extend(encode(&[0x16, 0x40]).unwrap());
        let mut sync = FrameSynchronizer::new();
        let results = sync.feed(&bytes);
        assert_eq!(frames_only(results), vec![vec![0x16, 0x40]]);
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let bytes = encode(&[0x80, 0x01, 0x02]).unwrap();
        let mut sync = FrameSynchronizer::new();
        assert!(sync.feed(&bytes[..4]).is_empty());
        assert_eq!(sync.buffered(), 1);

        sync.reset();
        assert_eq!(sync.state(), SyncState::WaitSync1);
        assert_eq!(sync.buffered(), 0);
        assert!(sync.feed(&bytes[4..]).is_empty());
    }

    #[test]
    fn test_payload_may_contain_sync_bytes() {
        let payload = [0x80, 0xAA, 0xAA];
        let bytes = encode(&payload).unwrap();
        let mut sync = FrameSynchronizer::new();
        assert_eq!(frames_only(sync.feed(&bytes)), vec![payload.to_vec()]);
    }
}
