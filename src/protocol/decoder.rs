//! Stream decoder: frame synchronizer and payload decoder composed.
//!
//! `StreamDecoder` is plain state. Feeding it the same bytes always yields the
//! same rows regardless of chunking, and it never touches I/O.

use super::error::{FrameError, PayloadError};
use super::framer::FrameSynchronizer;
use super::payload;
use crate::types::DataRow;
use serde::{Deserialize, Serialize};

/// Counters for everything the decoder has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderStats {
    /// Bytes fed in.
    pub bytes_in: u64,
    /// Frames that passed checksum and payload decoding.
    pub frames_decoded: u64,
    pub checksum_mismatches: u64,
    pub frames_too_long: u64,
    pub malformed_payloads: u64,
    /// Rows produced (including unknown rows).
    pub rows_decoded: u64,
    pub unknown_rows: u64,
    /// Partial frames dropped by [`StreamDecoder::finish`].
    pub partial_frames_discarded: u64,
}

impl DecoderStats {
    /// Framing attempts that were dropped for any reason.
    pub fn frames_dropped(&self) -> u64 {
        self.checksum_mismatches + self.frames_too_long + self.malformed_payloads
    }
}

/// Why a frame contributed no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DroppedFrame {
    Frame(FrameError),
    Payload(PayloadError),
}

impl std::fmt::Display for DroppedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DroppedFrame::Frame(e) => write!(f, "{}", e),
            DroppedFrame::Payload(e) => write!(f, "{}", e),
        }
    }
}

/// Incremental TGAM stream decoder.
#[derive(Debug, Clone, Default)]
pub struct StreamDecoder {
    sync: FrameSynchronizer,
    stats: DecoderStats,
    last_drop: Option<DroppedFrame>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    /// The most recent reason a frame was dropped, if any.
    pub fn last_drop(&self) -> Option<DroppedFrame> {
        self.last_drop
    }

    /// Whether a partial frame is being held across chunks.
    pub fn is_mid_frame(&self) -> bool {
        self.sync.state().is_mid_frame()
    }

    /// Feed a chunk, calling `on_frame` once per decoded frame with its rows.
    ///
    /// Dropped frames never reach `on_frame`.
    pub fn feed_frames<F>(&mut self, bytes: &[u8], mut on_frame: F)
    where
        F: FnMut(&[DataRow]),
    {
        self.stats.bytes_in += bytes.len() as u64;
        let mut rows = Vec::new();

        for &byte in bytes {
            let Some(result) = self.sync.push_byte(byte) else {
                continue;
            };

            let frame = match result {
                Ok(frame) => frame,
                Err(err) => {
                    match err {
                        FrameError::ChecksumMismatch { .. } => self.stats.checksum_mismatches += 1,
                        FrameError::FrameTooLong { .. } => self.stats.frames_too_long += 1,
                    }
                    tracing::debug!(error = %err, "Dropped frame");
                    self.last_drop = Some(DroppedFrame::Frame(err));
                    continue;
                }
            };

            rows.clear();
            match payload::decode_into(frame.payload(), &mut rows) {
                Ok(()) => {
                    self.stats.frames_decoded += 1;
                    self.stats.rows_decoded += rows.len() as u64;
                    self.stats.unknown_rows += rows
                        .iter()
                        .filter(|r| matches!(r, DataRow::Unknown { .. }))
                        .count() as u64;
                    on_frame(&rows);
                }
                Err(err) => {
                    self.stats.malformed_payloads += 1;
                    tracing::debug!(error = %err, "Dropped frame with malformed payload");
                    self.last_drop = Some(DroppedFrame::Payload(err));
                }
            }
        }
    }

    /// Feed a chunk and return every decoded row in stream order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<DataRow> {
        let mut out = Vec::new();
        self.feed_frames(bytes, |rows| out.extend_from_slice(rows));
        out
    }

    /// End of stream: discard any partial frame.
    ///
    /// Returns `true` if a partial frame was dropped.
    pub fn finish(&mut self) -> bool {
        let partial = self.is_mid_frame();
        if partial {
            self.stats.partial_frames_discarded += 1;
            tracing::debug!(
                buffered = self.sync.buffered(),
                "Discarding partial frame at end of stream"
            );
        }
        self.sync.reset();
        partial
    }
}
