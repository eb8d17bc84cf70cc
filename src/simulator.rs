//! Synthetic TGAM byte stream.
//!
//! Emits one raw-sample frame per tick and, after every
//! [`RAW_FRAMES_PER_SUMMARY`] raw frames, one summary frame carrying signal
//! quality, EEG band powers, attention and meditation. The stream is seeded,
//! so the same seed always yields the same bytes.
//!
//! [`TgamSimulator`] implements [`Read`], which makes it a byte source for a
//! session or something to write to a file.

use crate::protocol::frame;
use crate::protocol::payload::{
    CODE_ATTENTION, CODE_EEG_POWER, CODE_MEDITATION, CODE_RAW_VALUE, CODE_SIGNAL_QUALITY,
    EEG_POWER_LEN,
};
use crate::types::EEG_POWER_BANDS;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, Read};
use std::time::{Duration, Instant};

/// Raw frames between two summary frames.
pub const RAW_FRAMES_PER_SUMMARY: u64 = 512;

/// Real-time spacing of raw frames (512 Hz).
pub const RAW_FRAME_PERIOD: Duration = Duration::from_nanos(1_000_000_000 / 512);

/// Seeded TGAM stream generator.
pub struct TgamSimulator {
    rng: StdRng,
    pending: Vec<u8>,
    cursor: usize,
    frames_emitted: u64,
    raw_frames: u64,
    raw_in_cycle: u64,
    frame_limit: Option<u64>,
    corrupt_every: Option<u64>,
    corrupted: u64,
    paced_from: Option<Instant>,
}

impl TgamSimulator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            pending: Vec::with_capacity(64),
            cursor: 0,
            frames_emitted: 0,
            raw_frames: 0,
            raw_in_cycle: 0,
            frame_limit: None,
            corrupt_every: None,
            corrupted: 0,
            paced_from: None,
        }
    }

    /// End the stream after `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Flip one checksum bit of every `n`th frame.
    pub fn with_corruption(mut self, every: u64) -> Self {
        self.corrupt_every = (every > 0).then_some(every);
        self
    }

    /// Release raw frames no faster than the device would (512 per second).
    pub fn paced(mut self) -> Self {
        self.paced_from = Some(Instant::now());
        self
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Frames emitted with a deliberately wrong checksum.
    pub fn corrupted(&self) -> u64 {
        self.corrupted
    }

    /// Generate the next frame into `pending`. Returns `false` at the limit.
    fn next_frame(&mut self) -> bool {
        if self.frame_limit.is_some_and(|limit| self.frames_emitted >= limit) {
            return false;
        }

        self.pending.clear();
        self.cursor = 0;

        let payload = if self.raw_in_cycle == RAW_FRAMES_PER_SUMMARY {
            self.raw_in_cycle = 0;
            self.summary_payload()
        } else {
            self.wait_for_slot();
            self.raw_in_cycle += 1;
            self.raw_frames += 1;
            self.raw_payload()
        };
        // Payloads here are far below the frame limit.
        frame::encode_into(&payload, &mut self.pending);

        self.frames_emitted += 1;
        if let Some(every) = self.corrupt_every {
            if self.frames_emitted % every == 0 {
                if let Some(checksum) = self.pending.last_mut() {
                    *checksum ^= 0x01;
                    self.corrupted += 1;
                }
            }
        }
        true
    }

    fn raw_payload(&mut self) -> Vec<u8> {
        let value: i16 = self.rng.gen_range(-2048..=2047);
        let [hi, lo] = value.to_be_bytes();
        vec![CODE_RAW_VALUE, hi, lo]
    }

    fn summary_payload(&mut self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(8 + EEG_POWER_LEN);
        payload.extend_from_slice(&[CODE_SIGNAL_QUALITY, self.rng.gen_range(0..=200)]);
        payload.extend_from_slice(&[CODE_EEG_POWER, EEG_POWER_LEN as u8]);
        for _ in 0..EEG_POWER_BANDS {
            let power: u32 = self.rng.gen_range(1_000..=100_000);
            payload.extend_from_slice(&power.to_be_bytes()[1..]);
        }
        payload.extend_from_slice(&[CODE_ATTENTION, self.rng.gen_range(0..=100)]);
        payload.extend_from_slice(&[CODE_MEDITATION, self.rng.gen_range(0..=100)]);
        payload
    }

    fn wait_for_slot(&self) {
        let Some(start) = self.paced_from else {
            return;
        };
        let due = start + frame_offset(self.raw_frames);
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

/// Time from the start of a paced stream until raw frame `frames` is due.
fn frame_offset(frames: u64) -> Duration {
    let nanos = RAW_FRAME_PERIOD.as_nanos() * frames as u128;
    Duration::new(
        (nanos / 1_000_000_000) as u64,
        (nanos % 1_000_000_000) as u32,
    )
}

impl Read for TgamSimulator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            if self.cursor < self.pending.len() {
                let n = (self.pending.len() - self.cursor).min(buf.len() - written);
                buf[written..written + n]
                    .copy_from_slice(&self.pending[self.cursor..self.cursor + n]);
                self.cursor += n;
                written += n;
                continue;
            }
            // Paced streams hand over what they have instead of sleeping
            // through a whole buffer.
            if self.paced_from.is_some() && written > 0 {
                break;
            }
            if !self.next_frame() {
                break;
            }
        }
        Ok(written)
    }
}
