//! Payload row decoding.
//!
//! A payload is a sequence of `code [len] value..` rows. Known single-byte
//! codes carry one value byte, `0x80` carries a big-endian `i16`, and every
//! other code is followed by an explicit length byte. Decoding is
//! all-or-nothing per payload: an under-run discards every row of the frame.

use super::error::PayloadError;
use crate::types::{DataRow, EegPower, EEG_POWER_BANDS};

/// Poor-signal byte.
pub const CODE_SIGNAL_QUALITY: u8 = 0x02;
/// Heart rate byte.
pub const CODE_HEART_RATE: u8 = 0x03;
/// eSense attention.
pub const CODE_ATTENTION: u8 = 0x04;
/// eSense meditation.
pub const CODE_MEDITATION: u8 = 0x05;
/// Blink strength.
pub const CODE_BLINK_STRENGTH: u8 = 0x16;
/// Raw sample, two bytes big-endian signed.
pub const CODE_RAW_VALUE: u8 = 0x80;
/// Hardware EEG band powers, length-prefixed.
pub const CODE_EEG_POWER: u8 = 0x83;

/// Length of a well-formed EEG power value.
pub const EEG_POWER_LEN: usize = EEG_POWER_BANDS * 3;

/// Cursor over a payload that reports under-runs against the row being read.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, code: u8, row_start: usize, n: usize) -> Result<&'a [u8], PayloadError> {
        if self.remaining() < n {
            return Err(PayloadError::Malformed {
                code,
                offset: row_start,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self, code: u8, row_start: usize) -> Result<u8, PayloadError> {
        self.take(code, row_start, 1).map(|s| s[0])
    }
}

/// Decode every row of a validated payload, appending to `rows`.
///
/// On error `rows` is restored to its length on entry.
pub fn decode_into(payload: &[u8], rows: &mut Vec<DataRow>) -> Result<(), PayloadError> {
    let start_len = rows.len();
    let result = decode_rows(payload, rows);
    if result.is_err() {
        rows.truncate(start_len);
    }
    result
}

/// Decode every row of a validated payload.
pub fn decode(payload: &[u8]) -> Result<Vec<DataRow>, PayloadError> {
    let mut rows = Vec::new();
    decode_rows(payload, &mut rows)?;
    Ok(rows)
}

fn decode_rows(payload: &[u8], rows: &mut Vec<DataRow>) -> Result<(), PayloadError> {
    let mut cur = Cursor::new(payload);

    while cur.remaining() > 0 {
        let row_start = cur.pos;
        let code = cur.take_u8(0, row_start)?;

        let row = match code {
            CODE_SIGNAL_QUALITY => DataRow::SignalQuality(cur.take_u8(code, row_start)?),
            CODE_HEART_RATE => DataRow::HeartRate(cur.take_u8(code, row_start)?),
            CODE_ATTENTION => DataRow::Attention(cur.take_u8(code, row_start)?),
            CODE_MEDITATION => DataRow::Meditation(cur.take_u8(code, row_start)?),
            CODE_BLINK_STRENGTH => DataRow::BlinkStrength(cur.take_u8(code, row_start)?),
            CODE_RAW_VALUE => {
                let b = cur.take(code, row_start, 2)?;
                DataRow::RawValue(i16::from_be_bytes([b[0], b[1]]))
            }
            _ => {
                let len = cur.take_u8(code, row_start)?;
                let value = cur.take(code, row_start, len as usize)?;
                if code == CODE_EEG_POWER && value.len() == EEG_POWER_LEN {
                    DataRow::EegPower(decode_eeg_power(value))
                } else {
                    DataRow::Unknown { code, skipped: len }
                }
            }
        };
        rows.push(row);
    }

    Ok(())
}

fn decode_eeg_power(value: &[u8]) -> EegPower {
    let mut bands = [0u32; EEG_POWER_BANDS];
    for (band, chunk) in bands.iter_mut().zip(value.chunks_exact(3)) {
        *band = u32::from_be_bytes([0, chunk[0], chunk[1], chunk[2]]);
    }
    EegPower::from_array(bands)
}
