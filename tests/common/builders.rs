//! Test data builders for payloads and wire frames

use tgam_link::protocol::{checksum, payload, SYNC_BYTE};
use tgam_link::{DataRow, EegPower};

/// Builder for a payload, row by row
#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    bytes: Vec<u8>,
    rows: Vec<DataRow>,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(self, value: i16) -> Self {
        let [hi, lo] = value.to_be_bytes();
        self.push(&[payload::CODE_RAW_VALUE, hi, lo], DataRow::RawValue(value))
    }

    pub fn signal_quality(self, value: u8) -> Self {
        self.push(&[payload::CODE_SIGNAL_QUALITY, value], DataRow::SignalQuality(value))
    }

    pub fn attention(self, value: u8) -> Self {
        self.push(&[payload::CODE_ATTENTION, value], DataRow::Attention(value))
    }

    pub fn meditation(self, value: u8) -> Self {
        self.push(&[payload::CODE_MEDITATION, value], DataRow::Meditation(value))
    }

    pub fn heart_rate(self, value: u8) -> Self {
        self.push(&[payload::CODE_HEART_RATE, value], DataRow::HeartRate(value))
    }

    pub fn blink(self, value: u8) -> Self {
        self.push(&[payload::CODE_BLINK_STRENGTH, value], DataRow::BlinkStrength(value))
    }

    /// Eight 24-bit band powers; values are masked to 24 bits.
    pub fn eeg_power(self, bands: [u32; 8]) -> Self {
        let bands = bands.map(|b| b & 0x00FF_FFFF);
        let mut bytes = vec![payload::CODE_EEG_POWER, payload::EEG_POWER_LEN as u8];
        for band in bands {
            bytes.extend_from_slice(&band.to_be_bytes()[1..]);
        }
        self.push(&bytes, DataRow::EegPower(EegPower::from_array(bands)))
    }

    /// A length-prefixed row the decoder does not interpret.
    pub fn unknown(self, code: u8, value: &[u8]) -> Self {
        let mut bytes = vec![code, value.len() as u8];
        bytes.extend_from_slice(value);
        self.push(
            &bytes,
            DataRow::Unknown {
                code,
                skipped: value.len() as u8,
            },
        )
    }

    /// Concatenate another payload after this one.
    pub fn append(mut self, other: &PayloadBuilder) -> Self {
        self.bytes.extend_from_slice(&other.bytes);
        self.rows.extend_from_slice(&other.rows);
        self
    }

    fn push(mut self, bytes: &[u8], row: DataRow) -> Self {
        self.bytes.extend_from_slice(bytes);
        self.rows.push(row);
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Rows the payload should decode to
    pub fn expected_rows(&self) -> &[DataRow] {
        &self.rows
    }

    pub fn frame(&self) -> Vec<u8> {
        frame_bytes(&self.bytes)
    }
}

/// Wire bytes for `payload`, without any length check
pub fn frame_bytes(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![SYNC_BYTE, SYNC_BYTE, payload.len() as u8];
    out.extend_from_slice(payload);
    out.push(checksum::compute(payload));
    out
}

/// Wire bytes for `payload` with a deliberately wrong checksum
pub fn corrupted_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = frame_bytes(payload);
    if let Some(last) = out.last_mut() {
        *last ^= 0xFF;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_builder() {
        let payload = PayloadBuilder::new().raw(1000).attention(55);
        assert_eq!(payload.bytes(), &[0x80, 0x03, 0xE8, 0x04, 0x37]);
        assert_eq!(
            payload.expected_rows(),
            &[DataRow::RawValue(1000), DataRow::Attention(55)]
        );
    }
}
