//! Core data types for decoded TGAM samples
//!
//! This module defines the values produced by the payload decoder and routed
//! to the sinks:
//!
//! - [`DataRow`] - One typed value extracted from a frame payload
//! - [`DecodedSample`] - A row stamped with its session-wide sequence index
//! - [`EegPower`] - The eight hardware band powers reported by the headset
//! - [`SignalQualityLevel`] - Human-readable grading of the poor-signal byte

use serde::{Deserialize, Serialize};
use std::fmt;

/// Microvolts per raw ADC count.
pub const MICROVOLTS_PER_COUNT: f64 = 0.516;

/// Convert a raw sample count to microvolts.
pub fn raw_to_microvolts(raw: i16) -> f64 {
    raw as f64 * MICROVOLTS_PER_COUNT
}

/// Number of hardware EEG power bands.
pub const EEG_POWER_BANDS: usize = 8;

/// Hardware-computed EEG band powers (24-bit unsigned each).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EegPower {
    pub delta: u32,
    pub theta: u32,
    pub low_alpha: u32,
    pub high_alpha: u32,
    pub low_beta: u32,
    pub high_beta: u32,
    pub low_gamma: u32,
    pub mid_gamma: u32,
}

impl EegPower {
    /// Band labels in wire order.
    pub const BAND_NAMES: [&'static str; EEG_POWER_BANDS] = [
        "delta",
        "theta",
        "low_alpha",
        "high_alpha",
        "low_beta",
        "high_beta",
        "low_gamma",
        "mid_gamma",
    ];

    pub fn from_array(values: [u32; EEG_POWER_BANDS]) -> Self {
        Self {
            delta: values[0],
            theta: values[1],
            low_alpha: values[2],
            high_alpha: values[3],
            low_beta: values[4],
            high_beta: values[5],
            low_gamma: values[6],
            mid_gamma: values[7],
        }
    }

    pub fn as_array(&self) -> [u32; EEG_POWER_BANDS] {
        [
            self.delta,
            self.theta,
            self.low_alpha,
            self.high_alpha,
            self.low_beta,
            self.high_beta,
            self.low_gamma,
            self.mid_gamma,
        ]
    }

    pub fn total(&self) -> u64 {
        self.as_array().iter().map(|&v| v as u64).sum()
    }

    /// Each band as a fraction of the total; all zero when the total is zero.
    pub fn relative(&self) -> [f64; EEG_POWER_BANDS] {
        let total = self.total();
        let mut out = [0.0; EEG_POWER_BANDS];
        if total == 0 {
            return out;
        }
        for (slot, value) in out.iter_mut().zip(self.as_array()) {
            *slot = value as f64 / total as f64;
        }
        out
    }
}

/// One typed value decoded from a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DataRow {
    /// Raw EEG sample (signed ADC count).
    RawValue(i16),
    /// Poor-signal indicator, 0 is best.
    SignalQuality(u8),
    /// eSense attention, nominally 0..=100.
    Attention(u8),
    /// eSense meditation, nominally 0..=100.
    Meditation(u8),
    HeartRate(u8),
    BlinkStrength(u8),
    EegPower(EegPower),
    /// Tolerated code whose value bytes were skipped.
    Unknown { code: u8, skipped: u8 },
}

impl DataRow {
    /// Short identifier used in record formats and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DataRow::RawValue(_) => "raw",
            DataRow::SignalQuality(_) => "signal_quality",
            DataRow::Attention(_) => "attention",
            DataRow::Meditation(_) => "meditation",
            DataRow::HeartRate(_) => "heart_rate",
            DataRow::BlinkStrength(_) => "blink_strength",
            DataRow::EegPower(_) => "eeg_power",
            DataRow::Unknown { .. } => "unknown",
        }
    }

    /// Scalar value of the row, if it has one.
    pub fn numeric_value(&self) -> Option<i64> {
        match *self {
            DataRow::RawValue(v) => Some(v as i64),
            DataRow::SignalQuality(v)
            | DataRow::Attention(v)
            | DataRow::Meditation(v)
            | DataRow::HeartRate(v)
            | DataRow::BlinkStrength(v) => Some(v as i64),
            DataRow::EegPower(_) | DataRow::Unknown { .. } => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, DataRow::RawValue(_))
    }
}

impl fmt::Display for DataRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataRow::RawValue(v) => write!(f, "RawValue({})", v),
            DataRow::SignalQuality(v) => write!(f, "SignalQuality({})", v),
            DataRow::Attention(v) => write!(f, "Attention({})", v),
            DataRow::Meditation(v) => write!(f, "Meditation({})", v),
            DataRow::HeartRate(v) => write!(f, "HeartRate({})", v),
            DataRow::BlinkStrength(v) => write!(f, "BlinkStrength({})", v),
            DataRow::EegPower(p) => write!(f, "EegPower(total={})", p.total()),
            DataRow::Unknown { code, skipped } => {
                write!(f, "Unknown(0x{:02X}, {} bytes)", code, skipped)
            }
        }
    }
}

/// A routed row with its position in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedSample {
    pub sequence_index: u64,
    pub row: DataRow,
}

impl DecodedSample {
    pub fn new(sequence_index: u64, row: DataRow) -> Self {
        Self {
            sequence_index,
            row,
        }
    }
}

/// Grading of the poor-signal byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalQualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    Unusable,
}

impl SignalQualityLevel {
    pub fn from_quality(quality: u8) -> Self {
        match quality {
            0..=9 => SignalQualityLevel::Excellent,
            10..=19 => SignalQualityLevel::Good,
            20..=39 => SignalQualityLevel::Fair,
            40..=69 => SignalQualityLevel::Poor,
            _ => SignalQualityLevel::Unusable,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SignalQualityLevel::Excellent => "Excellent",
            SignalQualityLevel::Good => "Good",
            SignalQualityLevel::Fair => "Fair",
            SignalQualityLevel::Poor => "Poor",
            SignalQualityLevel::Unusable => "Unusable",
        }
    }
}

impl fmt::Display for SignalQualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// State of the byte link as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkStatus {
    #[default]
    Idle,
    Streaming,
    /// Source reported end of stream or the session was closed.
    Closed,
    /// A read failed; the session is terminating.
    Failed,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Idle => write!(f, "Idle"),
            LinkStatus::Streaming => write!(f, "Streaming"),
            LinkStatus::Closed => write!(f, "Closed"),
            LinkStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_to_microvolts() {
        assert_eq!(raw_to_microvolts(0), 0.0);
        assert!((raw_to_microvolts(1000) - 516.0).abs() < 1e-9);
        assert!((raw_to_microvolts(-100) + 51.6).abs() < 1e-9);
    }

    #[test]
    fn test_eeg_power_relative() {
        let power = EegPower::from_array([1, 1, 2, 0, 0, 0, 0, 0]);
        assert_eq!(power.total(), 4);
        let rel = power.relative();
        assert_eq!(rel[0], 0.25);
        assert_eq!(rel[2], 0.5);
        assert_eq!(rel[7], 0.0);

        assert_eq!(EegPower::default().relative(), [0.0; EEG_POWER_BANDS]);
    }

    #[test]
    fn test_eeg_power_array_roundtrip_order() {
        let values = [1, 2, 3, 4, 5, 6, 7, 8];
        let power = EegPower::from_array(values);
        assert_eq!(power.theta, 2);
        assert_eq!(power.mid_gamma, 8);
        assert_eq!(power.as_array(), values);
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(DataRow::RawValue(-5).numeric_value(), Some(-5));
        assert_eq!(DataRow::Attention(55).numeric_value(), Some(55));
        assert_eq!(DataRow::EegPower(EegPower::default()).numeric_value(), None);
        assert_eq!(
            DataRow::Unknown {
                code: 0x90,
                skipped: 3
            }
            .numeric_value(),
            None
        );
    }

    #[test]
    fn test_signal_quality_levels() {
        assert_eq!(SignalQualityLevel::from_quality(0), SignalQualityLevel::Excellent);
        assert_eq!(SignalQualityLevel::from_quality(10), SignalQualityLevel::Good);
        assert_eq!(SignalQualityLevel::from_quality(39), SignalQualityLevel::Fair);
        assert_eq!(SignalQualityLevel::from_quality(69), SignalQualityLevel::Poor);
        assert_eq!(SignalQualityLevel::from_quality(200), SignalQualityLevel::Unusable);
    }

    #[test]
    fn test_data_row_serde_shape() {
        let json = serde_json::to_string(&DataRow::Attention(55)).unwrap();
        assert_eq!(json, r#"{"kind":"attention","value":55}"#);
    }
}
