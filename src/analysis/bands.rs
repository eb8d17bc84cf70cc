//! EEG frequency band powers.

use super::fft::{SpectrumAnalyzer, SpectrumConfig};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fewest raw samples worth analysing.
pub const MIN_ANALYSIS_SAMPLES: usize = 64;

/// Conventional EEG bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EegBand {
    Delta,
    Theta,
    LowAlpha,
    HighAlpha,
    LowBeta,
    HighBeta,
    LowGamma,
    HighGamma,
}

impl EegBand {
    pub const ALL: [EegBand; 8] = [
        EegBand::Delta,
        EegBand::Theta,
        EegBand::LowAlpha,
        EegBand::HighAlpha,
        EegBand::LowBeta,
        EegBand::HighBeta,
        EegBand::LowGamma,
        EegBand::HighGamma,
    ];

    /// `[low, high)` edges in Hz.
    pub fn range(&self) -> (f64, f64) {
        match self {
            EegBand::Delta => (0.5, 4.0),
            EegBand::Theta => (4.0, 8.0),
            EegBand::LowAlpha => (8.0, 10.0),
            EegBand::HighAlpha => (10.0, 13.0),
            EegBand::LowBeta => (13.0, 20.0),
            EegBand::HighBeta => (20.0, 30.0),
            EegBand::LowGamma => (30.0, 50.0),
            EegBand::HighGamma => (50.0, 100.0),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EegBand::Delta => "Delta",
            EegBand::Theta => "Theta",
            EegBand::LowAlpha => "Low Alpha",
            EegBand::HighAlpha => "High Alpha",
            EegBand::LowBeta => "Low Beta",
            EegBand::HighBeta => "High Beta",
            EegBand::LowGamma => "Low Gamma",
            EegBand::HighGamma => "High Gamma",
        }
    }
}

impl fmt::Display for EegBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Integrated power per band, indexed like [`EegBand::ALL`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandPowers {
    pub absolute: [f64; 8],
    pub relative: [f64; 8],
}

impl BandPowers {
    fn from_absolute(absolute: [f64; 8]) -> Self {
        let total: f64 = absolute.iter().sum();
        let mut relative = [0.0; 8];
        if total > 0.0 {
            for (r, a) in relative.iter_mut().zip(absolute.iter()) {
                *r = a / total;
            }
        }
        Self { absolute, relative }
    }

    pub fn get(&self, band: EegBand) -> f64 {
        self.absolute[band as usize]
    }

    pub fn relative_of(&self, band: EegBand) -> f64 {
        self.relative[band as usize]
    }

    /// Band holding the most power, if any power was measured.
    pub fn dominant(&self) -> Option<EegBand> {
        let (idx, &max) = self
            .absolute
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))?;
        (max > 0.0).then_some(EegBand::ALL[idx])
    }
}

/// Computes [`BandPowers`] from a raw sample window.
pub struct BandAnalyzer {
    spectrum: SpectrumAnalyzer,
    sample_rate: f64,
}

impl BandAnalyzer {
    pub fn new(sample_rate: f64, config: SpectrumConfig) -> Self {
        Self {
            spectrum: SpectrumAnalyzer::new(config),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// `None` when fewer than [`MIN_ANALYSIS_SAMPLES`] samples are given.
    pub fn analyze(&mut self, samples: &[f64]) -> Option<BandPowers> {
        if samples.len() < MIN_ANALYSIS_SAMPLES {
            return None;
        }
        let spectrum = self.spectrum.compute(samples, self.sample_rate);
        let mut absolute = [0.0; 8];
        for (slot, band) in absolute.iter_mut().zip(EegBand::ALL) {
            let (low, high) = band.range();
            *slot = spectrum.power_between(low, high);
        }
        Some(BandPowers::from_absolute(absolute))
    }
}
