//! Spectrum computation for the raw EEG window.
//!
//! Produces a one-sided power spectrum (rustfft) that the band analyzer
//! integrates. Windowing and mean removal happen before the transform.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window function applied before the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    Rectangular,
    /// Good general purpose
    #[default]
    Hann,
    Hamming,
    Blackman,
}

impl WindowFunction {
    pub fn display_name(&self) -> &'static str {
        match self {
            WindowFunction::Rectangular => "Rectangular",
            WindowFunction::Hann => "Hann",
            WindowFunction::Hamming => "Hamming",
            WindowFunction::Blackman => "Blackman",
        }
    }

    pub fn all() -> &'static [WindowFunction] {
        &[
            WindowFunction::Rectangular,
            WindowFunction::Hann,
            WindowFunction::Hamming,
            WindowFunction::Blackman,
        ]
    }

    /// Coefficient at position `i` of an `n`-sample window.
    pub fn coefficient(&self, i: usize, n: usize) -> f64 {
        let phase = 2.0 * PI * i as f64 / n as f64;
        match self {
            WindowFunction::Rectangular => 1.0,
            WindowFunction::Hann => 0.5 * (1.0 - phase.cos()),
            WindowFunction::Hamming => 0.54 - 0.46 * phase.cos(),
            // Clamp: endpoints can round to -ε.
            WindowFunction::Blackman => {
                (0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()).max(0.0)
            }
        }
    }

    pub fn generate(&self, n: usize) -> Vec<f64> {
        (0..n).map(|i| self.coefficient(i, n)).collect()
    }
}

/// One-sided power spectrum.
#[derive(Debug, Clone, Default)]
pub struct Spectrum {
    /// Bin centre frequencies (Hz), `0..=fs/2`.
    pub frequencies: Vec<f64>,
    /// Power per bin (squared scaled magnitude).
    pub power: Vec<f64>,
    /// Hz per bin.
    pub resolution: f64,
    /// Samples that went into the transform (before padding).
    pub sample_count: usize,
}

impl Spectrum {
    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }

    /// Frequency and power of the strongest non-DC bin.
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.power
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, &p)| (self.frequencies[i], p))
    }

    /// Total power in `[low, high)` Hz.
    pub fn power_between(&self, low: f64, high: f64) -> f64 {
        self.frequencies
            .iter()
            .zip(&self.power)
            .filter(|(&f, _)| f >= low && f < high)
            .map(|(_, &p)| p)
            .sum()
    }
}

/// Analyzer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumConfig {
    pub window: WindowFunction,
    /// Transform length; shorter inputs are zero-padded, longer ones use
    /// their most recent `fft_size` samples.
    pub fft_size: usize,
    pub remove_dc: bool,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            window: WindowFunction::Hann,
            fft_size: 512,
            remove_dc: true,
        }
    }
}

/// Reusable FFT planner plus configuration.
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f64>,
    config: SpectrumConfig,
}

impl SpectrumAnalyzer {
    pub fn new(config: SpectrumConfig) -> Self {
        Self {
            planner: FftPlanner::new(),
            config,
        }
    }

    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    /// Compute the power spectrum of `samples` taken at `sample_rate` Hz.
    pub fn compute(&mut self, samples: &[f64], sample_rate: f64) -> Spectrum {
        let fft_size = self.config.fft_size.max(2).next_power_of_two();
        let start = samples.len().saturating_sub(fft_size);
        let samples = &samples[start..];
        let n = samples.len();
        if n == 0 || sample_rate <= 0.0 {
            return Spectrum::default();
        }

        let mean = if self.config.remove_dc {
            samples.iter().sum::<f64>() / n as f64
        } else {
            0.0
        };

        let window = self.config.window.generate(n);
        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .zip(&window)
            .map(|(&s, &w)| Complex::new((s - mean) * w, 0.0))
            .collect();
        buffer.resize(fft_size, Complex::new(0.0, 0.0));

        let fft = self.planner.plan_fft_forward(fft_size);
        fft.process(&mut buffer);

        let resolution = sample_rate / fft_size as f64;
        let bins = fft_size / 2 + 1;
        let frequencies = (0..bins).map(|i| i as f64 * resolution).collect();
        let power = buffer
            .iter()
            .take(bins)
            .map(|c| {
                let mag = 2.0 * c.norm() / n as f64;
                mag * mag
            })
            .collect();

        Spectrum {
            frequencies,
            power,
            resolution,
            sample_count: n,
        }
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new(SpectrumConfig::default())
    }
}
