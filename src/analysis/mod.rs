//! Signal analysis for the live raw EEG window
//!
//! - Power spectrum (FFT) with selectable window function
//! - Integration of power into the conventional EEG bands
//! - Mean, spread and extremes of the window in microvolts

pub mod bands;
pub mod fft;
pub mod stats;

pub use bands::{BandAnalyzer, BandPowers, EegBand, MIN_ANALYSIS_SAMPLES};
pub use fft::{Spectrum, SpectrumAnalyzer, SpectrumConfig, WindowFunction};
pub use stats::WindowStats;
