//! Periodic chart refresh.
//!
//! Polls the visualization buffer on a fixed tick and hands each snapshot to
//! a callback. Reading never blocks the decoder for longer than one copy of
//! the window.

use crate::analysis::{BandAnalyzer, BandPowers, WindowStats};
use crate::config::{AnalysisConfig, VisualizationConfig};
use crate::sink::{LiveMetrics, VisualizationBuffer};
use crossbeam_channel::{select, tick, Receiver};
use std::time::Duration;

/// One refresh worth of chart data.
#[derive(Debug, Clone, Default)]
pub struct ChartFrame {
    /// Latest raw values, oldest first.
    pub samples: Vec<f64>,
    pub metrics: LiveMetrics,
    /// `None` while the window is empty.
    pub stats: Option<WindowStats>,
    /// `None` when analysis is off or the window is too short.
    pub bands: Option<BandPowers>,
    /// Buffer evictions so far.
    pub evicted: u64,
}

pub struct ChartRefresher {
    buffer: VisualizationBuffer,
    window: usize,
    interval: Duration,
    analyzer: Option<BandAnalyzer>,
}

impl ChartRefresher {
    pub fn new(buffer: VisualizationBuffer, config: &VisualizationConfig) -> Self {
        Self {
            buffer,
            window: config.window,
            interval: config.refresh_interval(),
            analyzer: None,
        }
    }

    /// Run band analysis on every snapshot.
    pub fn with_analysis(mut self, config: &AnalysisConfig) -> Self {
        if config.enabled {
            self.analyzer = Some(BandAnalyzer::new(
                config.sample_rate_hz,
                config.spectrum_config(),
            ));
        }
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Take one snapshot now.
    pub fn snapshot(&mut self) -> ChartFrame {
        let samples = self.buffer.latest_raw(self.window);
        let bands = self
            .analyzer
            .as_mut()
            .and_then(|analyzer| analyzer.analyze(&samples));
        ChartFrame {
            stats: WindowStats::from_raw(&samples),
            samples,
            metrics: self.buffer.metrics(),
            bands,
            evicted: self.buffer.evicted(),
        }
    }

    /// Tick until `stop` fires or disconnects. Returns the number of frames
    /// delivered.
    pub fn run<F>(mut self, stop: Receiver<()>, mut on_frame: F) -> u64
    where
        F: FnMut(ChartFrame),
    {
        let ticker = tick(self.interval);
        let mut frames = 0u64;
        loop {
            select! {
                recv(ticker) -> _ => {
                    on_frame(self.snapshot());
                    frames += 1;
                }
                recv(stop) -> _ => break,
            }
        }
        tracing::debug!("Chart refresh stopped after {} frames", frames);
        frames
    }
}
