//! Visualization buffer: a bounded window of the freshest samples.
//!
//! The router appends; a periodic refresh task reads. The buffer evicts the
//! oldest sample when full, so the decoder never waits on the chart. Besides
//! the sample window it caches the latest value of every derived metric.

use crate::error::TgamError;
use crate::pipeline::router::SampleSink;
use crate::types::{DataRow, DecodedSample, EegPower, SignalQualityLevel};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Sink name used in logs and errors.
pub const VISUALIZATION_SINK_NAME: &str = "visualization";

/// Latest value of each derived metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveMetrics {
    pub attention: Option<u8>,
    pub meditation: Option<u8>,
    pub signal_quality: Option<u8>,
    pub heart_rate: Option<u8>,
    pub blink_strength: Option<u8>,
    pub eeg_power: Option<EegPower>,
    /// Most recent raw sample.
    pub last_raw: Option<i16>,
}

impl LiveMetrics {
    pub fn signal_level(&self) -> Option<SignalQualityLevel> {
        self.signal_quality.map(SignalQualityLevel::from_quality)
    }

    fn update(&mut self, row: &DataRow) {
        match *row {
            DataRow::RawValue(v) => self.last_raw = Some(v),
            DataRow::SignalQuality(v) => self.signal_quality = Some(v),
            DataRow::Attention(v) => self.attention = Some(v),
            DataRow::Meditation(v) => self.meditation = Some(v),
            DataRow::HeartRate(v) => self.heart_rate = Some(v),
            DataRow::BlinkStrength(v) => self.blink_strength = Some(v),
            DataRow::EegPower(p) => self.eeg_power = Some(p),
            DataRow::Unknown { .. } => {}
        }
    }
}

#[derive(Debug)]
struct Inner {
    samples: VecDeque<DecodedSample>,
    capacity: usize,
    evicted: u64,
    appended: u64,
    metrics: LiveMetrics,
}

/// Shared, bounded, drop-oldest sample window.
///
/// Cloning yields another handle to the same buffer.
#[derive(Debug, Clone)]
pub struct VisualizationBuffer {
    inner: Arc<Mutex<Inner>>,
}

impl VisualizationBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                samples: VecDeque::with_capacity(capacity),
                capacity,
                evicted: 0,
                appended: 0,
                metrics: LiveMetrics::default(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a sample, evicting the oldest if full.
    pub fn append(&self, sample: DecodedSample) {
        let mut inner = self.lock();
        inner.metrics.update(&sample.row);
        if inner.samples.len() >= inner.capacity {
            inner.samples.pop_front();
            inner.evicted += 1;
        }
        inner.samples.push_back(sample);
        inner.appended += 1;
    }

    /// Up to `n` most recent samples, oldest first.
    pub fn latest(&self, n: usize) -> Vec<DecodedSample> {
        let inner = self.lock();
        let skip = inner.samples.len().saturating_sub(n);
        inner.samples.iter().skip(skip).copied().collect()
    }

    /// Up to `n` most recent raw values, oldest first, for charting.
    pub fn latest_raw(&self, n: usize) -> Vec<f64> {
        let inner = self.lock();
        let mut out: Vec<f64> = inner
            .samples
            .iter()
            .rev()
            .filter_map(|s| match s.row {
                DataRow::RawValue(v) => Some(v as f64),
                _ => None,
            })
            .take(n)
            .collect();
        out.reverse();
        out
    }

    pub fn metrics(&self) -> LiveMetrics {
        self.lock().metrics
    }

    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Samples dropped to make room.
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    /// Samples ever appended.
    pub fn appended(&self) -> u64 {
        self.lock().appended
    }

    /// Drop every sample and forget the cached metrics.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.samples.clear();
        inner.metrics = LiveMetrics::default();
    }
}

impl SampleSink for VisualizationBuffer {
    fn name(&self) -> &str {
        VISUALIZATION_SINK_NAME
    }

    fn accept(&mut self, sample: &DecodedSample) -> Result<(), TgamError> {
        self.append(*sample);
        Ok(())
    }
}
