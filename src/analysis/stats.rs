//! Summary statistics of the raw window.

use crate::types::raw_to_microvolts;
use serde::{Deserialize, Serialize};

/// Statistics over a window of raw samples, in microvolts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Newest sample of the window.
    pub latest: f64,
}

impl WindowStats {
    /// Statistics of raw counts, oldest first. `None` for an empty window.
    pub fn from_raw(samples: &[f64]) -> Option<Self> {
        let latest = *samples.last()?;
        let uv = |raw: f64| raw_to_microvolts(raw as i16);

        let n = samples.len() as f64;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &raw in samples {
            let v = uv(raw);
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        let mean = sum / n;
        let variance = samples
            .iter()
            .map(|&raw| (uv(raw) - mean).powi(2))
            .sum::<f64>()
            / n;

        Some(Self {
            mean,
            std: variance.sqrt(),
            min,
            max,
            latest: uv(latest),
        })
    }

    /// Peak-to-peak amplitude.
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}
