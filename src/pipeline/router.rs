//! Sample router. Stamps rows with sequence indices and fans them out.
//!
//! Every sink receives every sample in decode order. A failing sink is
//! counted and reported but never prevents delivery to the others.

use crate::error::TgamError;
use crate::types::{DataRow, DecodedSample};
use serde::{Deserialize, Serialize};

/// A consumer of routed samples.
pub trait SampleSink: Send {
    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str;

    /// Accept one sample. Errors are recoverable from the router's view.
    fn accept(&mut self, sample: &DecodedSample) -> Result<(), TgamError>;

    /// Called once when the decoder stops. Dropping queued producers happens here.
    fn close(&mut self) {}
}

/// Per-sink delivery counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkDeliveryStats {
    pub name: String,
    pub delivered: u64,
    pub failed: u64,
}

/// Router-level counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStats {
    /// Samples stamped (equals the next sequence index).
    pub routed: u64,
    pub sinks: Vec<SinkDeliveryStats>,
}

/// One sink failure observed while routing.
#[derive(Debug)]
pub struct SinkFailure {
    pub sequence_index: u64,
    pub error: TgamError,
}

/// Fan-out router with a session-wide sequence counter.
pub struct SampleRouter {
    next_index: u64,
    sinks: Vec<Box<dyn SampleSink>>,
    stats: Vec<SinkDeliveryStats>,
}

impl SampleRouter {
    pub fn new() -> Self {
        Self {
            next_index: 0,
            sinks: Vec::new(),
            stats: Vec::new(),
        }
    }

    /// Add a sink. Sinks are served in the order they were added.
    pub fn with_sink(mut self, sink: Box<dyn SampleSink>) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn SampleSink>) {
        self.stats.push(SinkDeliveryStats {
            name: sink.name().to_string(),
            ..Default::default()
        });
        self.sinks.push(sink);
    }

    /// Index the next routed sample will receive.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Route the rows of one decoded frame, reporting each sink failure.
    pub fn route<F>(&mut self, rows: &[DataRow], mut on_failure: F)
    where
        F: FnMut(SinkFailure),
    {
        for &row in rows {
            let sample = DecodedSample::new(self.next_index, row);
            self.next_index += 1;

            for (sink, stats) in self.sinks.iter_mut().zip(self.stats.iter_mut()) {
                match sink.accept(&sample) {
                    Ok(()) => stats.delivered += 1,
                    Err(error) => {
                        stats.failed += 1;
                        on_failure(SinkFailure {
                            sequence_index: sample.sequence_index,
                            error,
                        });
                    }
                }
            }
        }
    }

    /// Close every sink. The router keeps its counters.
    pub fn close(&mut self) {
        for sink in &mut self.sinks {
            sink.close();
        }
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            routed: self.next_index,
            sinks: self.stats.clone(),
        }
    }
}

impl Default for SampleRouter {
    fn default() -> Self {
        Self::new()
    }
}
