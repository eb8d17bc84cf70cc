//! Sample sinks fed by the router.
//!
//! - [`persistence`]: queued, durable record files with bounded-wait backpressure
//! - [`visualization`]: drop-oldest window polled by the chart refresh

pub mod persistence;
pub mod visualization;

pub use persistence::{
    persistence_channel, FormattedWriter, PersistFilter, PersistenceQueue, PersistenceStats,
    PersistenceWriterTask, RecordFormat, RecordWriter, PERSISTENCE_SINK_NAME,
};
pub use visualization::{LiveMetrics, VisualizationBuffer, VISUALIZATION_SINK_NAME};
