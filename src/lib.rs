//! # tgam-link: TGAM brainwave stream decoder
//!
//! Decodes the framed TGAM protocol spoken by consumer EEG headsets over a
//! serial link, turns it into typed samples, and routes them to durable
//! storage and a live chart window.
//!
//! ## Architecture
//!
//! - **Protocol**: pure, chunk-independent framing and payload decoding
//! - **Pipeline**: reader thread → bounded byte queue → decoder thread → router
//! - **Sinks**: queued persistence with backpressure, drop-oldest chart buffer
//! - **Analysis**: FFT band powers over the latest raw window
//! - **Communication**: crossbeam channels between every pair of threads
//!
//! ## Configuration
//!
//! Settings are read from `config.toml` in the platform config directory
//! under `tgam-link` (see [`config`]).
//!
//! ## Example
//!
//! ```no_run
//! use tgam_link::{
//!     config::AppConfig,
//!     pipeline::SessionBuilder,
//!     sink::{FormattedWriter, PersistFilter, RecordFormat, VisualizationBuffer},
//! };
//!
//! # fn main() -> tgam_link::Result<()> {
//! let config = AppConfig::default();
//! let writer = FormattedWriter::create(
//!     "eeg.txt".as_ref(),
//!     RecordFormat::Decimal,
//!     PersistFilter::RawOnly,
//! )?;
//! let chart = VisualizationBuffer::new(config.visualization.window);
//!
//! let source = std::fs::File::open("/dev/ttyUSB0")?;
//! let session = SessionBuilder::new(config)
//!     .persist_to(Box::new(writer))
//!     .visualize(chart.clone())
//!     .start(Box::new(source))?;
//!
//! let report = session.join()?;
//! println!("{} samples", report.router.routed);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod simulator;
pub mod sink;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Result, TgamError};
pub use pipeline::{SessionBuilder, SessionEvent, SessionHandle, SessionReport};
pub use protocol::{StreamDecoder, SyncState};
pub use simulator::TgamSimulator;
pub use types::{DataRow, DecodedSample, EegPower, LinkStatus, SignalQualityLevel};
