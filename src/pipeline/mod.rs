//! Threaded decoding pipeline.
//!
//! A reader thread pulls bytes off the link into a bounded queue; a single
//! decoder thread turns them into samples and routes each one to every sink.
//! Chart refresh polls the visualization buffer on its own tick.
//!
//! # Architecture
//!
//! ```text
//! [LinkReader] ──bytes──► [DecoderTask] ──► [SampleRouter] ──► sinks
//!                                                   │
//!                              SessionEvent ◄───────┘ (failures, stats)
//! ```
//!
//! # Design
//!
//! - **Single-producer/single-consumer queues** between every pair of threads.
//! - **Sequential decoding**: framing is stateful, so one thread owns it.
//! - **Failures are events**: only a link read error ends the session.

pub mod bridge;
pub mod decoder_task;
pub mod reader;
pub mod refresh;
pub mod router;
pub mod session;

pub use bridge::{event_channel, EventReceiver, EventSender, SessionEvent};
pub use decoder_task::{DecoderOutcome, DecoderTask};
pub use reader::{ByteSource, LinkReader, ReaderOutcome};
pub use refresh::{ChartFrame, ChartRefresher};
pub use router::{RouterStats, SampleRouter, SampleSink, SinkDeliveryStats, SinkFailure};
pub use session::{SessionBuilder, SessionHandle, SessionReport};
