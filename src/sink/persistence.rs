//! Persistence sink: durable sample records in stream order.
//!
//! The decoder side holds a [`PersistenceQueue`], a bounded channel producer.
//! A dedicated [`PersistenceWriterTask`] drains it into a [`RecordWriter`]
//! so disk latency never stalls framing. When the queue is full the producer
//! waits up to the configured timeout (backpressure) before giving up on
//! that one sample.
//!
//! # Record formats
//!
//! - **Decimal**: one decimal value per line (`1000`)
//! - **Csv**: `sequence_index,kind,value,microvolts` with a header
//! - **JsonLines**: one JSON object per sample
//! - **Microvolts**: one value per line with two decimals, raw samples
//!   converted to microvolts (`516.00`)
//! - **Binary**: headerless little-endian IEEE f32 per record, raw samples in
//!   microvolts. A single-channel multiplexed BrainVision `.dat` body.

use crate::config::PersistenceConfig;
use crate::error::{Result, ResultExt, TgamError};
use crate::pipeline::bridge::{EventSender, SessionEvent};
use crate::pipeline::router::SampleSink;
use crate::types::{raw_to_microvolts, DataRow, DecodedSample};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Sink name used in logs and errors.
pub const PERSISTENCE_SINK_NAME: &str = "persistence";

/// On-disk record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    #[default]
    Decimal,
    Csv,
    JsonLines,
    Microvolts,
    Binary,
}

impl RecordFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RecordFormat::Decimal => "txt",
            RecordFormat::Csv => "csv",
            RecordFormat::JsonLines => "jsonl",
            RecordFormat::Microvolts => "txt",
            RecordFormat::Binary => "dat",
        }
    }
}

/// Which rows produce records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistFilter {
    /// Only raw EEG samples.
    #[default]
    RawOnly,
    /// Every row with a scalar value.
    AllNumeric,
}

impl PersistFilter {
    pub fn accepts(&self, row: &DataRow) -> bool {
        match self {
            PersistFilter::RawOnly => row.is_raw(),
            PersistFilter::AllNumeric => row.numeric_value().is_some(),
        }
    }
}

/// Destination for persisted samples.
pub trait RecordWriter: Send {
    /// Write one sample. Returns `Ok(false)` when the sample is filtered out.
    fn write_sample(&mut self, sample: &DecodedSample) -> io::Result<bool>;

    fn flush(&mut self) -> io::Result<()>;
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    seq: u64,
    kind: &'a str,
    value: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    microvolts: Option<f64>,
}

/// Record writer producing one of the [`RecordFormat`]s on any `Write`.
pub struct FormattedWriter<W: Write + Send> {
    out: BufWriter<W>,
    format: RecordFormat,
    filter: PersistFilter,
    header_written: bool,
}

impl<W: Write + Send> FormattedWriter<W> {
    pub fn new(inner: W, format: RecordFormat, filter: PersistFilter) -> Self {
        Self {
            out: BufWriter::new(inner),
            format,
            filter,
            header_written: false,
        }
    }

    /// Flush and return the inner writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.out.into_inner().map_err(|e| e.into_error())
    }
}

impl FormattedWriter<File> {
    /// Open `path` for appending, creating it if missing.
    pub fn create(path: &Path, format: RecordFormat, filter: PersistFilter) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open record file {:?}", path))?;
        let mut writer = Self::new(file, format, filter);
        // Appending to an existing CSV must not repeat the header.
        writer.header_written = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        tracing::info!("Persistence writer opened {:?} ({:?})", path, format);
        Ok(writer)
    }
}

impl<W: Write + Send> RecordWriter for FormattedWriter<W> {
    fn write_sample(&mut self, sample: &DecodedSample) -> io::Result<bool> {
        if !self.filter.accepts(&sample.row) {
            return Ok(false);
        }
        let Some(value) = sample.row.numeric_value() else {
            return Ok(false);
        };
        let microvolts = match sample.row {
            DataRow::RawValue(raw) => Some(raw_to_microvolts(raw)),
            _ => None,
        };
        // Scaled formats carry non-raw rows as their plain value.
        let scaled = microvolts.unwrap_or(value as f64);

        match self.format {
            RecordFormat::Decimal => {
                writeln!(self.out, "{}", value)?;
            }
            RecordFormat::Csv => {
                if !self.header_written {
                    writeln!(self.out, "sequence_index,kind,value,microvolts")?;
                    self.header_written = true;
                }
                match microvolts {
                    Some(uv) => writeln!(
                        self.out,
                        "{},{},{},{:.3}",
                        sample.sequence_index,
                        sample.row.kind(),
                        value,
                        uv
                    )?,
                    None => writeln!(
                        self.out,
                        "{},{},{},",
                        sample.sequence_index,
                        sample.row.kind(),
                        value
                    )?,
                }
            }
            RecordFormat::JsonLines => {
                let record = JsonRecord {
                    seq: sample.sequence_index,
                    kind: sample.row.kind(),
                    value,
                    microvolts,
                };
                serde_json::to_writer(&mut self.out, &record).map_err(io::Error::from)?;
                self.out.write_all(b"\n")?;
            }
            RecordFormat::Microvolts => {
                writeln!(self.out, "{:.2}", scaled)?;
            }
            RecordFormat::Binary => {
                self.out.write_all(&(scaled as f32).to_le_bytes())?;
            }
        }
        Ok(true)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Counters reported by the writer task when it exits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceStats {
    /// Samples taken off the queue.
    pub samples_received: u64,
    /// Records actually written.
    pub records_written: u64,
    pub write_failures: u64,
    pub flush_failures: u64,
    pub last_error: Option<String>,
}

/// Decoder-side producer of the persistence queue.
pub struct PersistenceQueue {
    tx: Option<Sender<DecodedSample>>,
    enqueue_timeout: Duration,
    backpressure_events: u64,
}

impl PersistenceQueue {
    /// Number of times an enqueue timed out.
    pub fn backpressure_events(&self) -> u64 {
        self.backpressure_events
    }
}

impl SampleSink for PersistenceQueue {
    fn name(&self) -> &str {
        PERSISTENCE_SINK_NAME
    }

    fn accept(&mut self, sample: &DecodedSample) -> std::result::Result<(), TgamError> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(TgamError::SinkClosed(PERSISTENCE_SINK_NAME.to_string()));
        };
        match tx.send_timeout(*sample, self.enqueue_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                self.backpressure_events += 1;
                Err(TgamError::Backpressure {
                    sink: PERSISTENCE_SINK_NAME.to_string(),
                    waited: self.enqueue_timeout,
                })
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                self.tx = None;
                Err(TgamError::SinkClosed(PERSISTENCE_SINK_NAME.to_string()))
            }
        }
    }

    fn close(&mut self) {
        // Dropping the sender lets the writer drain and exit.
        self.tx = None;
    }
}

/// Consumer side: drains the queue into a [`RecordWriter`].
pub struct PersistenceWriterTask {
    rx: Receiver<DecodedSample>,
    writer: Box<dyn RecordWriter>,
    flush_every: usize,
    events: Option<EventSender>,
    stats: PersistenceStats,
}

impl PersistenceWriterTask {
    /// Report write failures on the session event channel.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Run until every producer is gone and the queue is empty.
    pub fn run(mut self) -> PersistenceStats {
        tracing::debug!("Persistence writer started");
        let mut since_flush = 0usize;

        while let Ok(sample) = self.rx.recv() {
            self.write_one(&sample, &mut since_flush);
            while let Ok(sample) = self.rx.try_recv() {
                self.write_one(&sample, &mut since_flush);
            }
            // Queue drained: make what we have durable.
            if since_flush > 0 {
                self.flush();
                since_flush = 0;
            }
        }

        self.flush();
        tracing::info!(
            "Persistence writer finished: {} records from {} samples ({} failures)",
            self.stats.records_written,
            self.stats.samples_received,
            self.stats.write_failures
        );
        self.stats
    }

    fn write_one(&mut self, sample: &DecodedSample, since_flush: &mut usize) {
        self.stats.samples_received += 1;
        match self.writer.write_sample(sample) {
            Ok(true) => {
                self.stats.records_written += 1;
                *since_flush += 1;
                if *since_flush >= self.flush_every {
                    self.flush();
                    *since_flush = 0;
                }
            }
            Ok(false) => {}
            Err(e) => {
                self.stats.write_failures += 1;
                self.stats.last_error = Some(e.to_string());
                tracing::warn!(
                    seq = sample.sequence_index,
                    "Persistence write failed: {}",
                    e
                );
                self.report(SessionEvent::SinkError {
                    sink: PERSISTENCE_SINK_NAME.to_string(),
                    sequence_index: Some(sample.sequence_index),
                    message: e.to_string(),
                });
            }
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            self.stats.flush_failures += 1;
            self.stats.last_error = Some(e.to_string());
            tracing::warn!("Persistence flush failed: {}", e);
            self.report(SessionEvent::SinkError {
                sink: PERSISTENCE_SINK_NAME.to_string(),
                sequence_index: None,
                message: e.to_string(),
            });
        }
    }

    fn report(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

/// Create a connected producer/consumer pair.
pub fn persistence_channel(
    config: &PersistenceConfig,
    writer: Box<dyn RecordWriter>,
) -> (PersistenceQueue, PersistenceWriterTask) {
    let (tx, rx) = bounded(config.queue_capacity.max(1));
    (
        PersistenceQueue {
            tx: Some(tx),
            enqueue_timeout: config.enqueue_timeout(),
            backpressure_events: 0,
        },
        PersistenceWriterTask {
            rx,
            writer,
            flush_every: config.flush_every.max(1),
            events: None,
            stats: PersistenceStats::default(),
        },
    )
}
