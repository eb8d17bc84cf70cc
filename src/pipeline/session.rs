//! Session lifecycle: wires the tasks together and collects their results.
//!
//! ```text
//! ByteSource ─► [reader] ─► byte queue ─► [decoder] ─► SampleRouter ─┬─► PersistenceQueue ─► [writer] ─► file
//!                                                                     ├─► VisualizationBuffer ◄─ refresh tick
//!                                                                     └─► extra sinks
//! ```
//!
//! Stopping the session (or the source ending) stops the reader; the decoder
//! then drains what is queued, discards any partial frame, and closes the
//! sinks, which lets the writer flush and exit. A reader blocked inside
//! `read` only notices a stop when that read returns; the session does not
//! wait for it past a short grace period.

use super::bridge::{event_channel, EventReceiver};
use super::decoder_task::{DecoderOutcome, DecoderTask};
use super::reader::{ByteSource, LinkReader, ReaderOutcome};
use super::router::{RouterStats, SampleRouter, SampleSink};
use crate::config::AppConfig;
use crate::error::{Result, TgamError};
use crate::protocol::DecoderStats;
use crate::sink::{
    persistence_channel, PersistenceStats, RecordWriter, VisualizationBuffer,
    PERSISTENCE_SINK_NAME,
};
use crate::types::LinkStatus;
use chrono::{DateTime, Utc};
use crossbeam_channel::bounded;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long a stopped session waits for the reader's current read.
pub const READER_STOP_GRACE: Duration = Duration::from_millis(200);

/// Summary of a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub link_status: LinkStatus,
    pub link_error: Option<String>,
    pub bytes_read: u64,
    pub decoder: DecoderStats,
    pub router: RouterStats,
    pub persistence: Option<PersistenceStats>,
    /// Samples evicted from the visualization window.
    pub visualization_evicted: Option<u64>,
    /// A partial frame was discarded at end of stream.
    pub discarded_partial_frame: bool,
    /// Reason the most recent frame was dropped.
    pub last_drop: Option<String>,
    /// The reader was still blocked in a read when the session ended.
    pub reader_abandoned: bool,
    /// Session events lost because nobody drained them in time.
    pub events_dropped: u64,
}

impl SessionReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Samples the persistence sink did not accept.
    pub fn persistence_rejections(&self) -> u64 {
        self.router
            .sinks
            .iter()
            .filter(|s| s.name == PERSISTENCE_SINK_NAME)
            .map(|s| s.failed)
            .sum()
    }
}

/// Assembles the sinks of a session before starting it.
pub struct SessionBuilder {
    config: AppConfig,
    writer: Option<Box<dyn RecordWriter>>,
    visualization: Option<VisualizationBuffer>,
    extra_sinks: Vec<Box<dyn SampleSink>>,
}

impl SessionBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            writer: None,
            visualization: None,
            extra_sinks: Vec::new(),
        }
    }

    /// Persist samples through `writer` on a dedicated thread.
    pub fn persist_to(mut self, writer: Box<dyn RecordWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Feed `buffer`; keep a clone to read it from the refresh side.
    pub fn visualize(mut self, buffer: VisualizationBuffer) -> Self {
        self.visualization = Some(buffer);
        self
    }

    /// Attach an additional sink, served after persistence and visualization.
    pub fn sink(mut self, sink: Box<dyn SampleSink>) -> Self {
        self.extra_sinks.push(sink);
        self
    }

    /// Spawn the reader, decoder and (optionally) writer threads.
    pub fn start(self, source: Box<dyn ByteSource>) -> Result<SessionHandle> {
        self.config.validate()?;
        let config = self.config;

        let (events_tx, events_rx) = event_channel(config.link.event_queue_capacity);
        let running = Arc::new(AtomicBool::new(true));
        let started_at = Utc::now();

        let mut router = SampleRouter::new();
        let mut writer_handle = None;

        if let Some(writer) = self.writer {
            let (queue, task) = persistence_channel(&config.persistence, writer);
            router.add_sink(Box::new(queue));
            let events = events_tx.clone();
            writer_handle = Some(spawn_named("tgam-writer", move || {
                task.with_events(events).run()
            })?);
        }
        if let Some(buffer) = &self.visualization {
            router.add_sink(Box::new(buffer.clone()));
        }
        for sink in self.extra_sinks {
            router.add_sink(sink);
        }

        let (bytes_tx, bytes_rx) = bounded(config.link.byte_queue_capacity);

        let decoder =
            DecoderTask::new(bytes_rx, router, events_tx.clone()).with_stop_flag(running.clone());
        let decoder_handle = spawn_named("tgam-decoder", move || decoder.run())?;

        let reader = LinkReader::new(
            source,
            bytes_tx,
            config.link.read_chunk_size,
            running.clone(),
            events_tx,
        );
        let reader_handle = spawn_named("tgam-reader", move || reader.run())?;

        tracing::info!("Session started");

        Ok(SessionHandle {
            running,
            reader: reader_handle,
            decoder: decoder_handle,
            writer: writer_handle,
            events: events_rx,
            visualization: self.visualization,
            started_at,
        })
    }
}

fn spawn_named<F, T>(name: &str, f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|e| TgamError::Io(e).with_context(format!("Failed to spawn {} thread", name)))
}

fn join_thread<T>(handle: JoinHandle<T>, what: &str) -> Result<T> {
    handle
        .join()
        .map_err(|_| TgamError::Channel(format!("{} thread panicked", what)))
}

/// Running session.
pub struct SessionHandle {
    running: Arc<AtomicBool>,
    reader: JoinHandle<ReaderOutcome>,
    decoder: JoinHandle<DecoderOutcome>,
    writer: Option<JoinHandle<PersistenceStats>>,
    events: EventReceiver,
    visualization: Option<VisualizationBuffer>,
    started_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Ask the reader to stop after its current read.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Whether the decoder has exited (stream over or stopped).
    pub fn is_finished(&self) -> bool {
        self.decoder.is_finished()
    }

    pub fn events(&self) -> &EventReceiver {
        &self.events
    }

    pub fn visualization(&self) -> Option<&VisualizationBuffer> {
        self.visualization.as_ref()
    }

    /// Wait for every task and build the report.
    ///
    /// Blocks until the source ends unless [`stop`](Self::stop) was called.
    /// After a stop, a reader still blocked in `read` once the decoder is
    /// done is left behind: it exits on its own when that read returns.
    pub fn join(self) -> Result<SessionReport> {
        let decoder = join_thread(self.decoder, "Decoder")?;
        let persistence = match self.writer {
            Some(handle) => Some(join_thread(handle, "Writer")?),
            None => None,
        };

        let stopped = !self.running.load(Ordering::Relaxed);
        let reader = if stopped && !wait_finished(&self.reader, READER_STOP_GRACE) {
            tracing::warn!("Reader still blocked in a read, not waiting for it");
            None
        } else {
            Some(join_thread(self.reader, "Reader")?)
        };
        let reader_abandoned = reader.is_none();
        let reader = reader.unwrap_or_else(|| ReaderOutcome {
            bytes_read: decoder.decoder.bytes_in,
            status: LinkStatus::Closed,
            ..Default::default()
        });

        let report = SessionReport {
            started_at: self.started_at,
            finished_at: Utc::now(),
            link_status: reader.status,
            link_error: reader.error,
            bytes_read: reader.bytes_read,
            decoder: decoder.decoder,
            router: decoder.router,
            persistence,
            visualization_evicted: self.visualization.as_ref().map(|b| b.evicted()),
            discarded_partial_frame: decoder.discarded_partial,
            last_drop: decoder.last_drop,
            reader_abandoned,
            events_dropped: self.events.dropped(),
        };
        tracing::info!(
            "Session finished ({}): {} bytes, {} samples",
            report.link_status,
            report.bytes_read,
            report.router.routed
        );
        Ok(report)
    }

    /// Stop and join.
    ///
    /// Returns once the decoder has drained and the sinks are closed, even if
    /// the source is stuck in a blocking read.
    pub fn close(self) -> Result<SessionReport> {
        self.stop();
        self.join()
    }
}

fn wait_finished<T>(handle: &JoinHandle<T>, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
    true
}
