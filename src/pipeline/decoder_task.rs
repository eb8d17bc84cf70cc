//! Decoder task: drains the byte queue through the decoder into the router.
//!
//! Strictly sequential. It suspends only on an empty queue, and exits once
//! the reader has dropped its sender and every queued chunk is processed.
//! With a stop flag attached it also exits when a stop is requested and the
//! queue has stayed empty for one poll interval, so a reader stuck in a
//! blocking read cannot hold the session open.

use super::bridge::{EventSender, SessionEvent};
use super::router::{RouterStats, SampleRouter};
use crate::error::TgamError;
use crate::protocol::{DecoderStats, StreamDecoder};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default spacing of `SessionEvent::Stats` reports.
pub const STATS_INTERVAL: Duration = Duration::from_millis(500);

/// How long an empty queue is waited on before the stop flag is checked.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Final counters of the decoder task.
#[derive(Debug, Clone, Default)]
pub struct DecoderOutcome {
    pub decoder: DecoderStats,
    pub router: RouterStats,
    /// A partial frame was pending when the stream ended.
    pub discarded_partial: bool,
    /// Reason the most recent frame was dropped.
    pub last_drop: Option<String>,
}

pub struct DecoderTask {
    rx: Receiver<Vec<u8>>,
    decoder: StreamDecoder,
    router: SampleRouter,
    events: EventSender,
    stats_interval: Duration,
    running: Option<Arc<AtomicBool>>,
}

impl DecoderTask {
    pub fn new(rx: Receiver<Vec<u8>>, router: SampleRouter, events: EventSender) -> Self {
        Self {
            rx,
            decoder: StreamDecoder::new(),
            router,
            events,
            stats_interval: STATS_INTERVAL,
            running: None,
        }
    }

    /// Exit on an idle queue once `running` is cleared.
    pub fn with_stop_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    pub fn run(self) -> DecoderOutcome {
        let Self {
            rx,
            mut decoder,
            mut router,
            events,
            stats_interval,
            running,
        } = self;
        let stop_requested = || running.as_ref().is_some_and(|r| !r.load(Ordering::Relaxed));

        tracing::debug!("Decoder task started");
        let mut last_stats = Instant::now();
        let mut drops_seen = 0u64;

        loop {
            let chunk = match rx.recv_timeout(STOP_POLL_INTERVAL) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) if stop_requested() => {
                    tracing::debug!("Stop requested with an idle link, not waiting for the reader");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            decoder.feed_frames(&chunk, |rows| {
                router.route(rows, |failure| {
                    tracing::warn!(
                        seq = failure.sequence_index,
                        "Sink failure: {}",
                        failure.error
                    );
                    events.emit(SessionEvent::SinkError {
                        sink: failure.error.sink_name().unwrap_or("unknown").to_string(),
                        sequence_index: Some(failure.sequence_index),
                        message: failure.error.to_string(),
                    });
                });
            });

            let dropped = decoder.stats().frames_dropped();
            if dropped > drops_seen {
                if let Some(reason) = decoder.last_drop() {
                    tracing::debug!(dropped, "{}", TgamError::from(reason));
                }
                drops_seen = dropped;
            }

            if last_stats.elapsed() >= stats_interval {
                events.emit(SessionEvent::Stats(*decoder.stats()));
                last_stats = Instant::now();
            }
        }

        // Queue closed or stop requested: the stream is over.
        let discarded_partial = decoder.finish();
        router.close();

        let outcome = DecoderOutcome {
            decoder: *decoder.stats(),
            router: router.stats(),
            discarded_partial,
            last_drop: decoder
                .last_drop()
                .map(|reason| TgamError::from(reason).to_string()),
        };
        events.emit(SessionEvent::Stats(outcome.decoder));
        events.emit(SessionEvent::DecoderFinished);

        if outcome.decoder.frames_dropped() > 0 {
            tracing::warn!(
                "Decoder dropped {} frames ({} checksum, {} too long, {} malformed)",
                outcome.decoder.frames_dropped(),
                outcome.decoder.checksum_mismatches,
                outcome.decoder.frames_too_long,
                outcome.decoder.malformed_payloads
            );
        }
        tracing::info!(
            "Decoder task finished: {} frames, {} samples routed",
            outcome.decoder.frames_decoded,
            outcome.router.routed
        );
        outcome
    }
}
