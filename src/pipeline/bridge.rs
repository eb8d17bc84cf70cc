//! Thread boundary between the pipeline tasks and whoever drives the session.
//!
//! Tasks report through [`EventSender`], a bounded channel that never blocks
//! the pipeline: when the observer falls behind, new events are counted and
//! dropped. The observer drains with [`EventReceiver`].

use crate::protocol::DecoderStats;
use crate::types::LinkStatus;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Events emitted by the reader, decoder and persistence tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Link state changed.
    LinkStatus(LinkStatus),

    /// The byte source failed; the session is terminating.
    LinkFailure(String),

    /// A sink rejected or failed to store a sample. Recoverable.
    SinkError {
        sink: String,
        /// `None` for failures not tied to one sample (e.g. flush).
        sequence_index: Option<u64>,
        message: String,
    },

    /// Periodic decoder counters.
    Stats(DecoderStats),

    /// The decoder task has exited; no more samples will be routed.
    DecoderFinished,
}

/// Producer half, cloned into every task.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<SessionEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Emit without blocking. Returns `false` if the event was dropped.
    pub fn emit(&self, event: SessionEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Consumer half held by the session driver.
#[derive(Debug, Clone)]
pub struct EventReceiver {
    rx: Receiver<SessionEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventReceiver {
    /// Drain all pending events.
    pub fn drain(&self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Try to receive a single event without blocking.
    pub fn try_recv(&self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Events lost because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Create a connected event channel holding at most `capacity` events.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventSender {
            tx,
            dropped: dropped.clone(),
        },
        EventReceiver { rx, dropped },
    )
}
