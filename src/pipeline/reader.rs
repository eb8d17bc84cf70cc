//! Link reader task.
//!
//! Performs blocking reads on the byte source and forwards each non-empty
//! chunk on the bounded byte queue. A full queue blocks the reader, which is
//! the only backpressure the link sees.

use super::bridge::{EventSender, SessionEvent};
use crate::error::TgamError;
use crate::types::LinkStatus;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::io::{self, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Pause before retrying a source that has no data ready.
pub const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(1);

/// Anything that yields sequential bytes from an open link.
///
/// `Ok(0)` means end of stream. `WouldBlock`, `TimedOut` and `Interrupted`
/// are retried, `WouldBlock` after a short sleep. Any other error is a link
/// failure.
pub trait ByteSource: Send {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<R: Read + Send> ByteSource for R {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}

/// How the reader stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderOutcome {
    pub bytes_read: u64,
    pub chunks: u64,
    /// Final link state: `Closed` or `Failed`.
    pub status: LinkStatus,
    /// Message of the read error that ended the session, if any.
    pub error: Option<String>,
}

/// Reader side of the byte queue.
pub struct LinkReader {
    source: Box<dyn ByteSource>,
    tx: Sender<Vec<u8>>,
    chunk_size: usize,
    running: Arc<AtomicBool>,
    events: EventSender,
}

impl LinkReader {
    pub fn new(
        source: Box<dyn ByteSource>,
        tx: Sender<Vec<u8>>,
        chunk_size: usize,
        running: Arc<AtomicBool>,
        events: EventSender,
    ) -> Self {
        Self {
            source,
            tx,
            chunk_size: chunk_size.max(1),
            running,
            events,
        }
    }

    /// Read until end of stream, a fatal error, or `running` is cleared.
    ///
    /// Dropping the queue sender on return tells the decoder no more bytes
    /// will arrive.
    pub fn run(mut self) -> ReaderOutcome {
        let mut outcome = ReaderOutcome::default();
        let mut buf = vec![0u8; self.chunk_size];

        self.events.emit(SessionEvent::LinkStatus(LinkStatus::Streaming));
        tracing::info!("Link reader started (chunk {} bytes)", self.chunk_size);

        while self.running.load(Ordering::Relaxed) {
            match self.source.read_chunk(&mut buf) {
                Ok(0) => {
                    tracing::info!("Link reached end of stream");
                    break;
                }
                Ok(n) => {
                    outcome.bytes_read += n as u64;
                    outcome.chunks += 1;
                    if self.tx.send(buf[..n].to_vec()).is_err() {
                        tracing::warn!("Byte queue closed, stopping reader");
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(WOULD_BLOCK_BACKOFF);
                }
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => {
                    let err = TgamError::LinkRead(e);
                    tracing::error!("{}", err);
                    outcome.status = LinkStatus::Failed;
                    outcome.error = Some(err.to_string());
                    self.events.emit(SessionEvent::LinkFailure(err.to_string()));
                    break;
                }
            }
        }

        if outcome.status != LinkStatus::Failed {
            outcome.status = LinkStatus::Closed;
        }
        self.events.emit(SessionEvent::LinkStatus(outcome.status));
        tracing::debug!(
            bytes = outcome.bytes_read,
            chunks = outcome.chunks,
            "Link reader stopped"
        );
        outcome
    }
}
