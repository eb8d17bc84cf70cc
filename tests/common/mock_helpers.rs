//! Scripted byte sources and record writers

use mockall::mock;
use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::{Arc, Condvar, Mutex};
use tgam_link::sink::RecordWriter;
use tgam_link::DecodedSample;

mock! {
    pub Writer {}

    impl RecordWriter for Writer {
        fn write_sample(&mut self, sample: &DecodedSample) -> io::Result<bool>;
        fn flush(&mut self) -> io::Result<()>;
    }
}

/// Source that yields the given chunks in order, then end of stream
pub struct ChunkedSource {
    chunks: VecDeque<Vec<u8>>,
}

impl ChunkedSource {
    pub fn new(bytes: &[u8], chunk_size: usize) -> Self {
        Self {
            chunks: bytes.chunks(chunk_size.max(1)).map(|c| c.to_vec()).collect(),
        }
    }
}

impl Read for ChunkedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(mut chunk) = self.chunks.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }
}

/// Source that yields `bytes`, then fails every read with `kind`
pub struct FailingSource {
    bytes: Option<Vec<u8>>,
    kind: io::ErrorKind,
}

impl FailingSource {
    pub fn new(bytes: Vec<u8>, kind: io::ErrorKind) -> Self {
        Self {
            bytes: Some(bytes),
            kind,
        }
    }
}

impl Read for FailingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.bytes.take() {
            Some(bytes) if !bytes.is_empty() => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.bytes = Some(bytes[n..].to_vec());
                }
                Ok(n)
            }
            _ => Err(io::Error::new(self.kind, "link lost")),
        }
    }
}

/// Gate a stalled writer waits on until the test opens it
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn open(&self) {
        let (lock, cvar) = &*self.0;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (lock, cvar) = &*self.0;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
    }
}

/// Writer that blocks on its first write until the gate opens, then records
/// every sequence index it sees
pub struct StalledWriter {
    gate: Gate,
    seen: Arc<Mutex<Vec<u64>>>,
}

impl StalledWriter {
    pub fn new(gate: Gate) -> (Self, Arc<Mutex<Vec<u64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                gate,
                seen: seen.clone(),
            },
            seen,
        )
    }
}

impl RecordWriter for StalledWriter {
    fn write_sample(&mut self, sample: &DecodedSample) -> io::Result<bool> {
        self.gate.wait();
        self.seen.lock().unwrap().push(sample.sequence_index);
        Ok(true)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
