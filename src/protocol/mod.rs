//! TGAM wire protocol decoding.
//!
//! Bytes flow through three stages, all pure state with no I/O:
//!
//! ```text
//! bytes ──► [FrameSynchronizer] ──► Frame ──► [payload::decode] ──► DataRow*
//!                 │                                  │
//!                 └─ FrameError (resync)             └─ PayloadError (frame dropped)
//! ```
//!
//! Wire format: `AA AA <len> <payload: len bytes> <checksum>`, where
//! `checksum = !(sum(payload) as u8)` and `len <= 170`. A length byte of 0xAA
//! is read as a further sync byte, so 169 is the longest decodable payload.

pub mod checksum;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod framer;
pub mod payload;

pub use decoder::{DecoderStats, DroppedFrame, StreamDecoder};
pub use error::{FrameError, PayloadError};
pub use frame::Frame;
pub use framer::{FrameResult, FrameSynchronizer, SyncState};

/// Frame sync byte, sent twice before the length.
pub const SYNC_BYTE: u8 = 0xAA;

/// Largest length byte accepted.
pub const MAX_PAYLOAD_LEN: u8 = 170;
