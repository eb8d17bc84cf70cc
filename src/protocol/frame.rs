//! Validated TGAM frame and the matching encoder.

use super::{checksum, SYNC_BYTE};

/// A frame whose checksum has been verified.
///
/// Only the payload is kept; sync bytes and length are implied by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Vec<u8>,
    checksum: u8,
}

impl Frame {
    pub(crate) fn new_unchecked(payload: Vec<u8>, checksum: u8) -> Self {
        Self { payload, checksum }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }
}

/// Encode `payload` into wire bytes: `AA AA len payload.. checksum`.
///
/// Returns `None` if the payload is longer than a frame can carry. That is
/// at most 169 bytes: a length byte of 0xAA reads as one more sync byte.
pub fn encode(payload: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    encode_into(payload, &mut out).then_some(out)
}

/// Largest payload [`encode`] accepts.
pub const MAX_ENCODED_PAYLOAD_LEN: usize = SYNC_BYTE as usize - 1;

/// Append an encoded frame to `out`. Returns `false` if the payload is too long.
pub fn encode_into(payload: &[u8], out: &mut Vec<u8>) -> bool {
    if payload.len() > MAX_ENCODED_PAYLOAD_LEN {
        return false;
    }
    out.reserve(payload.len() + 4);
    out.push(SYNC_BYTE);
    out.push(SYNC_BYTE);
    out.push(payload.len() as u8);
    out.extend_from_slice(payload);
    out.push(checksum::compute(payload));
    true
}
