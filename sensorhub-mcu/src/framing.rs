//! Length-prefixed frame reader
//!
//! GATT writes arrive in arbitrary pieces. These two accumulators take
//! whatever part of a piece they need and report how much they used.

use sensorhub_proto::{ProtoError, LENGTH_PREFIX_LEN, MAX_FRAME_LEN};

/// Collects the 4 length bytes, possibly over several writes
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LengthPrefix {
    bytes: [u8; LENGTH_PREFIX_LEN],
    filled: usize,
}

impl LengthPrefix {
    /// Take up to the missing length bytes from `data`, returns bytes used
    pub fn feed(&mut self, data: &[u8]) -> usize {
        let used = (LENGTH_PREFIX_LEN - self.filled).min(data.len());
        self.bytes[self.filled..self.filled + used].copy_from_slice(&data[..used]);
        self.filled += used;
        used
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Declared payload length, once all four bytes are in
    pub fn value(&self) -> Option<usize> {
        (self.filled == LENGTH_PREFIX_LEN).then(|| u32::from_le_bytes(self.bytes) as usize)
    }
}

/// Accumulates a payload of known length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReader {
    expected: usize,
    buf: Vec<u8>,
}

impl FrameReader {
    pub fn new(expected: usize) -> Result<Self, ProtoError> {
        if expected > MAX_FRAME_LEN {
            return Err(ProtoError::FrameTooLarge(expected));
        }
        Ok(Self {
            expected,
            buf: Vec::with_capacity(expected),
        })
    }

    /// Take what is still missing from `data`, returns bytes used
    pub fn feed(&mut self, data: &[u8]) -> usize {
        let used = self.remaining().min(data.len());
        self.buf.extend_from_slice(&data[..used]);
        used
    }

    pub fn remaining(&self) -> usize {
        self.expected - self.buf.len()
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.buf
    }
}
