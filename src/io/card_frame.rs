//! Card reader frame decoding
//!
//! Protocol:
//! - Serial: 4800 baud, 8 data bits, odd parity, 1 stop bit
//! - Fixed 12-byte reassembly window
//! - Frame: [STX 0x02][lead byte][payload...][ETX 0x03]
//! - Payload starts two bytes after STX (the lead byte is not part of the id)
//! - Filler bytes 0x52 ('R') and 0x5F ('_') are injected by the reader
//! - Identifier is truncated to 8 characters
//!
//! Windows are decoded as-is: there is no realignment and no carry-over of a
//! partial frame, so a stream that drifts off the 12-byte boundary loses the
//! swipe that straddles it.

use crate::domain::card::CardIdentifier;
use bytes::{BufMut, BytesMut};
use smallvec::SmallVec;
use tracing::debug;

// Protocol constants
pub const FRAME_LEN: usize = 12;
const START_MARKER: u8 = 0x02;
const END_MARKER: u8 = 0x03;
const PAYLOAD_OFFSET: usize = 2;
const FILLER_BYTES: [u8; 2] = [0x52, 0x5F];

/// Decode one 12-byte window into a card identifier.
///
/// Returns `None` when the window has no start marker, no end marker, or the
/// first start marker does not precede the first end marker.
pub fn decode(window: &[u8; FRAME_LEN]) -> Option<CardIdentifier> {
    let start = window.iter().position(|&b| b == START_MARKER)?;
    let end = window.iter().position(|&b| b == END_MARKER)?;
    if start >= end {
        return None;
    }

    // `02 03` adjacent leaves nothing between lead byte and end marker
    let payload = window.get(start + PAYLOAD_OFFSET..end).unwrap_or(&[]);

    let id: String = payload
        .iter()
        .filter(|&&b| !FILLER_BYTES.contains(&b))
        .map(|&b| b as char)
        .collect();

    Some(CardIdentifier::new(id))
}

/// Result of one completed window: a usable identifier or a miss
pub type WindowOutcome = Option<CardIdentifier>;

/// Accumulates serial bytes into 12-byte windows.
///
/// The buffer is decoded and cleared the moment it holds exactly
/// [`FRAME_LEN`] bytes, whether or not the decode succeeds.
#[derive(Debug)]
pub struct FrameAccumulator {
    buffer: BytesMut,
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self { buffer: BytesMut::with_capacity(FRAME_LEN) }
    }

    /// Bytes waiting for the current window to fill
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial window (used when the link is lost)
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Append a chunk and return one outcome per window completed by it.
    ///
    /// A window whose payload is empty or all filler still yields an (empty)
    /// identifier; only a missing or misordered marker is a miss.
    pub fn push(&mut self, chunk: &[u8]) -> SmallVec<[WindowOutcome; 1]> {
        let mut outcomes = SmallVec::new();

        for &byte in chunk {
            self.buffer.put_u8(byte);
            if self.buffer.len() < FRAME_LEN {
                continue;
            }

            let mut window = [0u8; FRAME_LEN];
            window.copy_from_slice(&self.buffer[..FRAME_LEN]);
            self.buffer.clear();

            match decode(&window) {
                Some(id) => outcomes.push(Some(id)),
                None => {
                    debug!(raw_bytes = %hex::encode_upper(window), "card_frame_miss");
                    outcomes.push(None);
                }
            }
        }

        outcomes
    }
}
