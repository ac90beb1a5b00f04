//! Length-prefixed message framing.
//!
//! Each envelope travels as a 4-byte little-endian payload length followed
//! by the payload. A single read may deliver part of a frame, exactly one
//! frame, or the tail of one frame followed by the head of the next.

use std::mem;

use thiserror::Error;

/// Size of the length prefix in bytes.
pub(crate) const FRAME_HEADER_LEN: usize = 4;

/// Errors raised while reassembling frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum FrameError {
    #[error("frame of {declared} bytes exceeds the {limit} byte limit")]
    Oversize { declared: usize, limit: usize },
}

/// Prefixes `payload` with its length.
///
/// Returns `None` when the payload cannot be described by the header.
pub(crate) fn encode_frame(payload: &[u8], capacity: usize) -> Option<Vec<u8>> {
    let declared = u32::try_from(payload.len()).ok()?;
    let mut frame = Vec::with_capacity(capacity.max(FRAME_HEADER_LEN + payload.len()));
    frame.extend_from_slice(&declared.to_le_bytes());
    frame.extend_from_slice(payload);
    Some(frame)
}

/// Accumulates partial reads into complete frames.
#[derive(Debug)]
pub(crate) struct FrameAssembler {
    pending: Vec<u8>,
    limit: usize,
}

impl FrameAssembler {
    pub(crate) const fn new(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
        }
    }

    /// Appends `chunk` and returns every frame it completed, in order.
    ///
    /// Each returned payload owns its buffer; the accumulator continues with
    /// a fresh buffer holding only bytes that belong to later frames.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>, FrameError> {
        self.pending.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(declared) = self.declared_len() {
            if declared > self.limit {
                return Err(FrameError::Oversize {
                    declared,
                    limit: self.limit,
                });
            }
            let total = FRAME_HEADER_LEN + declared;
            if self.pending.len() < total {
                break;
            }
            let rest = self.pending.split_off(total);
            let mut frame = mem::replace(&mut self.pending, rest);
            frame.drain(..FRAME_HEADER_LEN);
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Returns `true` when part of a frame is buffered.
    pub(crate) fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }

    fn declared_len(&self) -> Option<usize> {
        let header: [u8; FRAME_HEADER_LEN] = self.pending.get(..FRAME_HEADER_LEN)?.try_into().ok()?;
        let declared = u32::from_le_bytes(header);
        usize::try_from(declared).ok()
    }
}
