//! Read loop reassembling envelopes from partial reads.

use std::io::{self, Read};

use tracing::{debug, warn};

use super::{FrameAssembler, FrameError, TRANSPORT_TARGET};

/// Why the read loop stopped.
#[derive(Debug)]
pub(crate) enum ReadLoopExit {
    /// The peer closed its end; `partial_bytes` were buffered but incomplete.
    Disconnected { partial_bytes: bool },
    /// A read failed.
    Failed(io::Error),
    /// The peer announced a frame beyond the size limit.
    Oversize(FrameError),
}

/// Sequential reader for one connection.
///
/// Only one read is ever in flight. Each completed message is handed to the
/// caller's sink before the next read is issued, and the sink is expected to
/// return without waiting for dispatch to finish.
pub(crate) struct ReadLoop<R> {
    reader: R,
    in_buffer_size: usize,
    assembler: FrameAssembler,
}

impl<R: Read> ReadLoop<R> {
    pub(crate) fn new(reader: R, in_buffer_size: usize, max_message_bytes: usize) -> Self {
        Self {
            reader,
            in_buffer_size: in_buffer_size.max(1),
            assembler: FrameAssembler::new(max_message_bytes),
        }
    }

    /// Reads until the connection ends, passing each message's text to `sink`.
    pub(crate) fn run(mut self, mut sink: impl FnMut(String)) -> ReadLoopExit {
        let mut buffer = vec![0_u8; self.in_buffer_size];
        loop {
            let read = match read_with_retry(&mut self.reader, &mut buffer) {
                Ok(0) => {
                    return ReadLoopExit::Disconnected {
                        partial_bytes: self.assembler.has_partial(),
                    };
                }
                Ok(read) => read,
                Err(error) => return ReadLoopExit::Failed(error),
            };
            let chunk = buffer.get(..read).unwrap_or_default();
            let frames = match self.assembler.push(chunk) {
                Ok(frames) => frames,
                Err(error) => return ReadLoopExit::Oversize(error),
            };
            for frame in frames {
                debug!(
                    target: TRANSPORT_TARGET,
                    bytes = frame.len(),
                    "message received"
                );
                sink(message_text(frame));
            }
        }
    }
}

fn read_with_retry(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Decodes a frame as UTF-8 and strips trailing NUL padding.
fn message_text(frame: Vec<u8>) -> String {
    let mut text = match String::from_utf8(frame) {
        Ok(text) => text,
        Err(error) => {
            warn!(
                target: TRANSPORT_TARGET,
                "message is not valid UTF-8; replacing invalid sequences"
            );
            String::from_utf8_lossy(error.as_bytes()).into_owned()
        }
    };
    let trimmed = text.trim_end_matches('\0').len();
    text.truncate(trimmed);
    text
}
