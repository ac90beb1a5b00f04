//! Minimal UI-side client speaking the framed envelope protocol.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;

use fulltrust_envelope::{Envelope, decode};

use crate::transport::{FrameAssembler, encode_frame};

const CONNECT_POLL: Duration = Duration::from_millis(10);

/// Connected test peer.
pub struct PeerClient {
    stream: UnixStream,
    assembler: FrameAssembler,
    replies: Vec<Envelope>,
}

impl PeerClient {
    /// Connects to `path`, retrying until the helper has bound it.
    pub fn connect(path: &Utf8Path, timeout: Duration) -> io::Result<Self> {
        let deadline = Instant::now() + timeout;
        loop {
            match UnixStream::connect(path.as_std_path()) {
                Ok(stream) => {
                    return Ok(Self {
                        stream,
                        assembler: FrameAssembler::new(1024 * 1024),
                        replies: Vec::new(),
                    });
                }
                Err(error) if Instant::now() >= deadline => return Err(error),
                Err(_) => thread::sleep(CONNECT_POLL),
            }
        }
    }

    /// Writes every message as its own frame in a single write.
    pub fn send_all(&mut self, messages: &[String]) -> io::Result<()> {
        let mut bytes = Vec::new();
        for message in messages {
            let frame = encode_frame(message.as_bytes(), 0)
                .ok_or_else(|| io::Error::other("message too large"))?;
            bytes.extend_from_slice(&frame);
        }
        self.stream.write_all(&bytes)?;
        self.stream.flush()
    }

    /// Waits up to `timeout` for the next reply.
    pub fn next_reply(&mut self, timeout: Duration) -> io::Result<Option<Envelope>> {
        if !self.replies.is_empty() {
            return Ok(Some(self.replies.remove(0)));
        }
        self.stream.set_read_timeout(Some(timeout))?;
        let mut buffer = [0_u8; 512];
        loop {
            let read = match self.stream.read(&mut buffer) {
                Ok(0) => return Ok(None),
                Ok(read) => read,
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Ok(None);
                }
                Err(error) => return Err(error),
            };
            let frames = self
                .assembler
                .push(buffer.get(..read).unwrap_or_default())
                .map_err(io::Error::other)?;
            for frame in frames {
                let reply = decode(&frame).map_err(io::Error::other)?;
                self.replies.push(reply);
            }
            if !self.replies.is_empty() {
                return Ok(Some(self.replies.remove(0)));
            }
        }
    }

    /// Reads until the helper closes the connection, returning what arrived.
    pub fn drain_until_closed(&mut self, timeout: Duration) -> io::Result<Vec<u8>> {
        self.stream.set_read_timeout(Some(timeout))?;
        let mut received = Vec::new();
        self.stream.read_to_end(&mut received)?;
        Ok(received)
    }

    /// Closes both directions, as a UI would on exit.
    pub fn disconnect(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
