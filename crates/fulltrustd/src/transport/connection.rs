//! Shared write side of the peer connection.

use std::fmt;
use std::io::{self, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use fulltrust_envelope::{Envelope, encode};

use super::{ConnectionError, TRANSPORT_TARGET, encode_frame};

/// The single live peer connection.
///
/// Dispatch workers and handlers share one instance. Every envelope is
/// written as one frame under the writer lock, so concurrent replies never
/// interleave on the wire.
pub struct Connection {
    writer: Mutex<Box<dyn Write + Send>>,
    stream: Option<UnixStream>,
    connected: AtomicBool,
    out_buffer_size: usize,
}

impl Connection {
    /// Wraps an accepted stream.
    pub(crate) fn from_stream(
        stream: &UnixStream,
        out_buffer_size: usize,
    ) -> io::Result<Self> {
        let writer = stream.try_clone()?;
        let control = stream.try_clone()?;
        Ok(Self {
            writer: Mutex::new(Box::new(writer)),
            stream: Some(control),
            connected: AtomicBool::new(true),
            out_buffer_size,
        })
    }

    /// Builds a connection over an arbitrary writer.
    ///
    /// Useful for exercising handlers without a socket.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            stream: None,
            connected: AtomicBool::new(true),
            out_buffer_size: 0,
        }
    }

    /// Encodes and writes `envelope` as one frame.
    pub fn send(&self, envelope: &Envelope) -> Result<(), ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::Disconnected);
        }
        let payload = encode(envelope)?;
        let frame = encode_frame(&payload, self.out_buffer_size).ok_or(ConnectionError::TooLarge {
            size: payload.len(),
        })?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&frame)?;
        writer.flush()?;
        debug!(
            target: TRANSPORT_TARGET,
            bytes = frame.len(),
            "envelope sent"
        );
        Ok(())
    }

    /// Sends `reply`, echoing the correlation token carried by `request`.
    pub fn reply(&self, request: &Envelope, reply: Envelope) -> Result<(), ConnectionError> {
        self.send(&reply.correlated_with(request))
    }

    /// Returns `false` once the read side has observed disconnection.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Shuts down both directions, unblocking any pending read.
    pub(crate) fn close(&self) {
        self.mark_disconnected();
        if let Some(stream) = &self.stream
            && let Err(error) = stream.shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            warn!(
                target: TRANSPORT_TARGET,
                error = %error,
                "failed to shut down peer connection"
            );
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Connection")
            .field("connected", &self.is_connected())
            .field("out_buffer_size", &self.out_buffer_size)
            .finish_non_exhaustive()
    }
}
