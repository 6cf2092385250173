//! The sniffing state machine.

use std::io::{self, Read};

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use super::Protocol;

const READ_CHUNK: usize = 1024;

/// Failures while sniffing a connection.
#[derive(Debug, Error)]
pub enum SniffError {
    /// No newline arrived within the limit.
    #[error("first line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
    /// Bytes were fed after the decision.
    #[error("protocol already detected")]
    AlreadyDispatched,
    /// Reading from the connection failed.
    #[error("failed to read connection: {0}")]
    Io(#[from] io::Error),
}

/// The decision and every byte consumed to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sniffed {
    pub protocol: Protocol,
    pub replay: Bytes,
}

/// Buffers inbound bytes until the first line is complete, then decides once.
#[derive(Debug)]
pub enum ProtocolDetector {
    Sniffing { buffer: BytesMut, limit: usize },
    Dispatched,
}

impl ProtocolDetector {
    /// Starts sniffing, allowing up to `limit` bytes before the first `\n`.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self::Sniffing {
            buffer: BytesMut::new(),
            limit,
        }
    }

    /// Adds `chunk`. Returns the decision once a full line is buffered.
    ///
    /// # Errors
    ///
    /// Returns [`SniffError::LineTooLong`] when the limit is exceeded without
    /// a newline and [`SniffError::AlreadyDispatched`] after the decision.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<Sniffed>, SniffError> {
        let Self::Sniffing { buffer, limit } = self else {
            return Err(SniffError::AlreadyDispatched);
        };
        let searched = buffer.len();
        buffer.extend_from_slice(chunk);

        let newline = buffer
            .get(searched..)
            .and_then(|fresh| fresh.iter().position(|byte| *byte == b'\n'))
            .map(|offset| searched + offset);
        let Some(end) = newline else {
            if buffer.len() > *limit {
                return Err(SniffError::LineTooLong { limit: *limit });
            }
            return Ok(None);
        };

        let protocol = Protocol::classify(buffer.get(..=end).unwrap_or_default());
        let replay = std::mem::take(buffer).freeze();
        *self = Self::Dispatched;
        Ok(Some(Sniffed { protocol, replay }))
    }

    /// Returns `true` once the decision has been made.
    #[must_use]
    pub const fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched)
    }
}

/// Reads from `stream` until the first line decides the protocol.
///
/// Returns `None` when the stream ends before a full line.
///
/// # Errors
///
/// Returns [`SniffError`] for over-long lines and read failures.
pub fn sniff<S: Read>(stream: &mut S, limit: usize) -> Result<Option<Sniffed>, SniffError> {
    let mut detector = ProtocolDetector::new(limit);
    let mut chunk = [0_u8; READ_CHUNK];
    loop {
        let read = match stream.read(&mut chunk) {
            Ok(0) => return Ok(None),
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        };
        if let Some(sniffed) = detector.feed(chunk.get(..read).unwrap_or_default())? {
            return Ok(Some(sniffed));
        }
    }
}
