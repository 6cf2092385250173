//! Bounded line reader.

use std::io::{self, Read};

use bytes::{Bytes, BytesMut};

use super::errors::DispatchError;

const CHUNK_BYTES: usize = 1024;

/// Splits a byte stream into `\n`-terminated lines no longer than `limit`.
pub(super) struct LineReader<R> {
    inner: R,
    buffer: BytesMut,
    limit: usize,
}

impl<R: Read> LineReader<R> {
    pub(super) fn new(inner: R, limit: usize) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(CHUNK_BYTES),
            limit,
        }
    }

    /// Returns the next line including its terminator, or the trailing
    /// unterminated bytes at EOF. `Ok(None)` once the stream is exhausted.
    pub(super) fn next_line(&mut self) -> Result<Option<Bytes>, DispatchError> {
        let mut chunk = [0_u8; CHUNK_BYTES];
        loop {
            if let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
                enforce_limit(newline + 1, self.limit)?;
                return Ok(Some(self.buffer.split_to(newline + 1).freeze()));
            }
            enforce_limit(self.buffer.len(), self.limit)?;

            let read = read_with_retry(&mut self.inner, &mut chunk)?;
            if read == 0 {
                return Ok((!self.buffer.is_empty()).then(|| self.buffer.split().freeze()));
            }
            self.buffer
                .extend_from_slice(chunk.get(..read).unwrap_or_default());
        }
    }
}

fn read_with_retry<R: Read>(stream: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

fn enforce_limit(size: usize, limit: usize) -> Result<(), DispatchError> {
    if size > limit {
        return Err(DispatchError::request_too_large(size, limit));
    }
    Ok(())
}
