//! A stream that yields already-consumed bytes before live ones.

use std::io::{self, Read, Write};

use bytes::{Buf, Bytes};

/// Replays `prefix` ahead of reads from the wrapped stream. Writes pass
/// straight through.
#[derive(Debug)]
pub struct ReplayStream<S> {
    prefix: Bytes,
    inner: S,
}

impl<S> ReplayStream<S> {
    /// Wraps `inner`, replaying `prefix` first.
    pub fn new(prefix: Bytes, inner: S) -> Self {
        Self { prefix, inner }
    }

    /// Bytes still waiting to be replayed.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.prefix
    }

    /// The wrapped stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Splits into the unreplayed prefix and the wrapped stream.
    pub fn into_parts(self) -> (Bytes, S) {
        (self.prefix, self.inner)
    }
}

impl<S: Read> Read for ReplayStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.prefix.is_empty() {
            return self.inner.read(buf);
        }
        let count = self.prefix.len().min(buf.len());
        if let (Some(target), Some(source)) = (buf.get_mut(..count), self.prefix.get(..count)) {
            target.copy_from_slice(source);
        }
        self.prefix.advance(count);
        Ok(count)
    }
}

impl<S: Write> Write for ReplayStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
