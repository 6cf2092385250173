//! First-line protocol detection for fresh connections.
//!
//! A connection starts out sniffing: inbound bytes are buffered until the
//! first `\n`. A line opening with `CONNECT` or `STOMP` selects the raw
//! subscription pipeline; anything else selects the request pipeline. The
//! decision is made once and every byte read while sniffing is replayed to
//! the chosen pipeline ahead of the live stream.

mod detector;
mod multiplexer;
mod replay;

use std::fmt;

pub use self::detector::{ProtocolDetector, SniffError, Sniffed, sniff};
pub use self::multiplexer::{ClosingPipeline, Pipeline, ProtocolMultiplexer};
pub use self::replay::ReplayStream;

pub(crate) const PROTOCOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::protocol");

const STOMP_PREFIXES: [&[u8]; 2] = [b"CONNECT", b"STOMP"];

/// Pipelines a connection can be handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Raw subscription framing.
    Stomp,
    /// HTTP and everything else.
    Http,
}

impl Protocol {
    /// Classifies a connection by its first line.
    #[must_use]
    pub fn classify(line: &[u8]) -> Self {
        if STOMP_PREFIXES.iter().any(|prefix| line.starts_with(prefix)) {
            Self::Stomp
        } else {
            Self::Http
        }
    }

    /// Lower-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stomp => "stomp",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
