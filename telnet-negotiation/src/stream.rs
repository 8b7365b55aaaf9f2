//! # TelnetStream - Negotiating Transport Wrapper
//!
//! `TelnetStream` wraps any duplex byte transport (a `TcpStream` in the
//! client, an in-memory fake in tests) and answers option negotiation as
//! chunks are read.
//!
//! ## Ordering
//!
//! Each `read` pulls one chunk from the transport, writes and flushes the
//! negotiation reply for that chunk, and only then hands the chunk to the
//! caller. Replies for chunk N therefore always reach the server before the
//! caller can react to chunk N or read chunk N+1.
//!
//! ## Pass-through
//!
//! Reads return the chunk exactly as received, IAC sequences included. The
//! decoders further down the pipeline do their own stripping.
//!
//! ```rust,no_run
//! use telnet_negotiation::TelnetStream;
//! use std::io::Read;
//! use std::net::TcpStream;
//!
//! fn main() -> std::io::Result<()> {
//!     let mut stream = TelnetStream::new(TcpStream::connect("127.0.0.1:23")?);
//!     let mut buffer = [0; 4096];
//!     let n = stream.read(&mut buffer)?;
//!     // buffer[..n] is the raw chunk; any replies were already sent
//!     Ok(())
//! }
//! ```

use crate::negotiation::{NegotiationPolicy, OptionNegotiator};
use crate::protocol::IAC;
use std::io::{self, Read, Write};
use tracing::trace;

/// A duplex transport that answers telnet negotiation on every read
#[derive(Debug)]
pub struct TelnetStream<S> {
    /// Underlying transport
    inner: S,

    /// Fixed-policy negotiator for this connection
    negotiator: OptionNegotiator,

    /// Total reply bytes written so far
    replies_sent: usize,
}

impl<S: Read + Write> TelnetStream<S> {
    /// Wrap a transport using the default negotiation policy
    pub fn new(inner: S) -> Self {
        Self::with_policy(inner, NegotiationPolicy::default())
    }

    pub fn with_policy(inner: S, policy: NegotiationPolicy) -> Self {
        Self {
            inner,
            negotiator: OptionNegotiator::with_policy(policy),
            replies_sent: 0,
        }
    }

    /// Write bytes without IAC escaping (vendor control requests)
    pub fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.inner.flush()
    }

    /// Number of negotiation reply bytes sent on this connection
    pub fn replies_sent(&self) -> usize {
        self.replies_sent
    }

    /// Get access to the underlying transport
    ///
    /// **Warning**: Direct access bypasses telnet processing. Use with caution.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Get mutable access to the underlying transport
    ///
    /// **Warning**: Direct access bypasses telnet processing. Use with caution.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Extract the underlying transport, consuming the TelnetStream
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Read + Write> Read for TelnetStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            return Ok(0);
        }

        let reply = self.negotiator.negotiate(&buf[..n]);
        if !reply.is_empty() {
            trace!(bytes = reply.len(), "sending negotiation reply");
            self.inner.write_all(reply.as_bytes())?;
            self.inner.flush()?;
            self.replies_sent += reply.len();
        }

        Ok(n)
    }
}

/// Outbound application data has data bytes of 255 doubled (RFC 854).
impl<S: Read + Write> Write for TelnetStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !buf.contains(&IAC) {
            return self.inner.write(buf);
        }

        let mut escaped = Vec::with_capacity(buf.len() + 4);
        for &byte in buf {
            if byte == IAC {
                escaped.push(IAC);
            }
            escaped.push(byte);
        }
        self.inner.write_all(&escaped)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
