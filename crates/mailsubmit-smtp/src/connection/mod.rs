//! Transports and the per-submission session.
//!
//! The engine only ever talks to a [`Transport`]: it reads raw reply lines,
//! writes command lines, asks for a TLS upgrade and closes the channel.
//! [`NetTransport`] does this over TCP and rustls, [`LineTransport`] over
//! any async byte stream, and [`DryRunTransport`] logs instead of sending.

mod dry_run;
mod session;
mod stream;

pub use dry_run::DryRunTransport;
pub use session::Session;
pub use stream::{LineTransport, NetTransport};

use crate::error::Result;
use std::future::Future;
use std::io;

/// Line-oriented channel to an SMTP server.
pub trait Transport {
    /// Appends the next raw line, terminator included, to `buf`.
    ///
    /// Returns the number of bytes read; `0` means end of stream.
    fn read_line(&mut self, buf: &mut Vec<u8>) -> impl Future<Output = io::Result<usize>>;

    /// Writes `line` exactly as given and flushes it.
    fn write_line(&mut self, line: &[u8]) -> impl Future<Output = io::Result<()>>;

    /// Negotiates TLS on the existing channel after a successful `STARTTLS`.
    fn upgrade_to_tls(&mut self) -> impl Future<Output = Result<()>>;

    /// Shuts the channel down.
    fn close(&mut self) -> impl Future<Output = io::Result<()>>;

    /// Returns true if the channel is already encrypted.
    fn is_tls(&self) -> bool;
}
