//! Per-submission SMTP session.

use super::Transport;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{check_line, is_continuation, parse_final_line, strip_terminator};
use crate::signal::Interrupt;
use crate::types::{Reply, ReplyClass};

/// Initial capacity of the reply line buffer.
const REPLY_BUFFER_SIZE: usize = 512;

/// One SMTP session over an exclusively owned transport.
///
/// Every transport operation first checks the session's [`Interrupt`] and
/// then races it, so a raised flag ends the session with
/// [`Error::Interrupted`] at the next I/O boundary.
#[derive(Debug)]
pub struct Session<T> {
    transport: T,
    buf: Vec<u8>,
    tls_active: bool,
    tag: String,
    interrupt: Interrupt,
    last_reply: Option<String>,
}

impl<T: Transport> Session<T> {
    /// Creates a session. TLS counts as active if the transport is already
    /// encrypted.
    pub fn new(transport: T, tag: impl Into<String>, interrupt: Interrupt) -> Self {
        let tls_active = transport.is_tls();
        Self {
            transport,
            buf: Vec::with_capacity(REPLY_BUFFER_SIZE),
            tls_active,
            tag: tag.into(),
            interrupt,
            last_reply: None,
        }
    }

    /// Returns the diagnostic tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns true once TLS is active. Never reset within a session.
    #[must_use]
    pub const fn tls_active(&self) -> bool {
        self.tls_active
    }

    /// Returns the final line of the most recent reply.
    #[must_use]
    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    /// Writes raw bytes to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] or [`Error::Transport`].
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        if self.interrupt.is_raised() {
            return Err(Error::Interrupted);
        }
        let transport = &mut self.transport;
        let interrupt = &mut self.interrupt;
        tokio::select! {
            biased;
            () = interrupt.raised() => Err(Error::Interrupted),
            written = transport.write_line(data) => written.map_err(Error::Transport),
        }
    }

    /// Writes a command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] or [`Error::Transport`].
    pub async fn send(&mut self, command: &Command) -> Result<()> {
        tracing::debug!(tag = %self.tag, command = %command.redacted(), "C:");
        self.write_raw(&command.serialize()).await
    }

    /// Reads one logical reply.
    ///
    /// Returns `None` if the stream ended before any reply and
    /// `tolerate_eof` is set. A class other than `expected` is not an error
    /// here; the caller decides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for short lines, end of stream inside a
    /// reply, or a data request the final line cannot satisfy.
    pub async fn read_reply(
        &mut self,
        expected: ReplyClass,
        tolerate_eof: bool,
        want_data: bool,
    ) -> Result<Option<Reply>> {
        loop {
            self.buf.clear();
            if self.read_line().await? == 0 {
                if tolerate_eof {
                    tracing::debug!(tag = %self.tag, "Connection closed by server");
                    return Ok(None);
                }
                return Err(Error::Protocol("Connection closed during reply".into()));
            }

            tracing::trace!(
                tag = %self.tag,
                line = %String::from_utf8_lossy(strip_terminator(&self.buf)),
                "S:"
            );
            check_line(&self.buf)?;
            if !is_continuation(&self.buf) {
                break;
            }
        }

        let reply = parse_final_line(&self.buf, expected, want_data)?;
        if reply.class != expected {
            tracing::warn!(
                tag = %self.tag,
                expected = %expected,
                line = %reply.line,
                "Unexpected reply"
            );
        }
        self.last_reply = Some(reply.line.clone());
        Ok(Some(reply))
    }

    /// Reads a reply and requires its class to be `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedStatus`] with the server line on mismatch,
    /// or any error of [`Session::read_reply`].
    pub async fn expect(&mut self, expected: ReplyClass, want_data: bool) -> Result<Reply> {
        let reply = self
            .read_reply(expected, false, want_data)
            .await?
            .ok_or_else(|| Error::Protocol("Connection closed during reply".into()))?;

        if reply.class == expected {
            Ok(reply)
        } else {
            Err(Error::unexpected(expected, reply.class, reply.line))
        }
    }

    /// Sends a command and requires a reply of class `expected`.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Session::send`] or [`Session::expect`].
    pub async fn command(&mut self, command: &Command, expected: ReplyClass) -> Result<Reply> {
        self.send(command).await?;
        self.expect(expected, false).await
    }

    /// Upgrades the transport to TLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] or the transport's TLS error.
    pub async fn start_tls(&mut self) -> Result<()> {
        if self.interrupt.is_raised() {
            return Err(Error::Interrupted);
        }
        let transport = &mut self.transport;
        let interrupt = &mut self.interrupt;
        tokio::select! {
            biased;
            () = interrupt.raised() => return Err(Error::Interrupted),
            upgraded = transport.upgrade_to_tls() => upgraded?,
        }
        self.tls_active = true;
        tracing::debug!(tag = %self.tag, "TLS active");
        Ok(())
    }

    /// Closes the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the shutdown fails.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await.map_err(Error::Transport)
    }

    async fn read_line(&mut self) -> Result<usize> {
        if self.interrupt.is_raised() {
            return Err(Error::Interrupted);
        }
        let transport = &mut self.transport;
        let interrupt = &mut self.interrupt;
        let buf = &mut self.buf;
        tokio::select! {
            biased;
            () = interrupt.raised() => Err(Error::Interrupted),
            read = transport.read_line(buf) => read.map_err(Error::Transport),
        }
    }
}
