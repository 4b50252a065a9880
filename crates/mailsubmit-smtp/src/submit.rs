//! Transaction driver.
//!
//! One submission walks these stages in order, each an abort point:
//!
//! 1. Greeting, expect 2xx.
//! 2. `EHLO` + `STARTTLS` + upgrade, if TLS is not active and requested.
//! 3. `HELO` for [`Mechanism::None`], otherwise `EHLO` and authentication.
//! 4. `MAIL FROM` and one `RCPT TO` per non-excluded recipient.
//! 5. `DATA`, the filtered body, then `.`.
//! 6. `QUIT`, tolerating the server hanging up.
//!
//! Whatever happens, the transport is closed and the signal guard removed
//! before the [`Submission`] is returned.

use crate::auth::{self, Credentials, GssapiNegotiator, Mechanism, NoGssapi};
use crate::body::send_body;
use crate::command::Command;
use crate::config::SubmitOptions;
use crate::connection::{DryRunTransport, NetTransport, Session, Transport};
use crate::error::{Error, Result};
use crate::signal::{Interrupt, SignalGuard};
use crate::types::{Envelope, ReplyClass};
use tokio::io::{AsyncBufRead, AsyncSeek};
use tracing::Instrument;

/// Outcome of one submission.
#[derive(Debug)]
pub struct Submission {
    /// `Ok` if the server accepted the message and the session closed
    /// cleanly.
    pub outcome: Result<()>,
    /// Final line of the last reply the server sent, if any.
    pub last_reply: Option<String>,
}

impl Submission {
    fn failed(error: Error) -> Self {
        Self {
            outcome: Err(error),
            last_reply: None,
        }
    }

    /// Returns true if the message was submitted.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Submits envelopes with fixed credentials and options.
#[derive(Debug)]
pub struct Submitter<G = NoGssapi> {
    credentials: Credentials,
    options: SubmitOptions,
    gssapi: G,
}

impl Submitter {
    /// Creates a submitter without GSSAPI support.
    #[must_use]
    pub const fn new(credentials: Credentials, options: SubmitOptions) -> Self {
        Self {
            credentials,
            options,
            gssapi: NoGssapi,
        }
    }
}

impl<G: GssapiNegotiator> Submitter<G> {
    /// Replaces the GSSAPI negotiator.
    #[must_use]
    pub fn with_gssapi<H: GssapiNegotiator>(self, gssapi: H) -> Submitter<H> {
        Submitter {
            credentials: self.credentials,
            options: self.options,
            gssapi,
        }
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &SubmitOptions {
        &self.options
    }

    /// Opens the configured transport and submits one envelope.
    ///
    /// A termination or broken-pipe signal received before this returns
    /// aborts the session with [`Error::Interrupted`].
    pub async fn submit<R>(&mut self, envelope: &mut Envelope<R>) -> Submission
    where
        R: AsyncBufRead + AsyncSeek + Unpin,
    {
        let guard = match SignalGuard::install() {
            Ok(guard) => guard,
            Err(e) => return Submission::failed(e),
        };
        let mut interrupt = guard.interrupt();

        if self.options.dry_run {
            return self
                .submit_over(DryRunTransport::new(), envelope, interrupt)
                .await;
        }

        let opened = tokio::select! {
            biased;
            () = interrupt.raised() => Err(Error::Interrupted),
            opened = self.open() => opened,
        };
        match opened {
            Ok(transport) => self.submit_over(transport, envelope, interrupt).await,
            Err(e) => {
                tracing::warn!(url = %self.options.url, error = %e, "Cannot open connection");
                Submission::failed(e)
            }
        }
    }

    /// Submits one envelope over an already open transport.
    ///
    /// The transport is closed before returning. A close failure turns an
    /// otherwise successful submission into a failure.
    pub async fn submit_over<T, R>(
        &mut self,
        transport: T,
        envelope: &mut Envelope<R>,
        interrupt: Interrupt,
    ) -> Submission
    where
        T: Transport,
        R: AsyncBufRead + AsyncSeek + Unpin,
    {
        let tag = self.options.url.clone();
        let span = tracing::info_span!("submit", tag = %tag);

        async {
            let mut session = Session::new(transport, tag, interrupt);
            let mut outcome = drive(
                &mut session,
                envelope,
                &self.credentials,
                &self.options,
                &mut self.gssapi,
            )
            .await;

            if let Err(e) = session.close().await {
                if outcome.is_ok() {
                    outcome = Err(e);
                } else {
                    tracing::debug!(error = %e, "Close failed after abort");
                }
            }

            match &outcome {
                Ok(()) => tracing::info!(sender = %envelope.sender, "Message submitted"),
                Err(e) => tracing::warn!(error = %e, "Submission failed"),
            }

            Submission {
                outcome,
                last_reply: session.last_reply().map(str::to_owned),
            }
        }
        .instrument(span)
        .await
    }

    async fn open(&self) -> Result<NetTransport> {
        let endpoint = self.options.endpoint()?;
        NetTransport::open(&endpoint, self.options.connect_timeout()).await
    }
}

/// Submits one envelope with the given credentials and options.
///
/// Shorthand for [`Submitter::submit`] without GSSAPI support.
pub async fn submit<R>(
    envelope: &mut Envelope<R>,
    credentials: &Credentials,
    options: &SubmitOptions,
) -> Submission
where
    R: AsyncBufRead + AsyncSeek + Unpin,
{
    Submitter::new(credentials.clone(), options.clone())
        .submit(envelope)
        .await
}

async fn drive<T, R, G>(
    session: &mut Session<T>,
    envelope: &mut Envelope<R>,
    credentials: &Credentials,
    options: &SubmitOptions,
    gssapi: &mut G,
) -> Result<()>
where
    T: Transport,
    R: AsyncBufRead + AsyncSeek + Unpin,
    G: GssapiNegotiator,
{
    let hostname = options.hostname.as_str();

    session.expect(ReplyClass::PositiveCompletion, false).await?;

    if !session.tls_active() {
        if options.starttls {
            session
                .command(&ehlo(hostname), ReplyClass::PositiveCompletion)
                .await?;
            session
                .command(&Command::StartTls, ReplyClass::PositiveCompletion)
                .await?;
            session.start_tls().await?;
        } else if credentials.needs_tls {
            return Err(Error::TlsRequired);
        }
    }

    if credentials.mechanism == Mechanism::None {
        session
            .command(
                &Command::Helo {
                    hostname: hostname.to_string(),
                },
                ReplyClass::PositiveCompletion,
            )
            .await?;
    } else {
        session
            .command(&ehlo(hostname), ReplyClass::PositiveCompletion)
            .await?;
        auth::authenticate(session, credentials, gssapi).await?;
    }

    session
        .command(
            &Command::MailFrom {
                from: envelope.sender.clone(),
            },
            ReplyClass::PositiveCompletion,
        )
        .await?;

    for recipient in envelope.active_recipients() {
        session
            .command(
                &Command::RcptTo {
                    to: recipient.envelope_address(hostname),
                },
                ReplyClass::PositiveCompletion,
            )
            .await?;
    }

    tracing::debug!(size = envelope.size, "Sending message data");
    session
        .command(&Command::Data, ReplyClass::PositiveIntermediate)
        .await?;
    let sent = send_body(session, &mut envelope.body).await?;
    session.write_raw(b".\r\n").await?;
    session.expect(ReplyClass::PositiveCompletion, false).await?;
    tracing::debug!(size = envelope.size, sent, "Message data accepted");

    session.send(&Command::Quit).await?;
    if let Some(reply) = session
        .read_reply(ReplyClass::PositiveCompletion, true, false)
        .await?
        && reply.class != ReplyClass::PositiveCompletion
    {
        return Err(Error::unexpected(
            ReplyClass::PositiveCompletion,
            reply.class,
            reply.line,
        ));
    }

    Ok(())
}

fn ehlo(hostname: &str) -> Command {
    Command::Ehlo {
        hostname: hostname.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::LineTransport;
    use std::io::Cursor;
    use tokio_test::io::Builder;

    fn options() -> SubmitOptions {
        SubmitOptions::builder("smtp://mx.example.com")
            .hostname("host")
            .build()
    }

    #[tokio::test]
    async fn test_quit_eof_is_success() {
        let mock = Builder::new()
            .read(b"220 hi\r\n")
            .write(b"HELO host\r\n")
            .read(b"250 ok\r\n")
            .write(b"MAIL FROM:<me@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<you@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go\r\n")
            .write(b"Subject: s\r\n")
            .write(b"\r\n")
            .write(b"hi\r\n")
            .write(b".\r\n")
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .build();

        let mut envelope =
            Envelope::new("me@example.com", Cursor::new(b"Subject: s\n\nhi\n".to_vec()), 15)
                .to("you@example.com");
        let mut submitter = Submitter::new(Credentials::anonymous(), options());
        let submission = submitter
            .submit_over(LineTransport::new(mock), &mut envelope, Interrupt::never())
            .await;

        assert!(submission.is_success(), "{:?}", submission.outcome);
        assert_eq!(submission.last_reply.as_deref(), Some("250 queued"));
    }

    #[tokio::test]
    async fn test_quit_rejected_is_failure() {
        let mock = Builder::new()
            .read(b"220 hi\r\n")
            .write(b"HELO host\r\n")
            .read(b"250 ok\r\n")
            .write(b"MAIL FROM:<me@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go\r\n")
            .write(b".\r\n")
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"421 shutting down\r\n")
            .build();

        let mut envelope = Envelope::new("me@example.com", Cursor::new(Vec::new()), 0);
        let mut submitter = Submitter::new(Credentials::anonymous(), options());
        let submission = submitter
            .submit_over(LineTransport::new(mock), &mut envelope, Interrupt::never())
            .await;

        assert!(submission.outcome.unwrap_err().is_transient());
        assert_eq!(submission.last_reply.as_deref(), Some("421 shutting down"));
    }

    #[tokio::test]
    async fn test_bad_greeting_aborts() {
        let mock = Builder::new().read(b"554 go away\r\n").build();

        let mut envelope =
            Envelope::new("me@example.com", Cursor::new(Vec::new()), 0).to("you@example.com");
        let mut submitter = Submitter::new(Credentials::anonymous(), options());
        let submission = submitter
            .submit_over(LineTransport::new(mock), &mut envelope, Interrupt::never())
            .await;

        assert!(submission.outcome.unwrap_err().is_permanent());
        assert_eq!(submission.last_reply.as_deref(), Some("554 go away"));
    }

    #[tokio::test]
    async fn test_recipient_without_domain_gets_hostname() {
        let mock = Builder::new()
            .read(b"220 hi\r\n")
            .write(b"HELO host\r\n")
            .read(b"250 ok\r\n")
            .write(b"MAIL FROM:<me@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<alice@host>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<bob@host>\r\n")
            .read(b"452 too many\r\n")
            .build();

        let mut envelope = Envelope::new("me@example.com", Cursor::new(Vec::new()), 0)
            .to("alice")
            .excluded("hidden@example.com")
            .to("bob@");
        let mut submitter = Submitter::new(Credentials::anonymous(), options());
        let submission = submitter
            .submit_over(LineTransport::new(mock), &mut envelope, Interrupt::never())
            .await;

        assert!(submission.outcome.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn test_needs_tls_without_starttls() {
        let mock = Builder::new().read(b"220 hi\r\n").build();

        let mut envelope = Envelope::new("me@example.com", Cursor::new(Vec::new()), 0);
        let credentials = Credentials::new("bob", "secret", Mechanism::Plain).require_tls();
        let mut submitter = Submitter::new(credentials, options());
        let submission = submitter
            .submit_over(LineTransport::new(mock), &mut envelope, Interrupt::never())
            .await;

        assert!(matches!(submission.outcome, Err(Error::TlsRequired)));
    }

    #[tokio::test]
    async fn test_needs_tls_satisfied_by_encrypted_transport() {
        let mock = Builder::new()
            .read(b"220 hi\r\n")
            .write(b"EHLO host\r\n")
            .read(b"250 ok\r\n")
            .write(b"AUTH EXTERNAL =\r\n")
            .read(b"235 ok\r\n")
            .write(b"MAIL FROM:<me@example.com>\r\n")
            .read(b"550 no\r\n")
            .build();

        let mut envelope = Envelope::new("me@example.com", Cursor::new(Vec::new()), 0);
        let credentials = Credentials::new("", "", Mechanism::ExternAnon).require_tls();
        let mut submitter = Submitter::new(credentials, options());
        let submission = submitter
            .submit_over(LineTransport::encrypted(mock), &mut envelope, Interrupt::never())
            .await;

        assert!(submission.outcome.unwrap_err().is_permanent());
        assert_eq!(submission.last_reply.as_deref(), Some("550 no"));
    }

    #[tokio::test]
    async fn test_dry_run_submission() {
        let options = SubmitOptions::builder("smtp://mx.example.com")
            .hostname("host")
            .dry_run(true)
            .build();
        let credentials = Credentials::new("bob", "secret", Mechanism::Login);
        let mut envelope = Envelope::new(
            "me@example.com",
            Cursor::new(b"Bcc: x@y\r\nSubject: s\r\n\r\n.\r\n".to_vec()),
            30,
        )
        .to("you@example.com");

        let submission = submit(&mut envelope, &credentials, &options).await;
        assert!(submission.is_success(), "{:?}", submission.outcome);
        assert_eq!(submission.last_reply.as_deref(), Some("221 2.0.0 bye"));
    }
}
