//! Authentication strategy.
//!
//! The mechanism is chosen by the caller's [`Credentials`], never negotiated
//! from the server's EHLO capabilities.
//!
//! | Mechanism | Exchange |
//! |---|---|
//! | None | nothing; the driver greets with `HELO` |
//! | Plain | `AUTH PLAIN` → 3, base64 `\0user\0pass` → 2 |
//! | `OAuthBearer` | `AUTH XOAUTH2 <blob>` → 2 |
//! | Login | `AUTH LOGIN` → 3, user → 3, password → 2 |
//! | `CramMd5` | `AUTH CRAM-MD5` → 3 + challenge, response → 2 |
//! | External | `AUTH EXTERNAL <user>` → 2 |
//! | `ExternAnon` | `AUTH EXTERNAL =` → 2 |
//! | Gssapi | delegated to a [`GssapiNegotiator`] |

pub mod sasl;

pub use sasl::AUTH_LINE_CAPACITY;

use crate::command::Command;
use crate::connection::{Session, Transport};
use crate::error::{Error, Result};
use crate::types::ReplyClass;
use serde::Deserialize;
use std::future::Future;

/// Authentication mechanism selected by the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mechanism {
    /// No authentication.
    #[default]
    None,
    /// PLAIN (RFC 4616).
    Plain,
    /// LOGIN, obsolete but still deployed.
    Login,
    /// CRAM-MD5 (RFC 2195).
    CramMd5,
    /// EXTERNAL with the user as authorization identity.
    External,
    /// EXTERNAL with an empty authorization identity.
    #[serde(rename = "external-anonymous")]
    ExternAnon,
    /// `OAuth2` bearer token, sent as `XOAUTH2`.
    #[serde(rename = "oauthbearer", alias = "xoauth2")]
    OAuthBearer,
    /// Kerberos through an external negotiator.
    Gssapi,
}

impl Mechanism {
    /// SASL name used on the wire.
    #[must_use]
    pub const fn sasl_name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::External | Self::ExternAnon => "EXTERNAL",
            Self::OAuthBearer => "XOAUTH2",
            Self::Gssapi => "GSSAPI",
        }
    }
}

impl std::fmt::Display for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sasl_name())
    }
}

/// Credentials supplied by the caller. Read-only to the engine.
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Credentials {
    /// Authentication identity.
    #[serde(default)]
    pub user: String,
    /// Password or bearer token.
    #[serde(default)]
    pub password: String,
    /// Mechanism to use.
    #[serde(default)]
    pub mechanism: Mechanism,
    /// Refuse to continue without TLS.
    #[serde(default)]
    pub needs_tls: bool,
}

impl Credentials {
    /// Creates credentials for the given mechanism.
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>, mechanism: Mechanism) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            mechanism,
            needs_tls: false,
        }
    }

    /// Credentials that skip authentication.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Requires TLS before authenticating.
    #[must_use]
    pub const fn require_tls(mut self) -> Self {
        self.needs_tls = true;
        self
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("mechanism", &self.mechanism)
            .field("needs_tls", &self.needs_tls)
            .finish()
    }
}

/// External GSSAPI negotiation.
pub trait GssapiNegotiator {
    /// Runs the whole GSSAPI exchange on the session.
    fn negotiate<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<()>>;
}

/// Negotiator used when none is configured; always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGssapi;

impl GssapiNegotiator for NoGssapi {
    async fn negotiate<T: Transport>(
        &mut self,
        _session: &mut Session<T>,
        _credentials: &Credentials,
    ) -> Result<()> {
        Err(Error::Gssapi("No GSSAPI negotiator configured".into()))
    }
}

/// Runs the exchange for the credentials' mechanism.
///
/// Encoded responses are computed before the mechanism's first command, so
/// an oversized credential fails without touching the wire.
///
/// # Errors
///
/// Returns [`Error::CredentialsOverflow`], [`Error::UnexpectedStatus`] on a
/// rejected step, or any session error.
pub async fn authenticate<T, G>(
    session: &mut Session<T>,
    credentials: &Credentials,
    gssapi: &mut G,
) -> Result<()>
where
    T: Transport,
    G: GssapiNegotiator,
{
    let mechanism = credentials.mechanism;
    tracing::debug!(tag = %session.tag(), %mechanism, "Authenticating");

    match mechanism {
        Mechanism::None => {}
        Mechanism::Plain => {
            let response = sasl::encode(
                "",
                &sasl::plain_blob(&credentials.user, &credentials.password),
            )?;
            session
                .command(&auth(mechanism, None), ReplyClass::PositiveIntermediate)
                .await?;
            session
                .command(
                    &Command::SaslResponse(response),
                    ReplyClass::PositiveCompletion,
                )
                .await?;
        }
        Mechanism::OAuthBearer => {
            let blob = sasl::xoauth2_blob(&credentials.user, &credentials.password);
            let response = sasl::encode("AUTH XOAUTH2 ", &blob)?;
            session
                .command(
                    &auth(mechanism, Some(response)),
                    ReplyClass::PositiveCompletion,
                )
                .await?;
        }
        Mechanism::Login => {
            let user = sasl::encode("", credentials.user.as_bytes())?;
            let password = sasl::encode("", credentials.password.as_bytes())?;
            session
                .command(&auth(mechanism, None), ReplyClass::PositiveIntermediate)
                .await?;
            session
                .command(&Command::SaslResponse(user), ReplyClass::PositiveIntermediate)
                .await?;
            session
                .command(
                    &Command::SaslResponse(password),
                    ReplyClass::PositiveCompletion,
                )
                .await?;
        }
        Mechanism::CramMd5 => {
            session.send(&auth(mechanism, None)).await?;
            let challenge = session
                .expect(ReplyClass::PositiveIntermediate, true)
                .await?
                .data
                .unwrap_or_default();
            let response =
                sasl::cram_md5_response(&credentials.user, &credentials.password, &challenge)?;
            session
                .command(
                    &Command::SaslResponse(response),
                    ReplyClass::PositiveCompletion,
                )
                .await?;
        }
        Mechanism::External => {
            let response = sasl::encode("AUTH EXTERNAL ", credentials.user.as_bytes())?;
            session
                .command(
                    &auth(mechanism, Some(response)),
                    ReplyClass::PositiveCompletion,
                )
                .await?;
        }
        Mechanism::ExternAnon => {
            session
                .command(
                    &auth(mechanism, Some("=".to_string())),
                    ReplyClass::PositiveCompletion,
                )
                .await?;
        }
        Mechanism::Gssapi => gssapi.negotiate(session, credentials).await?,
    }

    Ok(())
}

const fn auth(mechanism: Mechanism, initial_response: Option<String>) -> Command {
    Command::Auth {
        mechanism: mechanism.sasl_name(),
        initial_response,
    }
}
