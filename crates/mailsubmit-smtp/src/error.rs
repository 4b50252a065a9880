//! Error types for SMTP submission.

use std::io;

use crate::types::ReplyClass;

/// Result type alias for SMTP submission.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP submission error types.
///
/// Every variant aborts the whole submission; nothing is retried inside the
/// engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed, short or truncated reply.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server answered a critical step with the wrong reply class.
    #[error("Unexpected reply (expected {expected}xx): {line}")]
    UnexpectedStatus {
        /// Reply class the step required.
        expected: ReplyClass,
        /// Class the server actually sent.
        actual: ReplyClass,
        /// Verbatim final reply line, without its terminator.
        line: String,
    },

    /// Credential encoding would not fit in a command line.
    #[error("Credentials do not fit in a {capacity}-byte command line")]
    CredentialsOverflow {
        /// Line capacity in bytes, terminator included.
        capacity: usize,
    },

    /// Policy mandates TLS but the session is not encrypted.
    #[error("TLS is required but STARTTLS was not negotiated")]
    TlsRequired,

    /// TLS handshake or upgrade failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connect, read, write or close failure.
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    /// A termination or broken-pipe signal arrived during the session.
    #[error("Interrupted by signal")]
    Interrupted,

    /// Reading the message body failed.
    #[error("Message source error: {0}")]
    Stream(#[source] io::Error),

    /// External GSSAPI negotiation failed.
    #[error("GSSAPI negotiation failed: {0}")]
    Gssapi(String),

    /// Signal handlers could not be installed.
    #[error("Cannot install signal handlers: {0}")]
    Signal(#[source] io::Error),

    /// Invalid endpoint or options.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Creates an unexpected-status error from the reply that caused it.
    #[must_use]
    pub fn unexpected(expected: ReplyClass, actual: ReplyClass, line: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            expected,
            actual,
            line: line.into(),
        }
    }

    /// Returns true if the server rejected a step permanently (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus {
                actual: ReplyClass::PermanentNegative,
                ..
            }
        )
    }

    /// Returns true if the server rejected a step transiently (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus {
                actual: ReplyClass::TransientNegative,
                ..
            }
        )
    }
}
