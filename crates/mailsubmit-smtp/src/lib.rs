//! # mailsubmit-smtp
//!
//! Submits exactly one message over exactly one SMTP session (RFC 5321).
//!
//! ## Features
//!
//! - **Strict request/response**: no pipelining, no retries, no pooling
//! - **TLS**: implicit TLS (port 465) and STARTTLS via rustls
//! - **Authentication**: PLAIN, LOGIN, CRAM-MD5, EXTERNAL, XOAUTH2, and
//!   GSSAPI through a pluggable negotiator
//! - **Transparency**: `Bcc:` suppression, dot-stuffing, CRLF normalization
//! - **Signal safety**: SIGTERM/SIGPIPE abort the session cleanly
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsubmit_smtp::{Credentials, Envelope, Mechanism, SubmitOptions, submit};
//! use std::io::Cursor;
//!
//! #[tokio::main]
//! async fn main() {
//!     let message = b"Subject: Test\r\n\r\nHello, World!\r\n".to_vec();
//!     let size = message.len() as u64;
//!     let mut envelope = Envelope::new("sender@example.com", Cursor::new(message), size)
//!         .to("recipient@example.com");
//!
//!     let options = SubmitOptions::builder("submission://smtp.example.com")
//!         .hostname("client.example.com")
//!         .starttls(true)
//!         .build();
//!     let credentials = Credentials::new("user", "password", Mechanism::Plain).require_tls();
//!
//!     let submission = submit(&mut envelope, &credentials, &options).await;
//!     println!("{}: {:?}", submission.is_success(), submission.last_reply);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`auth`]: Authentication strategy and SASL encodings
//! - [`body`]: Message body filter
//! - [`command`]: SMTP command builders
//! - [`connection`]: Transports and the per-submission session
//! - [`parser`]: Reply line parsing
//! - [`signal`]: Signal guard and interrupt flag
//! - [`submit`]: Transaction driver
//! - [`types`]: Replies, recipients and envelopes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod body;
pub mod command;
mod config;
pub mod connection;
mod error;
pub mod parser;
pub mod signal;
pub mod submit;
pub mod types;

pub use auth::{AUTH_LINE_CAPACITY, Credentials, GssapiNegotiator, Mechanism, NoGssapi};
pub use config::{Endpoint, Security, SubmitOptions, SubmitOptionsBuilder};
pub use connection::{DryRunTransport, LineTransport, NetTransport, Session, Transport};
pub use error::{Error, Result};
pub use signal::{Interrupt, SignalGuard, Trigger};
pub use submit::{Submission, Submitter, submit};
pub use types::{Envelope, Recipient, Reply, ReplyClass};
