//! Submission configuration types.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Connection security mode of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plaintext; may be upgraded with STARTTLS.
    #[default]
    None,
    /// TLS from the start (port 465).
    Implicit,
}

/// Server address parsed from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
}

impl Endpoint {
    /// Parses `smtp://`, `smtps://`, `submission://` or bare `host[:port]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on an unknown scheme, empty host or bad port.
    pub fn parse(url: &str) -> Result<Self> {
        let (security, default_port, rest) = match url.split_once("://") {
            Some((scheme, rest)) => match scheme.to_ascii_lowercase().as_str() {
                "smtp" => (Security::None, 25, rest),
                "submission" => (Security::None, 587, rest),
                "smtps" => (Security::Implicit, 465, rest),
                other => return Err(Error::Config(format!("Unknown URL scheme: {other}"))),
            },
            None => (Security::None, 25, url),
        };

        let authority = rest.trim_end_matches('/');
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or_else(|| Error::Config(format!("Invalid port in URL: {url}")))?;
                (host, port)
            }
            None => (authority, default_port),
        };

        if host.is_empty() {
            return Err(Error::Config(format!("Missing host in URL: {url}")));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            security,
        })
    }
}

/// Options for one submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubmitOptions {
    /// Server URL, see [`Endpoint::parse`].
    pub url: String,
    /// Local hostname for `HELO`/`EHLO` and for recipients without a domain.
    pub hostname: String,
    /// Request STARTTLS before authenticating.
    pub starttls: bool,
    /// Log the session instead of connecting.
    pub dry_run: bool,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            url: "smtp://localhost".to_string(),
            hostname: "localhost".to_string(),
            starttls: false,
            dry_run: false,
            connect_timeout_secs: 30,
        }
    }
}

impl SubmitOptions {
    /// Creates options for the given server URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Creates an options builder.
    #[must_use]
    pub fn builder(url: impl Into<String>) -> SubmitOptionsBuilder {
        SubmitOptionsBuilder::new(url)
    }

    /// Parses the configured URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL is invalid.
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.url)
    }

    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Builder for submission options.
#[derive(Debug, Clone)]
pub struct SubmitOptionsBuilder {
    options: SubmitOptions,
}

impl SubmitOptionsBuilder {
    /// Creates a new builder with the given server URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            options: SubmitOptions::new(url),
        }
    }

    /// Sets the local hostname.
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.options.hostname = hostname.into();
        self
    }

    /// Requests STARTTLS.
    #[must_use]
    pub const fn starttls(mut self, starttls: bool) -> Self {
        self.options.starttls = starttls;
        self
    }

    /// Selects the dry-run transport.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.options.dry_run = dry_run;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout_secs = timeout.as_secs();
        self
    }

    /// Builds the options.
    #[must_use]
    pub fn build(self) -> SubmitOptions {
        self.options
    }
}
