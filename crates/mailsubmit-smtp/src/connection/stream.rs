//! Low-level SMTP stream handling.

use super::Transport;
use crate::config::{Endpoint, Security};
use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    client::TlsStream,
    rustls::{ClientConfig, RootCertStore},
};

/// Buffered line transport over any async byte stream.
///
/// Cannot negotiate TLS on its own; wrap an already encrypted stream if
/// needed.
#[derive(Debug)]
pub struct LineTransport<S> {
    reader: BufReader<S>,
    tls: bool,
}

impl<S> LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a plaintext stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
            tls: false,
        }
    }

    /// Wraps a stream that is already encrypted.
    pub fn encrypted(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
            tls: true,
        }
    }

    /// Returns the underlying stream, refusing if unread bytes are buffered.
    fn into_inner(self) -> Result<S> {
        if !self.reader.buffer().is_empty() {
            return Err(Error::Tls(
                "Server sent data after STARTTLS before the handshake".into(),
            ));
        }
        Ok(self.reader.into_inner())
    }
}

impl<S> Transport for LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        self.reader.read_until(b'\n', buf).await
    }

    async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(line).await?;
        stream.flush().await
    }

    async fn upgrade_to_tls(&mut self) -> Result<()> {
        Err(Error::Tls("Transport cannot negotiate TLS".into()))
    }

    async fn close(&mut self) -> io::Result<()> {
        self.reader.get_mut().shutdown().await
    }

    fn is_tls(&self) -> bool {
        self.tls
    }
}

/// SMTP network transport (TCP or TLS).
#[derive(Debug)]
pub enum NetTransport {
    /// Plain TCP connection.
    Tcp {
        /// Server hostname, kept for certificate verification on upgrade.
        host: String,
        /// Line-buffered socket.
        stream: LineTransport<TcpStream>,
    },
    /// TLS-encrypted connection.
    Tls(Box<LineTransport<TlsStream<TcpStream>>>),
    /// Left behind by a failed upgrade.
    Closed,
}

impl NetTransport {
    /// Connects to the endpoint, negotiating TLS first for implicit TLS.
    ///
    /// The timeout bounds the TCP connect only.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or TLS handshake fails.
    pub async fn open(endpoint: &Endpoint, connect_timeout: Duration) -> Result<Self> {
        let addr = format!("{}:{}", endpoint.host, endpoint.port);
        let tcp_stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                Error::Transport(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("Connecting to {addr} timed out"),
                ))
            })??;
        tracing::debug!(%addr, security = ?endpoint.security, "Connected");

        match endpoint.security {
            Security::None => Ok(Self::Tcp {
                host: endpoint.host.clone(),
                stream: LineTransport::new(tcp_stream),
            }),
            Security::Implicit => {
                let tls_stream = handshake(&endpoint.host, tcp_stream).await?;
                Ok(Self::Tls(Box::new(LineTransport::encrypted(tls_stream))))
            }
        }
    }
}

impl Transport for NetTransport {
    async fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            Self::Tcp { stream, .. } => stream.read_line(buf).await,
            Self::Tls(stream) => stream.read_line(buf).await,
            Self::Closed => Err(closed()),
        }
    }

    async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        match self {
            Self::Tcp { stream, .. } => stream.write_line(line).await,
            Self::Tls(stream) => stream.write_line(line).await,
            Self::Closed => Err(closed()),
        }
    }

    async fn upgrade_to_tls(&mut self) -> Result<()> {
        let (host, stream) = match std::mem::replace(self, Self::Closed) {
            Self::Tcp { host, stream } => (host, stream),
            other => {
                *self = other;
                return Err(Error::Tls("Already using TLS".into()));
            }
        };

        let tls_stream = handshake(&host, stream.into_inner()?).await?;
        *self = Self::Tls(Box::new(LineTransport::encrypted(tls_stream)));
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp { stream, .. } => stream.close().await,
            Self::Tls(stream) => stream.close().await,
            Self::Closed => Ok(()),
        }
    }

    fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection closed")
}

async fn handshake(hostname: &str, tcp_stream: TcpStream) -> Result<TlsStream<TcpStream>> {
    let connector = create_tls_connector();
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Tls(format!("Invalid hostname: {hostname}")))?;

    connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| Error::Tls(e.to_string()))
}

/// Creates a TLS connector with the bundled web PKI roots.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
