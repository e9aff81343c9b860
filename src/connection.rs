//! POP3 transport: TLS setup and the command/response conversation
//!
//! [`Connector`] produces a fresh byte stream to the server;
//! [`Pop3Stream`] speaks POP3 over it. The session only ever talks to
//! these two, which keeps the retry logic independent of TCP and TLS.

use crate::codec::{self, Listing, MailboxStat, MessageId};
use crate::config::PopConfig;
use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::future::Future;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info};

/// Opens new byte streams to a POP3 server.
pub trait Connector {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Open a stream positioned right before the server greeting.
    fn open(&self) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// TCP connector with implicit TLS (POP3S).
#[derive(Clone)]
pub struct TlsConnector {
    host: String,
    port: u16,
    tls: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    /// Build a connector for `config.host:config.port`.
    ///
    /// Certificates are checked against the Mozilla root store unless
    /// `accept_invalid_certs` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the TLS configuration cannot be built.
    pub fn new(config: &PopConfig) -> Result<Self> {
        let builder =
            rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_safe_default_protocol_versions()
                .map_err(|e| Error::Tls(e.to_string()))?;

        let client_config = if config.accept_invalid_certs {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
                .with_no_client_auth()
        } else {
            let roots = rustls::RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            builder.with_root_certificates(roots).with_no_client_auth()
        };

        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            tls: tokio_rustls::TlsConnector::from(Arc::new(client_config)),
        })
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl Connector for TlsConnector {
    type Stream = TlsStream<TcpStream>;

    async fn open(&self) -> Result<Self::Stream> {
        let addr = format!("{}:{}", self.host, self.port);
        debug!("Connecting to POP3 server at {}", addr);

        let tcp_stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| Error::Connection(format!("{addr}: {e}")))?;

        let server_name = ServerName::try_from(self.host.clone())
            .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;

        self.tls
            .connect(server_name, tcp_stream)
            .await
            .map_err(|e| Error::Connection(format!("TLS handshake with {addr} failed: {e}")))
    }
}

/// One POP3 conversation over an established stream.
///
/// Commands are strictly request/response; nothing is pipelined.
#[derive(Debug)]
pub struct Pop3Stream<S> {
    reader: BufReader<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Pop3Stream<S> {
    /// Read the greeting and authenticate with USER/PASS.
    ///
    /// The returned stream is in the TRANSACTION state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the greeting is missing or
    /// negative and [`Error::Authentication`] if USER or PASS is
    /// refused.
    pub async fn login(stream: S, username: &str, password: &str) -> Result<Self> {
        let mut conn = Self {
            reader: BufReader::new(stream),
        };

        let greeting = conn.read_line().await.map_err(|e| match e {
            Error::ConnectionClosed => Error::Connection("closed before greeting".into()),
            other => other,
        })?;
        if !codec::is_success(&greeting) {
            return Err(Error::Connection(format!(
                "server refused connection: {}",
                codec::status_text(&greeting)
            )));
        }
        debug!("POP3 greeting: {}", String::from_utf8_lossy(&greeting));

        conn.send(&format!("USER {username}")).await?;
        let reply = conn.read_line().await?;
        if !codec::is_success(&reply) {
            return Err(Error::Authentication(codec::status_text(&reply)));
        }

        conn.send(&format!("PASS {password}")).await?;
        let reply = conn.read_line().await?;
        if !codec::is_success(&reply) {
            return Err(Error::Authentication(codec::status_text(&reply)));
        }

        info!("Logged in to POP3 server as {}", username);
        Ok(conn)
    }

    /// `STAT`: message count and mailbox size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on `-ERR` and
    /// [`Error::MalformedResponse`] if the reply does not parse.
    pub async fn stat(&mut self) -> Result<MailboxStat> {
        let reply = self.command("STAT").await?;
        codec::parse_stat(&codec::status_text(&reply))
    }

    /// `LIST`: every message with its size, in server order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on `-ERR` and
    /// [`Error::MalformedResponse`] if an entry does not parse.
    pub async fn list(&mut self) -> Result<Vec<Listing>> {
        self.command("LIST").await?;
        self.read_multiline()
            .await?
            .iter()
            .map(|line| codec::parse_listing_token(&String::from_utf8_lossy(line)))
            .collect()
    }

    /// `RETR`: the full message as raw lines.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on `-ERR` or a transport error.
    pub async fn retr(&mut self, id: MessageId) -> Result<Vec<Vec<u8>>> {
        self.command(&format!("RETR {id}")).await?;
        self.read_multiline().await
    }

    /// `TOP`: headers plus the first `lines` body lines.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on `-ERR` or a transport error.
    pub async fn top(&mut self, id: MessageId, lines: usize) -> Result<Vec<Vec<u8>>> {
        self.command(&format!("TOP {id} {lines}")).await?;
        self.read_multiline().await
    }

    /// `QUIT`: end the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses or the stream fails.
    pub async fn quit(&mut self) -> Result<()> {
        self.command("QUIT").await?;
        self.reader.get_mut().shutdown().await.ok();
        Ok(())
    }

    /// Send one command and check its status line.
    async fn command(&mut self, command: &str) -> Result<Vec<u8>> {
        self.send(command).await?;
        let reply = self.read_line().await?;
        if codec::is_success(&reply) {
            Ok(reply)
        } else {
            Err(Error::protocol(command, codec::status_text(&reply)))
        }
    }

    async fn send(&mut self, command: &str) -> Result<()> {
        if command.starts_with("PASS ") {
            debug!("C: PASS ****");
        } else {
            debug!("C: {}", command);
        }
        let stream = self.reader.get_mut();
        stream
            .write_all(format!("{command}\r\n").as_bytes())
            .await
            .map_err(map_io)?;
        stream.flush().await.map_err(map_io)
    }

    /// Read one line with the line terminator removed.
    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let read = self
            .reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(map_io)?;
        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        Ok(codec::trim_eol(&line).to_vec())
    }

    /// Read a multi-line body up to the lone `.`, undoing dot-stuffing.
    async fn read_multiline(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line == codec::TERMINATOR {
                break;
            }
            lines.push(codec::unstuff(&line).to_vec());
        }
        debug!("S: {} line(s)", lines.len());
        Ok(lines)
    }
}

/// Fold a vanished peer into [`Error::ConnectionClosed`].
///
/// rustls reports a peer that closed without `close_notify` as
/// `UnexpectedEof`.
fn map_io(err: std::io::Error) -> Error {
    match err.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => Error::ConnectionClosed,
        _ => Error::Io(err),
    }
}

/// Certificate verifier that accepts all certificates
/// (for self-signed local servers).
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
