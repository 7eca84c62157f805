// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection establishment: TCP, optional TLS, LOGIN.
//!
//! Every network step runs under a deadline. A LOGIN refusal maps to
//! `Auth` so the scheduler surfaces it on the integration row instead of
//! retrying a password that will never work.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use comptoir_core::ComptoirError;
use comptoir_core::types::Integration;
use rustls_pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info};

pub const DEFAULT_IMAP_PORT: u16 = 993;

/// Deadlines for connection establishment and for each subsequent command.
#[derive(Debug, Clone, Copy)]
pub struct ImapTimeouts {
    pub connect: Duration,
    pub command: Duration,
}

impl Default for ImapTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            command: Duration::from_secs(60),
        }
    }
}

/// The one stream type sessions are generic over, TLS or plain.
#[derive(Debug)]
pub enum ImapStream {
    Tls(Box<TlsStream<TcpStream>>),
    Plain(TcpStream),
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ImapStream::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
            ImapStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            ImapStream::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
            ImapStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ImapStream::Tls(stream) => Pin::new(stream).poll_flush(cx),
            ImapStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ImapStream::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
            ImapStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Saves spelling out the generic session type at every call site.
pub type ImapSession = async_imap::Session<ImapStream>;

fn transient(
    message: String,
    source: impl std::error::Error + Send + Sync + 'static,
) -> ComptoirError {
    ComptoirError::Transient {
        message,
        source: Some(Box::new(source)),
    }
}

/// Establish a logged-in session for an IMAP integration.
pub async fn connect(
    integration: &Integration,
    password: &str,
    timeouts: ImapTimeouts,
) -> Result<ImapSession, ComptoirError> {
    let host = integration
        .imap_host
        .as_deref()
        .ok_or_else(|| ComptoirError::Config("integration has no imap_host".to_string()))?;
    let user = integration
        .imap_user
        .as_deref()
        .ok_or_else(|| ComptoirError::Config("integration has no imap_user".to_string()))?;
    let port = integration.imap_port.unwrap_or(DEFAULT_IMAP_PORT);

    debug!(host, port, use_ssl = integration.imap_use_ssl, "connecting");
    let tcp = tokio::time::timeout(timeouts.connect, TcpStream::connect((host, port)))
        .await
        .map_err(|_| ComptoirError::Timeout {
            duration: timeouts.connect,
        })?
        .map_err(|e| transient(format!("TCP connect to {host}:{port} failed: {e}"), e))?;

    let stream = if integration.imap_use_ssl {
        let root_store =
            rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| ComptoirError::Config(format!("invalid IMAP host `{host}`: {e}")))?;
        let tls = tokio::time::timeout(timeouts.connect, connector.connect(server_name, tcp))
            .await
            .map_err(|_| ComptoirError::Timeout {
                duration: timeouts.connect,
            })?
            .map_err(|e| transient(format!("TLS handshake with {host} failed: {e}"), e))?;
        ImapStream::Tls(Box::new(tls))
    } else {
        ImapStream::Plain(tcp)
    };

    let client = async_imap::Client::new(stream);
    let login = tokio::time::timeout(timeouts.command, client.login(user, password))
        .await
        .map_err(|_| ComptoirError::Timeout {
            duration: timeouts.command,
        })?;
    let session = login.map_err(|(e, _client)| match e {
        async_imap::error::Error::No(reason) => {
            ComptoirError::Auth(format!("LOGIN refused: {reason}"))
        }
        async_imap::error::Error::Validate(e) => {
            ComptoirError::Config(format!("IMAP credentials contain invalid characters: {e}"))
        }
        other => transient(format!("LOGIN failed: {other}"), other),
    })?;
    info!(host, user, "IMAP session established");
    Ok(session)
}

/// Best-effort LOGOUT; a failure here only costs the server a dangling
/// connection it will reap.
pub async fn logout(mut session: ImapSession, limit: Duration) {
    match tokio::time::timeout(limit, session.logout()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "LOGOUT failed"),
        Err(_) => debug!("LOGOUT timed out"),
    }
}
