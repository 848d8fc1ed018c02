//! IMAP session setup
//!
//! Every mailbox operation of [`DigestClient`](crate::DigestClient) opens
//! its own session with [`open`], works on one selected folder and logs
//! out again.

use crate::config::ImapConfig;
use crate::error::{Error, Result};
use async_imap::Session;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::debug;

/// A TLS-wrapped IMAP session.
pub type ImapSession = Session<Compat<tokio_rustls::client::TlsStream<TcpStream>>>;

/// TLS connector for local mail bridges, which present self-signed
/// certificates. The server certificate is not verified.
fn tls_connector() -> TlsConnector {
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// Open an authenticated IMAP session.
///
/// Connects over plain TCP, upgrades with STARTTLS and logs in with the
/// configured credentials.
///
/// # Errors
///
/// Returns [`Error::Io`] if the TCP connection fails, [`Error::Tls`] if
/// STARTTLS or the handshake fails and [`Error::Imap`] if the login is
/// rejected.
pub async fn connect(config: &ImapConfig) -> Result<ImapSession> {
    let addr = format!("{}:{}", config.host, config.port);
    debug!(%addr, "Connecting to IMAP server");

    let tcp_stream = TcpStream::connect(&addr).await?;
    let mut client = async_imap::Client::new(tcp_stream.compat());

    client
        .run_command_and_check_ok("STARTTLS", None)
        .await
        .map_err(|e| Error::Tls(format!("STARTTLS failed: {e}")))?;

    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;

    let tls_stream = tls_connector()
        .connect(server_name, client.into_inner().into_inner())
        .await
        .map_err(|e| Error::Tls(e.to_string()))?;

    let session = async_imap::Client::new(tls_stream.compat())
        .login(&config.username, &config.password)
        .await
        .map_err(|(e, _)| Error::Imap(format!("Login failed: {e}")))?;

    debug!(user = %config.username, "IMAP login succeeded");
    Ok(session)
}

/// Connect and SELECT `folder`.
///
/// # Errors
///
/// Same as [`connect`], plus [`Error::Imap`] if the folder cannot be
/// selected.
pub async fn open(config: &ImapConfig, folder: &str) -> Result<ImapSession> {
    let mut session = connect(config).await?;
    let mailbox = session
        .select(folder)
        .await
        .map_err(|e| Error::Imap(format!("Failed to select {folder}: {e}")))?;
    debug!(folder, exists = mailbox.exists, "Selected folder");
    Ok(session)
}

/// Log out, ignoring failures. The operation already succeeded or
/// failed by the time this runs.
pub async fn close(mut session: ImapSession) {
    if let Err(e) = session.logout().await {
        debug!("IMAP logout failed: {e}");
    }
}

#[derive(Debug)]
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
