//! Self-signed TLS for the fake IMAP server

use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Build an acceptor with a fresh certificate for `127.0.0.1`.
///
/// Also installs the ring provider process-wide. Tests race to do
/// this, so an already-installed provider is not an error.
pub fn self_signed_acceptor() -> TlsAcceptor {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
        .expect("generate self-signed cert");
    let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert.cert.der().clone()], key.into())
        .expect("build server TLS config");
    TlsAcceptor::from(Arc::new(config))
}
