use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use crate::error::{ApnsError, Result};

use super::dialer::{BoxedTransport, Dialer};

/// TLS dialer authenticating with a client certificate.
///
/// The gateway's own certificate is deliberately NOT verified against a
/// trust store; this mirrors the gateway deployment this client targets and
/// is a documented simplification, not a default-safe stance.
pub struct TlsDialer {
    connector: TlsConnector,
    dial_timeout: Duration,
}

impl TlsDialer {
    /// Build a dialer from PEM-encoded client certificate and key files.
    pub fn from_pem_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        dial_timeout: Duration,
    ) -> Result<Self> {
        let certs = load_certs(cert_path.as_ref())?;
        let key = load_key(key_path.as_ref())?;
        Self::from_identity(certs, key, dial_timeout)
    }

    /// Build a dialer from an already-loaded client identity.
    pub fn from_identity(
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
        dial_timeout: Duration,
    ) -> Result<Self> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let config = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| ApnsError::Tls(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureServerVerifier { provider }))
            .with_client_auth_cert(certs, key)
            .map_err(|e| ApnsError::Tls(e.to_string()))?;

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            dial_timeout,
        })
    }
}

#[async_trait]
impl Dialer for TlsDialer {
    async fn dial(&self, endpoint: &str) -> Result<BoxedTransport> {
        let host = endpoint
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(endpoint)
            .to_string();

        let tcp = timeout(self.dial_timeout, TcpStream::connect(endpoint))
            .await
            .map_err(|_| ApnsError::DialTimeout(self.dial_timeout))??;
        tcp.set_nodelay(true)?;

        let server_name =
            ServerName::try_from(host).map_err(|e| ApnsError::Tls(e.to_string()))?;
        let stream = self.connector.connect(server_name, tcp).await?;

        tracing::debug!(endpoint = %endpoint, "TLS handshake completed");
        Ok(Box::new(stream))
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<std::io::Result<Vec<_>>>()?;
    if certs.is_empty() {
        return Err(ApnsError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?.ok_or_else(|| {
        ApnsError::Tls(format!("no private key found in {}", path.display()))
    })
}

/// Accepts any server certificate. See the [`TlsDialer`] docs.
#[derive(Debug)]
struct InsecureServerVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for InsecureServerVerifier {
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
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
