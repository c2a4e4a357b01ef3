//! rustls server configuration derived from a descriptor's TLS policy.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::{aws_lc_rs, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::{VerifierBuilderError, WebPkiClientVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, RootCertStore, ServerConfig, SignatureScheme};
use thiserror::Error;

use crate::config::defaults::Defaults;
use crate::config::inet::ServerInet;
use crate::config::kind::Protocol;
use crate::config::tls::{ClientAuthTlsConfig, ClientAuthType, TlsVersion};

const SUPPORTED_VERSIONS: [TlsVersion; 2] = [TlsVersion::Tls12, TlsVersion::Tls13];

#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("no supported TLS version between {min} and {max}")]
    NoProtocolVersion { min: TlsVersion, max: TlsVersion },

    #[error("load certificate {path:?}: {reason}")]
    Certificate { path: PathBuf, reason: String },

    #[error("client auth is enabled but no server certificate is configured")]
    MissingCertificate,

    #[error("load trusted CA {path:?}: {reason}")]
    TrustedCa { path: PathBuf, reason: String },

    #[error("client auth type {0} requires a trusted CA")]
    TrustedCaRequired(ClientAuthType),

    #[error("client certificate verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),

    #[error(transparent)]
    Rustls(#[from] rustls::Error),
}

impl ServerInet {
    /// Builds the rustls configuration for this descriptor, or `None` when
    /// neither server TLS nor client auth is enabled.
    pub fn new_tls_config(
        &self,
        defaults: &Defaults,
        protocol: Protocol,
    ) -> Result<Option<Arc<ServerConfig>>, TlsSetupError> {
        let client_auth = self.effective_client_auth();
        if !self.tls.enable && !client_auth.enable {
            return Ok(None);
        }

        let min = self.tls.min_version.or_default(defaults);
        let max = self.tls.max_version.or_default(defaults);
        let versions: Vec<&'static rustls::SupportedProtocolVersion> = SUPPORTED_VERSIONS
            .iter()
            .filter(|version| (min..=max).contains(*version))
            .filter_map(|version| version.protocol_version())
            .collect();
        if versions.is_empty() {
            return Err(TlsSetupError::NoProtocolVersion { min, max });
        }

        if !self.tls.enable {
            return Err(TlsSetupError::MissingCertificate);
        }
        let certs = load_certs(Path::new(&self.tls.cert_file))?;
        let key = load_key(Path::new(&self.tls.key_file))?;

        let provider = Arc::new(aws_lc_rs::default_provider());
        let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
            .with_protocol_versions(&versions)?;

        let builder = match client_verifier(client_auth, defaults, provider)? {
            Some(verifier) => builder.with_client_cert_verifier(verifier),
            None => builder.with_no_client_auth(),
        };

        let mut config = builder.with_single_cert(certs, key)?;
        config.ignore_client_order = self.tls.prefer_server_cipher_suites(defaults);
        config.alpn_protocols = protocol.alpn();

        Ok(Some(Arc::new(config)))
    }
}

fn client_verifier(
    client_auth: &ClientAuthTlsConfig,
    defaults: &Defaults,
    provider: Arc<CryptoProvider>,
) -> Result<Option<Arc<dyn ClientCertVerifier>>, TlsSetupError> {
    if !client_auth.enable {
        return Ok(None);
    }

    let auth_type = client_auth.auth_type.or_default(defaults);
    let verifier: Arc<dyn ClientCertVerifier> = match auth_type {
        ClientAuthType::Unknown | ClientAuthType::NoClientCert => return Ok(None),
        ClientAuthType::RequestClientCert => Arc::new(AcceptAnyClientCert::new(provider, false)),
        ClientAuthType::RequireAnyClientCert => Arc::new(AcceptAnyClientCert::new(provider, true)),
        ClientAuthType::VerifyClientCertIfGiven | ClientAuthType::RequireAndVerifyClientCert => {
            if client_auth.trusted_ca.is_empty() {
                return Err(TlsSetupError::TrustedCaRequired(auth_type));
            }
            let roots = Arc::new(load_trusted_ca(Path::new(&client_auth.trusted_ca))?);
            let builder = WebPkiClientVerifier::builder_with_provider(roots, provider);
            if auth_type == ClientAuthType::VerifyClientCertIfGiven {
                builder.allow_unauthenticated().build()?
            } else {
                builder.build()?
            }
        }
    };

    Ok(Some(verifier))
}

fn open(path: &Path) -> std::io::Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsSetupError> {
    let failed = |reason: String| TlsSetupError::Certificate {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = open(path).map_err(|err| failed(err.to_string()))?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| failed(err.to_string()))?;
    if certs.is_empty() {
        return Err(failed("no certificate found".to_string()));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsSetupError> {
    let failed = |reason: String| TlsSetupError::Certificate {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = open(path).map_err(|err| failed(err.to_string()))?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|err| failed(err.to_string()))?
        .ok_or_else(|| failed("no private key found".to_string()))
}

fn load_trusted_ca(path: &Path) -> Result<RootCertStore, TlsSetupError> {
    let failed = |reason: String| TlsSetupError::TrustedCa {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = open(path).map_err(|err| failed(err.to_string()))?;
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut reader) {
        let cert = cert.map_err(|err| failed(err.to_string()))?;
        roots.add(cert).map_err(|err| failed(err.to_string()))?;
    }
    if roots.is_empty() {
        return Err(failed("no valid certificate found".to_string()));
    }
    Ok(roots)
}

/// Accepts any client certificate without chain validation; the handshake
/// signature is still checked.
#[derive(Debug)]
struct AcceptAnyClientCert {
    provider: Arc<CryptoProvider>,
    mandatory: bool,
}

impl AcceptAnyClientCert {
    fn new(provider: Arc<CryptoProvider>, mandatory: bool) -> Self {
        Self { provider, mandatory }
    }
}

impl ClientCertVerifier for AcceptAnyClientCert {
    fn client_auth_mandatory(&self) -> bool {
        self.mandatory
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

    fn fixture(name: &str) -> String {
        format!("{FIXTURES}/{name}")
    }

    fn https() -> ServerInet {
        let mut inet = ServerInet {
            host: "127.0.0.1".to_string(),
            port: 8443,
            ..ServerInet::default()
        };
        inet.tls.enable = true;
        inet.tls.cert_file = fixture("server.pem");
        inet.tls.key_file = fixture("server.key");
        inet.defaultize(&Defaults::default());
        inet
    }

    #[test]
    fn plain_descriptor_has_no_config() {
        let inet = ServerInet::default();
        let config = inet.new_tls_config(&Defaults::default(), Protocol::Http).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn server_tls_builds_with_alpn_and_preference() {
        let config = https()
            .new_tls_config(&Defaults::default(), Protocol::Http)
            .unwrap()
            .unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
        assert!(config.ignore_client_order);
    }

    #[test]
    fn legacy_only_range_is_rejected() {
        let mut inet = https();
        inet.tls.min_version = TlsVersion::Tls10;
        inet.tls.max_version = TlsVersion::Tls11;
        let err = inet
            .new_tls_config(&Defaults::default(), Protocol::Http)
            .unwrap_err();
        assert!(matches!(err, TlsSetupError::NoProtocolVersion { .. }));
    }

    #[test]
    fn client_auth_without_server_cert_fails() {
        let mut inet = ServerInet::default();
        inet.client_auth.tls.enable = true;
        inet.client_auth.tls.trusted_ca = fixture("ca.pem");
        inet.defaultize(&Defaults::default());
        let err = inet
            .new_tls_config(&Defaults::default(), Protocol::Http)
            .unwrap_err();
        assert!(matches!(err, TlsSetupError::MissingCertificate));
    }

    #[test]
    fn verifying_policy_requires_trusted_ca() {
        let mut inet = https();
        inet.client_auth.tls.enable = true;
        inet.client_auth.tls.auth_type = ClientAuthType::RequireAndVerifyClientCert;
        let err = inet
            .new_tls_config(&Defaults::default(), Protocol::Http)
            .unwrap_err();
        assert!(matches!(
            err,
            TlsSetupError::TrustedCaRequired(ClientAuthType::RequireAndVerifyClientCert)
        ));

        inet.client_auth.tls.trusted_ca = fixture("ca.pem");
        assert!(inet
            .new_tls_config(&Defaults::default(), Protocol::Http)
            .unwrap()
            .is_some());
    }

    #[test]
    fn non_verifying_policies_need_no_ca() {
        for auth_type in [
            ClientAuthType::NoClientCert,
            ClientAuthType::RequestClientCert,
            ClientAuthType::RequireAnyClientCert,
        ] {
            let mut inet = https();
            inet.client_auth.tls.enable = true;
            inet.client_auth.tls.auth_type = auth_type;
            assert!(
                inet.new_tls_config(&Defaults::default(), Protocol::Grpc).is_ok(),
                "{auth_type}"
            );
        }
    }

    #[test]
    fn unreadable_material_is_reported() {
        let mut inet = https();
        inet.tls.key_file = fixture("missing.key");
        assert!(matches!(
            inet.new_tls_config(&Defaults::default(), Protocol::Http),
            Err(TlsSetupError::Certificate { .. })
        ));

        let mut inet = https();
        inet.client_auth.tls.enable = true;
        inet.client_auth.tls.trusted_ca = fixture("server.key");
        assert!(matches!(
            inet.new_tls_config(&Defaults::default(), Protocol::Http),
            Err(TlsSetupError::TrustedCa { .. })
        ));
    }
}
