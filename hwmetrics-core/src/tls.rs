//! TLS certificate verification policy
//!
//! The `certificate-verification` setting decides how backend clients check
//! server certificates:
//!
//! - `true`: keep the default (system) verification, nothing is installed
//! - `false`: accept every certificate
//! - anything else: path to a certificate (PEM or DER); only a server
//!   presenting exactly that certificate is accepted
//!
//! Installation goes through a [`TrustPolicySink`]. [`GlobalTrustPolicy`] is
//! the process-wide sink used by the exporter; tests use their own.

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::{CertificateError, DigitallySignedStruct, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use tracing::{info, warn};

use crate::error::{ConfigError, Result};

/// Settings key holding the verification policy.
pub const CERTIFICATE_VERIFICATION_KEY: &str = "certificate-verification";

/// A certificate loaded from disk, identified by its SHA-256 thumbprint.
#[derive(Clone, PartialEq, Eq)]
pub struct PinnedCertificate {
    path: PathBuf,
    der: Vec<u8>,
    thumbprint: [u8; 32],
}

impl PinnedCertificate {
    /// Load a PEM or DER certificate file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| ConfigError::CertificateLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(path, &bytes)
    }

    fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self> {
        let load_error = |reason: String| ConfigError::CertificateLoad {
            path: path.to_path_buf(),
            reason,
        };

        let der = if bytes.trim_ascii_start().starts_with(b"-----BEGIN") {
            CertificateDer::from_pem_slice(bytes)
                .map_err(|e| load_error(format!("invalid PEM certificate: {}", e)))?
        } else {
            CertificateDer::from(bytes.to_vec())
        };

        // Reject anything that is not a well-formed X.509 certificate
        webpki::EndEntityCert::try_from(&der)
            .map_err(|e| load_error(format!("not a valid X.509 certificate: {}", e)))?;
        let der = der.to_vec();

        Ok(Self {
            path: path.to_path_buf(),
            thumbprint: Sha256::digest(&der).into(),
            der,
        })
    }

    /// File the certificate was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// SHA-256 thumbprint of the DER encoding.
    pub fn thumbprint(&self) -> &[u8; 32] {
        &self.thumbprint
    }

    /// Thumbprint as lowercase hex.
    pub fn thumbprint_hex(&self) -> String {
        self.thumbprint.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Whether `presented` is this certificate.
    pub fn matches(&self, presented: &[u8]) -> bool {
        presented.len() == self.der.len() && Sha256::digest(presented)[..] == self.thumbprint[..]
    }
}

impl fmt::Debug for PinnedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedCertificate")
            .field("path", &self.path)
            .field("thumbprint", &self.thumbprint_hex())
            .finish()
    }
}

/// How TLS server certificates are validated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrustPolicy {
    /// Standard chain and host name verification
    #[default]
    SystemDefault,
    /// Every certificate is accepted
    AcceptAll,
    /// Only the pinned certificate is accepted
    Pinned(PinnedCertificate),
}

impl TrustPolicy {
    /// Custom verifier for this policy, `None` for [`TrustPolicy::SystemDefault`]
    /// where the client's own verifier applies.
    pub fn server_cert_verifier(&self) -> Option<Arc<dyn ServerCertVerifier>> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        match self {
            TrustPolicy::SystemDefault => None,
            TrustPolicy::AcceptAll => Some(Arc::new(PolicyVerifier {
                pinned: None,
                provider,
            })),
            TrustPolicy::Pinned(cert) => Some(Arc::new(PolicyVerifier {
                pinned: Some(cert.clone()),
                provider,
            })),
        }
    }

    /// Short policy name for logs.
    pub fn describe(&self) -> String {
        match self {
            TrustPolicy::SystemDefault => "system default".to_string(),
            TrustPolicy::AcceptAll => "accept all".to_string(),
            TrustPolicy::Pinned(cert) => format!("pinned to {}", cert.path().display()),
        }
    }
}

/// Receives trust policy installations.
pub trait TrustPolicySink: Send + Sync {
    /// Replace the active policy.
    fn install(&self, policy: TrustPolicy);
}

fn global_policy() -> &'static RwLock<Arc<TrustPolicy>> {
    static POLICY: OnceLock<RwLock<Arc<TrustPolicy>>> = OnceLock::new();
    POLICY.get_or_init(|| RwLock::new(Arc::new(TrustPolicy::SystemDefault)))
}

/// Process-wide trust policy read by backend clients.
///
/// Installs are serialized; the last one wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalTrustPolicy;

impl GlobalTrustPolicy {
    /// Currently installed policy.
    pub fn current() -> Arc<TrustPolicy> {
        match global_policy().read() {
            Ok(policy) => policy.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TrustPolicySink for GlobalTrustPolicy {
    fn install(&self, policy: TrustPolicy) {
        static INSTALL: Mutex<()> = Mutex::new(());
        let _guard = INSTALL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut current = global_policy()
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Arc::new(policy);
    }
}

/// Interpret a `certificate-verification` value and install the resulting policy.
///
/// `true` installs nothing. Relative certificate paths resolve against
/// `base_dir` when given.
///
/// # Errors
///
/// [`ConfigError::CertificateLoad`] when the certificate file cannot be read or parsed.
pub fn install_certificate_verification(
    value: &str,
    base_dir: Option<&Path>,
    sink: &dyn TrustPolicySink,
) -> Result<()> {
    let value = value.trim();

    if value.eq_ignore_ascii_case("true") {
        info!("Using default certificate verification");
        return Ok(());
    }

    let policy = if value.eq_ignore_ascii_case("false") {
        warn!("Certificate verification disabled: every TLS certificate will be accepted");
        TrustPolicy::AcceptAll
    } else {
        let path = match base_dir {
            Some(dir) if Path::new(value).is_relative() => dir.join(value),
            _ => PathBuf::from(value),
        };
        let cert = PinnedCertificate::load(&path)?;
        info!(
            "Trusting only certificate {} (sha256 {})",
            path.display(),
            cert.thumbprint_hex()
        );
        TrustPolicy::Pinned(cert)
    };

    sink.install(policy);
    Ok(())
}

/// Verifier for the accept-all and pinned policies.
///
/// Handshake signatures are still checked so the peer must hold the
/// certificate's private key.
#[derive(Debug)]
struct PolicyVerifier {
    pinned: Option<PinnedCertificate>,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for PolicyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match &self.pinned {
            Some(cert) if !cert.matches(end_entity.as_ref()) => Err(
                rustls::Error::InvalidCertificate(CertificateError::ApplicationVerificationFailure),
            ),
            _ => Ok(ServerCertVerified::assertion()),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
