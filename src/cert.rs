use der::{Decode, Encode};
use x509_cert::certificate::CertificateInner;

use crate::algorithm::KeyAlgorithm;
use crate::error::{KeyToolsError, Result};
use crate::key::PublicKey;
use crate::key::codec::public_from_der;
use crate::pem_utils::pem_to_der;

/// Represents an X.509 certificate.
///
/// This struct provides methods to decode the certificate from PEM or DER and
/// to reach its embedded public key.
#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Decodes a PEM certificate. The body may be a single unwrapped line, as
    /// the CA returns it.
    pub fn from_pem(pem: &str) -> Result<Self> {
        Self::from_der(&pem_to_der(pem)?)
    }

    /// Decodes a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)
            .map_err(|e| KeyToolsError::Decode(format!("invalid certificate: {e}")))?;
        Ok(Self { inner })
    }

    /// Decodes file contents that may be either PEM or DER.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match std::str::from_utf8(bytes) {
            Ok(text) if text.contains("-----BEGIN") => Self::from_pem(text),
            _ => Self::from_der(bytes),
        }
    }

    /// Encodes the certificate into DER format.
    ///
    /// # Returns
    /// A byte vector containing the DER-encoded certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| KeyToolsError::Encoding(e.to_string()))
    }

    /// DER of the embedded `SubjectPublicKeyInfo`.
    pub fn spki_der(&self) -> Result<Vec<u8>> {
        self.inner
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| KeyToolsError::Encoding(e.to_string()))
    }

    /// The embedded public key, decoded as a key of `algorithm`.
    pub fn public_key(&self, algorithm: KeyAlgorithm) -> Result<PublicKey> {
        public_from_der(&self.spki_der()?, algorithm)
    }
}
