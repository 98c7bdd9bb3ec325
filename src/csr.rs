//! PKCS#10 certification request construction.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use der::Encode;
use der::asn1::{BitString, SetOfVec};
use x509_cert::name::RdnSequence;
use x509_cert::request::{CertReq, CertReqInfo, Version};
use x509_cert::spki::AlgorithmIdentifierOwned;
use tracing::{debug, warn};

use crate::algorithm::KeyAlgorithm;
use crate::error::{KeyToolsError, Result};
use crate::key::PrivateKey;

/// Signature algorithms used to sign certification requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
    /// SHA-256 with ECDSA. Stands in for SM3-with-SM2 on the EC national family.
    Sha256WithECDSA,
}

impl SignatureAlgorithm {
    /// Algorithm used for keys of the given family.
    pub fn for_algorithm(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::RsaClass => SignatureAlgorithm::Sha256WithRSA,
            KeyAlgorithm::EcNationalClass => SignatureAlgorithm::Sha256WithECDSA,
        }
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            SignatureAlgorithm::Sha256WithRSA => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(der::asn1::Null.into()),
            },
            SignatureAlgorithm::Sha256WithECDSA => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
                parameters: None,
            },
        }
    }
}

/// Builds a DER certification request with an empty subject for `key` and
/// returns it base64-encoded without PEM armor.
///
/// # Errors
/// `CsrBuild` when the request body cannot be encoded or signed.
pub fn build_csr(key: &PrivateKey) -> Result<String> {
    let der = build_csr_der(key)?;
    Ok(STANDARD.encode(der))
}

/// Same as [`build_csr`] but returns the raw DER.
pub fn build_csr_der(key: &PrivateKey) -> Result<Vec<u8>> {
    let algorithm = key.algorithm();
    if algorithm == KeyAlgorithm::EcNationalClass {
        warn!("signing SM2 certification request with SHA-256 instead of SM3");
    }

    let public_key = key
        .public_key()
        .to_spki()
        .map_err(|e| KeyToolsError::CsrBuild(e.to_string()))?;

    let info = CertReqInfo {
        version: Version::V1,
        subject: RdnSequence::default(),
        public_key,
        attributes: SetOfVec::new(),
    };

    let info_der = info
        .to_der()
        .map_err(|e| KeyToolsError::CsrBuild(e.to_string()))?;
    let signature = key
        .sign(&info_der)
        .map_err(|e| KeyToolsError::CsrBuild(e.to_string()))?;

    let request = CertReq {
        info,
        algorithm: SignatureAlgorithm::for_algorithm(algorithm).into(),
        signature: BitString::from_bytes(&signature)
            .map_err(|e| KeyToolsError::CsrBuild(e.to_string()))?,
    };

    let der = request
        .to_der()
        .map_err(|e| KeyToolsError::CsrBuild(e.to_string()))?;
    debug!(algorithm = %algorithm, len = der.len(), "built certification request");
    Ok(der)
}
