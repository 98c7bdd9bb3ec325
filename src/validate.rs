//! Key-pair and key/certificate cross-validation by sign/verify round trip,
//! and algorithm detection for keys and certificates.
//!
//! The EC national family has no real SM2 signature round trip yet: its match
//! checks decode the inputs, log a warning and report `true`.
//! [`signature_check_supported`] exposes that gap to callers.

use const_oid::ObjectIdentifier;
use const_oid::db::rfc5912::{ID_EC_PUBLIC_KEY, RSA_ENCRYPTION};
use pkcs8::PrivateKeyInfo;
use pkcs8::spki::{AlgorithmIdentifierRef, SubjectPublicKeyInfoRef};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use tracing::{debug, warn};

use crate::algorithm::{DetectedAlgorithm, KeyAlgorithm};
use crate::cert::Certificate;
use crate::error::Result;
use crate::key::{PrivateKey, PublicKey, decode_private, decode_public};

/// Named-curve OID of the SM2 national curve.
pub const SM2_CURVE_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.301");

const KEY_CHECK_PAYLOAD: &[u8] = b"test message for key verification";
const CERT_CHECK_PAYLOAD: &[u8] = b"test message for cert verification";

/// Whether match checks for `algorithm` perform a real signature round trip.
pub fn signature_check_supported(algorithm: KeyAlgorithm) -> bool {
    match algorithm {
        KeyAlgorithm::RsaClass => true,
        KeyAlgorithm::EcNationalClass => false,
    }
}

/// Checks that a base64 private key and base64 public key form one key pair.
///
/// # Errors
/// `Decode` when either key is malformed. A failed verification is `Ok(false)`.
pub fn keys_match(private_b64: &str, public_b64: &str, algorithm: KeyAlgorithm) -> Result<bool> {
    let private = decode_private(private_b64, algorithm)?;
    let public = decode_public(public_b64, algorithm)?;
    Ok(round_trip(&private, &public, KEY_CHECK_PAYLOAD))
}

/// Checks that a base64 private key belongs to the public key embedded in a
/// PEM certificate.
///
/// # Errors
/// `Decode` when the key or certificate is malformed. A failed verification is `Ok(false)`.
pub fn cert_matches_key(private_b64: &str, cert_pem: &str, algorithm: KeyAlgorithm) -> Result<bool> {
    let private = decode_private(private_b64, algorithm)?;
    let certificate = Certificate::from_pem(cert_pem)?;
    let public = certificate.public_key(algorithm)?;
    Ok(round_trip(&private, &public, CERT_CHECK_PAYLOAD))
}

fn round_trip(private: &PrivateKey, public: &PublicKey, payload: &[u8]) -> bool {
    match private.algorithm() {
        KeyAlgorithm::RsaClass => match private.sign(payload) {
            Ok(signature) => {
                let verified = public.verify(payload, &signature);
                debug!(verified, "RSA sign/verify round trip");
                verified
            }
            Err(e) => {
                debug!(error = %e, "signing test payload failed");
                false
            }
        },
        KeyAlgorithm::EcNationalClass => {
            warn!("SM2 signature round trip is not implemented; reporting match");
            true
        }
    }
}

/// Detects the family of a DER private key (PKCS#8, or PKCS#1 RSA).
pub fn detect_private_key(der: &[u8]) -> DetectedAlgorithm {
    match PrivateKeyInfo::try_from(der) {
        Ok(info) => detect_from_algorithm(&info.algorithm),
        Err(_) if RsaPrivateKey::from_pkcs1_der(der).is_ok() => DetectedAlgorithm::Rsa,
        Err(_) => DetectedAlgorithm::Unknown,
    }
}

/// Detects the family of a DER `SubjectPublicKeyInfo`.
pub fn detect_public_key(der: &[u8]) -> DetectedAlgorithm {
    SubjectPublicKeyInfoRef::try_from(der)
        .map(|spki| detect_from_algorithm(&spki.algorithm))
        .unwrap_or(DetectedAlgorithm::Unknown)
}

/// Detects the family of a certificate's embedded public key.
pub fn detect_certificate(certificate: &Certificate) -> DetectedAlgorithm {
    certificate
        .spki_der()
        .map(|der| detect_public_key(&der))
        .unwrap_or(DetectedAlgorithm::Unknown)
}

fn detect_from_algorithm(algorithm: &AlgorithmIdentifierRef<'_>) -> DetectedAlgorithm {
    if algorithm.oid == RSA_ENCRYPTION {
        DetectedAlgorithm::Rsa
    } else if algorithm.oid == SM2_CURVE_OID {
        DetectedAlgorithm::Sm2
    } else if algorithm.oid == ID_EC_PUBLIC_KEY {
        match algorithm.parameters_oid() {
            Ok(curve) if curve == SM2_CURVE_OID => DetectedAlgorithm::Sm2,
            _ => DetectedAlgorithm::Ec,
        }
    } else {
        DetectedAlgorithm::Unknown
    }
}
